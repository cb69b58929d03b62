//! Observer set
//!
//! A scoped group of host listeners. Registration happens all at once in
//! [`ObserverSet::arm`]; the returned set keeps the teardown list and runs it
//! exactly once, either through [`ObserverSet::disarm`] or on drop.

use std::rc::Rc;

use tracing::debug;

use crate::monitor::host::{HostEventKind, HostSurface, Listener, ListenerId};

pub struct ObserverSet<H: HostSurface + ?Sized> {
    host: Rc<H>,
    teardown: Option<Vec<ListenerId>>,
}

impl<H: HostSurface + ?Sized> ObserverSet<H> {
    /// Register every binding on the host
    pub fn arm<I>(host: Rc<H>, bindings: I) -> Self
    where
        I: IntoIterator<Item = (HostEventKind, Listener)>,
    {
        let ids: Vec<ListenerId> = bindings
            .into_iter()
            .map(|(kind, listener)| host.add_listener(kind, listener))
            .collect();

        debug!(listeners = ids.len(), "observer set armed");
        Self {
            host,
            teardown: Some(ids),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.teardown.is_some()
    }

    /// Remove every listener this set registered.
    ///
    /// Returns how many listeners were removed; later calls remove nothing.
    pub fn disarm(&mut self) -> usize {
        let Some(ids) = self.teardown.take() else {
            return 0;
        };

        let removed = ids
            .into_iter()
            .filter(|id| self.host.remove_listener(*id))
            .count();
        debug!(listeners = removed, "observer set disarmed");
        removed
    }
}

impl<H: HostSurface + ?Sized> Drop for ObserverSet<H> {
    fn drop(&mut self) {
        self.disarm();
    }
}
