//! Host event surface
//!
//! The window and document event targets the monitoring view listens on. A
//! host is anything that can register and remove listeners for
//! [`HostEventKind`]s; [`EventHub`] is the in-process implementation used by
//! the CLI, the C ABI and tests.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::MonitorError;
use crate::types::BehaviorEventType;

/// Events the host can dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostEventKind {
    /// Window lost focus
    Blur,
    /// Window gained focus
    Focus,
    /// Window resized
    Resize,
    /// Document copy
    Copy,
    /// Document cut
    Cut,
    /// Document paste
    Paste,
    /// Page is about to unload
    Unload,
}

impl HostEventKind {
    pub const ALL: [HostEventKind; 7] = [
        HostEventKind::Blur,
        HostEventKind::Focus,
        HostEventKind::Resize,
        HostEventKind::Copy,
        HostEventKind::Cut,
        HostEventKind::Paste,
        HostEventKind::Unload,
    ];

    /// Behavioral event this host event is logged as, if any
    pub fn behavior(&self) -> Option<BehaviorEventType> {
        match self {
            HostEventKind::Blur | HostEventKind::Focus | HostEventKind::Resize => {
                Some(BehaviorEventType::WindowControl)
            }
            HostEventKind::Copy | HostEventKind::Cut | HostEventKind::Paste => {
                Some(BehaviorEventType::CopyPaste)
            }
            HostEventKind::Unload => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostEventKind::Blur => "blur",
            HostEventKind::Focus => "focus",
            HostEventKind::Resize => "resize",
            HostEventKind::Copy => "copy",
            HostEventKind::Cut => "cut",
            HostEventKind::Paste => "paste",
            HostEventKind::Unload => "unload",
        }
    }
}

impl fmt::Display for HostEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostEventKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        // Browsers name the unload guard event "beforeunload"
        if normalized == "beforeunload" {
            return Ok(HostEventKind::Unload);
        }
        HostEventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| MonitorError::UnknownHostEvent(s.to_string()))
    }
}

/// Registration handle returned by a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callback invoked when the host dispatches an event
pub type Listener = Rc<dyn Fn(HostEventKind)>;

/// Something that event listeners can be attached to
pub trait HostSurface {
    fn add_listener(&self, kind: HostEventKind, listener: Listener) -> ListenerId;

    /// Returns false when the id was not registered
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// In-process event dispatcher
#[derive(Default)]
pub struct EventHub {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(ListenerId, HostEventKind, Listener)>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch an event to every listener registered for it.
    ///
    /// Returns the number of listeners invoked. Listeners may add or remove
    /// registrations while running; those changes apply to the next dispatch.
    pub fn dispatch(&self, kind: HostEventKind) -> usize {
        let targets: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();

        trace!(event = %kind, listeners = targets.len(), "dispatching host event");
        for listener in &targets {
            listener(kind);
        }
        targets.len()
    }

    /// Total registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Registered listeners for one event kind
    pub fn listeners_for(&self, kind: HostEventKind) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }
}

impl HostSurface for EventHub {
    fn add_listener(&self, kind: HostEventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, kind, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _, _)| *existing != id);
        listeners.len() != before
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behavior_mapping() {
        assert_eq!(HostEventKind::Blur.behavior(), Some(BehaviorEventType::WindowControl));
        assert_eq!(HostEventKind::Resize.behavior(), Some(BehaviorEventType::WindowControl));
        assert_eq!(HostEventKind::Cut.behavior(), Some(BehaviorEventType::CopyPaste));
        assert_eq!(HostEventKind::Unload.behavior(), None);
    }

    #[test]
    fn test_parse_event_names() {
        assert_eq!("blur".parse::<HostEventKind>().unwrap(), HostEventKind::Blur);
        assert_eq!(" Paste ".parse::<HostEventKind>().unwrap(), HostEventKind::Paste);
        assert_eq!(
            "beforeunload".parse::<HostEventKind>().unwrap(),
            HostEventKind::Unload
        );
        assert!("scroll".parse::<HostEventKind>().is_err());
    }

    #[test]
    fn test_dispatch_reaches_matching_listeners_only() {
        let hub = EventHub::new();
        let hits = Rc::new(Cell::new(0));

        let counter = Rc::clone(&hits);
        hub.add_listener(HostEventKind::Copy, Rc::new(move |_: HostEventKind| counter.set(counter.get() + 1)));

        assert_eq!(hub.dispatch(HostEventKind::Copy), 1);
        assert_eq!(hub.dispatch(HostEventKind::Paste), 0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_remove_listener() {
        let hub = EventHub::new();
        let id = hub.add_listener(HostEventKind::Blur, Rc::new(|_: HostEventKind| {}));

        assert_eq!(hub.listener_count(), 1);
        assert!(hub.remove_listener(id));
        assert!(!hub.remove_listener(id));
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_unregister_during_dispatch() {
        let hub = Rc::new(EventHub::new());
        let slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

        let weak_hub = Rc::downgrade(&hub);
        let own_id = Rc::clone(&slot);
        let id = hub.add_listener(
            HostEventKind::Resize,
            Rc::new(move |_: HostEventKind| {
                if let (Some(hub), Some(id)) = (weak_hub.upgrade(), own_id.get()) {
                    hub.remove_listener(id);
                }
            }),
        );
        slot.set(Some(id));

        assert_eq!(hub.dispatch(HostEventKind::Resize), 1);
        assert_eq!(hub.dispatch(HostEventKind::Resize), 0);
    }
}
