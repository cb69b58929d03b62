//! Monitoring view lifecycle
//!
//! `Initializing → Active → Terminating → Terminated`
//!
//! Mounting arms the observer set and starts a capture request. The capture
//! result moves the view to `Active`, either with a live stream bound to the
//! video pane or degraded with an error placeholder. Leaving stops capture,
//! disarms observers and snapshots the export; finishing delivers it and hands
//! control back to the form. Dropping the view is the unmount path and
//! releases everything that is still held.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Span};
use uuid::Uuid;

use crate::app::Route;
use crate::clock::Clock;
use crate::config::{CaptureConstraints, MonitorConfig};
use crate::error::MonitorError;
use crate::monitor::capture::{CaptureDevice, CaptureError, CaptureHandle, CaptureStream};
use crate::monitor::event_log::EventLog;
use crate::monitor::export::{export_document, Exporter};
use crate::monitor::host::{HostEventKind, HostSurface, Listener};
use crate::monitor::observer::ObserverSet;
use crate::types::{BehaviorEvent, ExportDocument, ExportSummary, Session};

/// Lifecycle state of a monitoring view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    Initializing,
    Active,
    Terminating,
    Terminated,
}

impl ViewState {
    /// Whether behavior events are still being recorded
    pub fn is_observing(&self) -> bool {
        matches!(self, ViewState::Initializing | ViewState::Active)
    }
}

/// What the video area currently shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum VideoPane {
    /// Waiting for the capture request
    Pending,
    /// Live stream bound
    Live,
    /// Capture failed; message shown instead of video
    Error(String),
    /// Stream released and surface cleared
    Detached,
}

/// How a capture result was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Stream bound to the video pane
    Bound,
    /// Capture failed; the view runs degraded
    Degraded,
    /// The view was no longer initializing; any stream was stopped
    Discarded,
}

/// Render model of the view
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub view_id: Uuid,
    pub user: Session,
    pub state: ViewState,
    pub video: VideoPane,
    pub score: u32,
    pub event_count: usize,
}

/// Result of entering the monitoring route
pub enum Entry<H: HostSurface + ?Sized> {
    /// Session present; view mounted and observing
    Mounted(MonitoringView<H>),
    /// No session in navigation state; go back to the form
    Redirect(Route),
}

/// Outcome of a completed leave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// Where control goes next
    pub route: Route,
    /// Name the log was offered under
    pub file_name: String,
    /// Whether the exporter accepted the file
    pub delivered: bool,
    /// Summary written to the log
    pub summary: ExportSummary,
}

struct ViewCore {
    state: ViewState,
    session: Session,
    log: EventLog,
    capture: CaptureHandle,
    video: VideoPane,
    unloaded: bool,
}

impl ViewCore {
    fn observe(&mut self, event: HostEventKind, at: DateTime<Utc>) {
        match event.behavior() {
            Some(behavior) if self.state.is_observing() => {
                self.log.append(BehaviorEvent::new(behavior, at));
            }
            Some(_) => {
                debug!(event = %event, state = ?self.state, "event ignored");
            }
            None => self.unload_guard(),
        }
    }

    fn unload_guard(&mut self) {
        self.unloaded = true;
        if self.capture.release() {
            info!("unload guard stopped capture stream");
        }
        if matches!(self.video, VideoPane::Live | VideoPane::Pending) {
            self.video = VideoPane::Detached;
        }
    }

    fn stop_capture(&mut self) {
        self.capture.release();
        if !matches!(self.video, VideoPane::Error(_)) {
            self.video = VideoPane::Detached;
        }
    }
}

/// A mounted monitoring view
pub struct MonitoringView<H: HostSurface + ?Sized> {
    id: Uuid,
    core: Rc<RefCell<ViewCore>>,
    observers: ObserverSet<H>,
    config: MonitorConfig,
    pending_export: Option<ExportDocument>,
    span: Span,
}

impl<H: HostSurface + ?Sized> MonitoringView<H> {
    /// Enter the monitoring route.
    ///
    /// Without a session the view is not mounted and no observers are armed.
    pub fn mount(
        session: Option<Session>,
        host: Rc<H>,
        clock: Rc<dyn Clock>,
        config: MonitorConfig,
    ) -> Entry<H> {
        let Some(session) = session else {
            info!("no session in navigation state; redirecting to form");
            return Entry::Redirect(Route::Form);
        };

        let id = Uuid::new_v4();
        let span = info_span!("monitoring_view", view_id = %id);
        let _entered = span.enter();

        let core = Rc::new(RefCell::new(ViewCore {
            state: ViewState::Initializing,
            session,
            log: EventLog::new(config.points),
            capture: CaptureHandle::new(),
            video: VideoPane::Pending,
            unloaded: false,
        }));

        let observers = ObserverSet::arm(host, observer_bindings(&core, &clock, &span));
        info!("monitoring view mounted");

        drop(_entered);
        Entry::Mounted(Self {
            id,
            core,
            observers,
            config,
            pending_export: None,
            span,
        })
    }

    /// Identifier used in this view's tracing span
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Media the view asks the capture device for
    pub fn capture_constraints(&self) -> CaptureConstraints {
        self.config.capture
    }

    /// Request a stream from `device` and apply the result
    pub fn start_capture(&mut self, device: &mut dyn CaptureDevice) -> CaptureOutcome {
        let result = device.request(&self.config.capture);
        self.complete_capture(result)
    }

    /// Apply the result of a capture request.
    ///
    /// Results that arrive once the view has left `Initializing`, or after the
    /// unload guard fired, are never bound; a granted stream is stopped on the
    /// spot.
    pub fn complete_capture(
        &mut self,
        result: Result<Box<dyn CaptureStream>, CaptureError>,
    ) -> CaptureOutcome {
        let _entered = self.span.enter();
        let mut core = self.core.borrow_mut();

        if core.state != ViewState::Initializing || core.unloaded {
            if let Ok(mut stream) = result {
                stream.stop_all_tracks();
                info!(state = ?core.state, unloaded = core.unloaded, "late capture grant released");
            }
            return CaptureOutcome::Discarded;
        }

        core.state = ViewState::Active;
        match result {
            Ok(stream) => {
                core.capture.acquire(stream);
                core.video = VideoPane::Live;
                info!("capture stream bound");
                CaptureOutcome::Bound
            }
            Err(error) => {
                warn!(%error, "capture unavailable; continuing without video");
                core.video = VideoPane::Error(self.config.capture_error_message.clone());
                CaptureOutcome::Degraded
            }
        }
    }

    /// Leave the meeting.
    ///
    /// Stops capture, disarms observers and freezes the export. Returns the
    /// delay after which [`MonitoringView::finish`] should run.
    pub fn leave(&mut self) -> Result<Duration, MonitorError> {
        let _entered = self.span.enter();
        let mut core = self.core.borrow_mut();

        if !core.state.is_observing() {
            return Err(MonitorError::InvalidTransition {
                action: "leave",
                state: core.state,
            });
        }

        core.stop_capture();
        core.state = ViewState::Terminating;
        let score = core.log.rescore();
        drop(core);

        self.observers.disarm();

        let core = self.core.borrow();
        self.pending_export = Some(ExportDocument::build(
            &core.session,
            core.log.events(),
            &self.config.points,
        ));
        info!(score, events = core.log.len(), "leaving meeting");

        Ok(self.config.export_delay())
    }

    /// Export the frozen log and hand control back to the form.
    ///
    /// Delivery failures are logged and otherwise ignored.
    pub fn finish(&mut self, exporter: &mut dyn Exporter) -> Result<ExitReport, MonitorError> {
        let _entered = self.span.enter();

        let state = self.state();
        let document = match (state, self.pending_export.take()) {
            (ViewState::Terminating, Some(document)) => document,
            _ => {
                return Err(MonitorError::InvalidTransition {
                    action: "finish",
                    state,
                })
            }
        };

        let delivered = match export_document(&document, exporter) {
            Ok(file_name) => {
                debug!(file = %file_name, "export delivered");
                true
            }
            Err(error) => {
                warn!(%error, "export failed");
                false
            }
        };

        self.core.borrow_mut().state = ViewState::Terminated;
        self.observers.disarm();
        info!("monitoring view terminated");

        Ok(ExitReport {
            route: Route::Form,
            file_name: document.file_name(),
            delivered,
            summary: document.summary,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> ViewState {
        self.core.borrow().state
    }

    /// Current cheating score
    pub fn score(&self) -> u32 {
        self.core.borrow().log.score()
    }

    /// Number of recorded behavior events
    pub fn event_count(&self) -> usize {
        self.core.borrow().log.len()
    }

    /// Copy of the event log
    pub fn events(&self) -> Vec<BehaviorEvent> {
        self.core.borrow().log.events().to_vec()
    }

    pub fn session(&self) -> Session {
        self.core.borrow().session.clone()
    }

    pub fn video(&self) -> VideoPane {
        self.core.borrow().video.clone()
    }

    /// Whether a capture stream is still held
    pub fn is_capturing(&self) -> bool {
        self.core.borrow().capture.is_active()
    }

    /// Whether observers are still armed
    pub fn is_observing(&self) -> bool {
        self.observers.is_armed()
    }

    /// Export frozen by the last leave, if finish has not run yet
    pub fn pending_export(&self) -> Option<&ExportDocument> {
        self.pending_export.as_ref()
    }

    /// Detach the frozen export so it outlives the view
    pub(crate) fn take_pending_export(&mut self) -> Option<ExportDocument> {
        self.pending_export.take()
    }

    /// Render model for the current state
    pub fn snapshot(&self) -> ViewSnapshot {
        let core = self.core.borrow();
        ViewSnapshot {
            view_id: self.id,
            user: core.session.clone(),
            state: core.state,
            video: core.video.clone(),
            score: core.log.score(),
            event_count: core.log.len(),
        }
    }
}

impl<H: HostSurface + ?Sized> Drop for MonitoringView<H> {
    fn drop(&mut self) {
        let _entered = self.span.enter();
        self.observers.disarm();
        if let Ok(mut core) = self.core.try_borrow_mut() {
            core.stop_capture();
        }
        if let Some(document) = self.pending_export.take() {
            warn!(file = %document.file_name(), "view unmounted before export; log dropped");
        }
        debug!("monitoring view unmounted");
    }
}

fn observer_bindings(
    core: &Rc<RefCell<ViewCore>>,
    clock: &Rc<dyn Clock>,
    span: &Span,
) -> Vec<(HostEventKind, Listener)> {
    HostEventKind::ALL
        .into_iter()
        .map(|kind| {
            let core = Rc::downgrade(core);
            let clock = Rc::clone(clock);
            let span = span.clone();
            let listener: Listener = Rc::new(move |event: HostEventKind| {
                let _entered = span.enter();
                let Some(shared) = core.upgrade() else {
                    return;
                };
                match shared.try_borrow_mut() {
                    Ok(mut view) => view.observe(event, clock.now()),
                    Err(_) => warn!(event = %event, "view busy; host event dropped"),
                };
            });
            (kind, listener)
        })
        .collect()
}
