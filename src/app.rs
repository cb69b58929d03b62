//! Two-page meeting flow
//!
//! This module ties the session form and the monitoring view together behind a
//! small router. Navigation state is transient: the session travels with one
//! navigation and is gone once the monitoring view has consumed it.

use std::rc::Rc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::error::{FormError, MonitorError};
use crate::form::SessionForm;
use crate::monitor::capture::{CaptureDevice, CaptureError, CaptureStream};
use crate::monitor::export::{export_document, Exporter};
use crate::monitor::host::HostSurface;
use crate::monitor::view::{CaptureOutcome, Entry, ExitReport, MonitoringView, ViewState};
use crate::types::{ExportDocument, Session};

/// Pages of the meeting flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Session form
    #[default]
    Form,
    /// Monitoring view
    Monitoring,
}

/// Current route plus the state passed along with the last navigation
#[derive(Debug, Default)]
pub struct Router {
    route: Route,
    state: Option<Session>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Route {
        self.route
    }

    pub fn navigate(&mut self, route: Route, state: Option<Session>) {
        debug!(?route, with_state = state.is_some(), "navigating");
        self.route = route;
        self.state = state;
    }

    /// Consume the navigation state
    pub fn take_state(&mut self) -> Option<Session> {
        self.state.take()
    }
}

/// Stateful meeting application: form, router and at most one mounted view
pub struct MeetingApp<H: HostSurface + ?Sized> {
    host: Rc<H>,
    clock: Rc<dyn Clock>,
    config: MonitorConfig,
    router: Router,
    form: SessionForm,
    view: Option<MonitoringView<H>>,
    detached_exports: Vec<ExportDocument>,
}

impl<H: HostSurface + ?Sized> MeetingApp<H> {
    pub fn new(host: Rc<H>, clock: Rc<dyn Clock>, config: MonitorConfig) -> Self {
        Self {
            host,
            clock,
            config,
            router: Router::new(),
            form: SessionForm::new(),
            view: None,
            detached_exports: Vec::new(),
        }
    }

    pub fn route(&self) -> Route {
        self.router.current()
    }

    pub fn form(&self) -> &SessionForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut SessionForm {
        &mut self.form
    }

    pub fn view(&self) -> Option<&MonitoringView<H>> {
        self.view.as_ref()
    }

    pub fn view_mut(&mut self) -> Option<&mut MonitoringView<H>> {
        self.view.as_mut()
    }

    /// Submit the form and enter the monitoring view
    pub fn submit(&mut self) -> Result<Route, FormError> {
        let session = self.form.submit()?;
        info!(name = %session.name, "session form submitted");
        self.router.navigate(Route::Monitoring, Some(session));
        Ok(self.enter_route())
    }

    /// Navigate straight to the monitoring route without form state
    pub fn open_monitoring(&mut self) -> Route {
        self.router.navigate(Route::Monitoring, None);
        self.enter_route()
    }

    fn enter_route(&mut self) -> Route {
        if self.router.current() != Route::Monitoring {
            return self.router.current();
        }

        // Replacing a mounted view unmounts it first; a log it already froze
        // is still delivered on the next flush
        if let Some(mut previous) = self.view.take() {
            if let Some(document) = previous.take_pending_export() {
                info!(file = %document.file_name(), "export detached from replaced view");
                self.detached_exports.push(document);
            }
        }
        match MonitoringView::mount(
            self.router.take_state(),
            Rc::clone(&self.host),
            Rc::clone(&self.clock),
            self.config.clone(),
        ) {
            Entry::Mounted(view) => {
                self.view = Some(view);
                Route::Monitoring
            }
            Entry::Redirect(route) => {
                self.router.navigate(route, None);
                route
            }
        }
    }

    /// Ask `device` for a stream on behalf of the mounted view
    pub fn start_capture(&mut self, device: &mut dyn CaptureDevice) -> CaptureOutcome {
        let result = device.request(&self.config.capture);
        self.complete_capture(result)
    }

    /// Deliver a capture result; with no view mounted any stream is stopped
    pub fn complete_capture(
        &mut self,
        result: Result<Box<dyn CaptureStream>, CaptureError>,
    ) -> CaptureOutcome {
        match self.view.as_mut() {
            Some(view) => view.complete_capture(result),
            None => {
                if let Ok(mut stream) = result {
                    stream.stop_all_tracks();
                    info!("capture granted after unmount; stream stopped");
                }
                CaptureOutcome::Discarded
            }
        }
    }

    /// Begin leaving; returns the delay before [`MeetingApp::finish_leave`]
    pub fn leave(&mut self) -> Result<Duration, MonitorError> {
        match self.view.as_mut() {
            Some(view) => view.leave(),
            None => Err(MonitorError::InvalidTransition {
                action: "leave",
                state: ViewState::Terminated,
            }),
        }
    }

    /// Logs frozen by views that were replaced before they finished
    pub fn detached_exports(&self) -> &[ExportDocument] {
        &self.detached_exports
    }

    /// Deliver every detached log; returns the file names that were accepted.
    ///
    /// Failed deliveries are logged and not retried.
    pub fn flush_detached_exports(&mut self, exporter: &mut dyn Exporter) -> Vec<String> {
        let mut delivered = Vec::new();
        for document in self.detached_exports.drain(..) {
            match export_document(&document, exporter) {
                Ok(file_name) => delivered.push(file_name),
                Err(error) => warn!(%error, file = %document.file_name(), "detached export failed"),
            }
        }
        delivered
    }

    /// Export, unmount the view and return to a fresh form.
    ///
    /// Detached logs from replaced views are delivered first.
    pub fn finish_leave(&mut self, exporter: &mut dyn Exporter) -> Result<ExitReport, MonitorError> {
        self.flush_detached_exports(exporter);

        let report = match self.view.as_mut() {
            Some(view) => view.finish(exporter)?,
            None => {
                return Err(MonitorError::InvalidTransition {
                    action: "finish",
                    state: ViewState::Terminated,
                })
            }
        };

        self.view = None;
        self.form = SessionForm::new();
        self.router.navigate(report.route, None);
        Ok(report)
    }

    /// Leave, wait out the export delay on this thread, then finish
    pub fn leave_and_wait(&mut self, exporter: &mut dyn Exporter) -> Result<ExitReport, MonitorError> {
        let delay = self.leave()?;
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "waiting before export");
            thread::sleep(delay);
        }
        self.finish_leave(exporter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::monitor::capture::ScriptedCamera;
    use crate::monitor::export::MemoryExporter;
    use crate::monitor::host::{EventHub, HostEventKind};
    use crate::types::ExportDocument;

    fn app(hub: &Rc<EventHub>) -> MeetingApp<EventHub> {
        MeetingApp::new(
            Rc::clone(hub),
            Rc::new(SystemClock),
            MonitorConfig::default().without_delay(),
        )
    }

    #[test]
    fn test_full_flow() {
        let hub = Rc::new(EventHub::new());
        let mut app = app(&hub);
        let mut camera = ScriptedCamera::granting();

        app.form_mut().set_name("Ana");
        app.form_mut().set_email("a@x.com");
        assert_eq!(app.submit(), Ok(Route::Monitoring));
        assert_eq!(app.start_capture(&mut camera), CaptureOutcome::Bound);

        hub.dispatch(HostEventKind::Blur);
        hub.dispatch(HostEventKind::Blur);
        hub.dispatch(HostEventKind::Paste);
        assert_eq!(app.view().unwrap().score(), 25);

        let mut exporter = MemoryExporter::new();
        let report = app.leave_and_wait(&mut exporter).unwrap();

        assert_eq!(report.file_name, "Ana_meeting_log.json");
        assert_eq!(report.summary.score, 25);
        assert_eq!(report.summary.window_controls, 2);
        assert_eq!(report.summary.copy_pastes, 1);

        let doc = ExportDocument::from_json(&exporter.last().unwrap().1).unwrap();
        assert_eq!(doc.user, Session::new("Ana", "a@x.com"));

        assert_eq!(app.route(), Route::Form);
        assert!(app.view().is_none());
        assert_eq!(app.form().name(), "");
        assert_eq!(hub.listener_count(), 0);
        assert_eq!(camera.live_tracks(), 0);
    }

    #[test]
    fn test_direct_navigation_redirects() {
        let hub = Rc::new(EventHub::new());
        let mut app = app(&hub);

        assert_eq!(app.open_monitoring(), Route::Form);
        assert_eq!(app.route(), Route::Form);
        assert!(app.view().is_none());
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_invalid_form_stays_on_form() {
        let hub = Rc::new(EventHub::new());
        let mut app = app(&hub);
        app.form_mut().set_name("Ana");

        assert_eq!(app.submit(), Err(FormError::MissingEmail));
        assert_eq!(app.route(), Route::Form);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_navigation_state_is_consumed() {
        let mut router = Router::new();
        router.navigate(Route::Monitoring, Some(Session::new("Ana", "a@x.com")));

        assert!(router.take_state().is_some());
        assert!(router.take_state().is_none());
    }

    #[test]
    fn test_capture_after_unmount_is_stopped() {
        let hub = Rc::new(EventHub::new());
        let mut app = app(&hub);
        let mut camera = ScriptedCamera::granting();

        app.form_mut().set_name("Ana");
        app.form_mut().set_email("a@x.com");
        app.submit().unwrap();
        app.leave_and_wait(&mut MemoryExporter::new()).unwrap();

        assert_eq!(app.start_capture(&mut camera), CaptureOutcome::Discarded);
        assert_eq!(camera.live_tracks(), 0);
    }

    #[test]
    fn test_resubmit_during_export_delay_keeps_the_log() {
        let hub = Rc::new(EventHub::new());
        let mut app = MeetingApp::new(
            Rc::clone(&hub),
            Rc::new(SystemClock),
            MonitorConfig::default(),
        );

        app.form_mut().set_name("Ana");
        app.form_mut().set_email("a@x.com");
        app.submit().unwrap();
        hub.dispatch(HostEventKind::Blur);
        assert_eq!(app.leave().unwrap(), Duration::from_millis(1000));

        app.form_mut().set_name("Bo");
        app.form_mut().set_email("b@x.com");
        assert_eq!(app.submit(), Ok(Route::Monitoring));
        assert_eq!(app.detached_exports().len(), 1);
        assert_eq!(app.view().unwrap().state(), ViewState::Initializing);

        let mut exporter = MemoryExporter::new();
        assert!(app.finish_leave(&mut exporter).is_err());
        assert!(app.detached_exports().is_empty());

        let (name, contents) = exporter.last().unwrap();
        assert_eq!(name, "Ana_meeting_log.json");
        let doc = ExportDocument::from_json(contents).unwrap();
        assert_eq!(doc.summary.window_controls, 1);
        assert_eq!(doc.summary.score, 10);
    }

    #[test]
    fn test_flush_detached_exports() {
        let hub = Rc::new(EventHub::new());
        let mut app = app(&hub);
        let mut exporter = MemoryExporter::new();
        assert!(app.flush_detached_exports(&mut exporter).is_empty());

        app.form_mut().set_name("Ana");
        app.form_mut().set_email("a@x.com");
        app.submit().unwrap();
        app.leave().unwrap();
        app.submit().unwrap();

        assert_eq!(
            app.flush_detached_exports(&mut exporter),
            vec!["Ana_meeting_log.json".to_string()]
        );
        assert_eq!(exporter.files().len(), 1);
        assert!(app.flush_detached_exports(&mut exporter).is_empty());
    }

    #[test]
    fn test_leave_without_view_is_rejected() {
        let hub = Rc::new(EventHub::new());
        let mut app = app(&hub);

        assert!(app.leave().is_err());
        assert!(app.finish_leave(&mut MemoryExporter::new()).is_err());
    }

    #[test]
    fn test_each_visit_gets_a_fresh_log() {
        let hub = Rc::new(EventHub::new());
        let mut app = app(&hub);

        for _ in 0..2 {
            app.form_mut().set_name("Ana");
            app.form_mut().set_email("a@x.com");
            app.submit().unwrap();
            hub.dispatch(HostEventKind::Copy);

            let report = app.leave_and_wait(&mut MemoryExporter::new()).unwrap();
            assert_eq!(report.summary.copy_pastes, 1);
        }
    }
}
