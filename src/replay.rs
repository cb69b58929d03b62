//! Scripted session replay
//!
//! Drives a full form → monitoring → export flow from a plain-text host event
//! script. One step per line: a host event name (`blur`, `paste`, ...) or
//! `leave`. Blank lines and `#` comments are skipped; steps after `leave` are
//! ignored and a script without `leave` leaves at the end.

use std::rc::Rc;

use tracing::{debug, info};

use crate::app::MeetingApp;
use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::monitor::capture::CaptureDevice;
use crate::monitor::export::Exporter;
use crate::monitor::host::{EventHub, HostEventKind};
use crate::monitor::view::ExitReport;
use crate::types::Session;

/// One line of a replay script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    Dispatch(HostEventKind),
    Leave,
}

/// Parse a replay script
pub fn parse_script(text: &str) -> Result<Vec<ScriptStep>, MonitorError> {
    let mut steps = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if trimmed.eq_ignore_ascii_case("leave") {
            steps.push(ScriptStep::Leave);
            continue;
        }

        let kind = trimmed.parse::<HostEventKind>().map_err(|_| {
            MonitorError::ParseError(format!(
                "line {}: unknown step '{}'",
                index + 1,
                trimmed
            ))
        })?;
        steps.push(ScriptStep::Dispatch(kind));
    }

    Ok(steps)
}

/// Run one complete session against an in-process host (stateless, one-shot).
///
/// The export delay from `config` is honored on the calling thread.
pub fn replay_session(
    session: &Session,
    steps: &[ScriptStep],
    device: &mut dyn CaptureDevice,
    exporter: &mut dyn Exporter,
    clock: Rc<dyn Clock>,
    config: MonitorConfig,
) -> Result<ExitReport, MonitorError> {
    let hub = Rc::new(EventHub::new());
    let mut app = MeetingApp::new(Rc::clone(&hub), clock, config);

    app.form_mut().set_name(session.name.clone());
    app.form_mut().set_email(session.email.clone());
    app.submit()?;

    let outcome = app.start_capture(device);
    debug!(?outcome, "capture resolved");

    for step in steps {
        match step {
            ScriptStep::Dispatch(kind) => {
                hub.dispatch(*kind);
            }
            ScriptStep::Leave => break,
        }
    }

    let report = app.leave_and_wait(exporter)?;
    info!(
        file = %report.file_name,
        score = report.summary.score,
        "replay finished"
    );
    Ok(report)
}
