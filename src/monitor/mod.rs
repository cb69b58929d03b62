//! Meeting monitoring
//!
//! This module watches host events for suspicious behavior while a meeting is
//! running, keeps the capped cheating score current and exports the log when
//! the participant leaves.
//!
//! Flow: mount → observers armed + capture request → events logged and scored
//! → leave (capture released, observers disarmed) → export → back to the form

pub mod capture;
pub mod event_log;
pub mod export;
pub mod host;
pub mod observer;
pub mod view;

pub use capture::{
    CaptureDevice, CaptureError, CaptureHandle, CaptureStream, ScriptedCamera, SharedStream,
};
pub use event_log::EventLog;
pub use export::{DirectoryExporter, Exporter, MemoryExporter};
pub use host::{EventHub, HostEventKind, HostSurface, Listener, ListenerId};
pub use observer::ObserverSet;
pub use view::{
    CaptureOutcome, Entry, ExitReport, MonitoringView, VideoPane, ViewSnapshot, ViewState,
};
