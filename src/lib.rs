//! meetwatch - Behavior monitoring engine for video meeting sessions
//!
//! A participant fills in the session form, then a monitoring view holds the
//! camera/microphone stream and listens for window and clipboard activity.
//! Every observed behavior is logged with a timestamp and feeds a capped
//! cheating score; leaving the meeting releases the stream and exports the log
//! as JSON.
//!
//! ## Modules
//!
//! - **Form and routing**: [`form`], [`app`]
//! - **Monitoring**: [`monitor`] (host events, observer set, capture stream,
//!   event log, lifecycle view, export)
//! - **Scoring**: [`scoring`]
//! - **Replay**: [`replay`] drives a whole session from an event script

pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod form;
pub mod monitor;
pub mod replay;
pub mod scoring;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use app::{MeetingApp, Route, Router};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MonitorConfig;
pub use error::{FormError, MonitorError};
pub use form::SessionForm;
pub use monitor::{EventHub, HostEventKind, MonitoringView, ViewState};
pub use replay::{parse_script, replay_session, ScriptStep};
pub use scoring::{score, PointTable, MAX_SCORE};
pub use types::{BehaviorEvent, BehaviorEventType, ExportDocument, ExportSummary, Session};

/// meetwatch version
pub const MEETWATCH_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name used in diagnostics
pub const PRODUCER_NAME: &str = "meetwatch";
