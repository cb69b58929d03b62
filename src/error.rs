//! Error types for meetwatch

use thiserror::Error;

use crate::monitor::view::ViewState;

/// Errors that can occur while running or exporting a monitoring session
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Session rejected: {0}")]
    SessionRejected(#[from] FormError),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Cannot {action} while monitoring view is {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: ViewState,
    },

    #[error("Inconsistent meeting log summary: {0}")]
    InconsistentSummary(String),

    #[error("Unknown host event: {0}")]
    UnknownHostEvent(String),
}

/// Reasons the session form refuses to submit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Name is required")]
    MissingName,

    #[error("Email is required")]
    MissingEmail,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}
