//! Monitoring configuration
//!
//! Every field has a default, so an empty JSON object (or no file at all) is a
//! valid configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MonitorError;
use crate::scoring::PointTable;

/// Delay between leaving the view and exporting the log
pub const DEFAULT_EXPORT_DELAY_MS: u64 = 1000;

/// Message shown in place of video when capture fails
pub const DEFAULT_CAPTURE_ERROR_MESSAGE: &str =
    "Unable to access the camera. Please check your settings.";

/// Which media kinds to request from the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Configuration for a monitoring view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Points per event type
    pub points: PointTable,
    /// Milliseconds between leave and export
    pub export_delay_ms: u64,
    /// Media requested from the capture device
    pub capture: CaptureConstraints,
    /// Placeholder text when capture fails
    pub capture_error_message: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            points: PointTable::default(),
            export_delay_ms: DEFAULT_EXPORT_DELAY_MS,
            capture: CaptureConstraints::default(),
            capture_error_message: DEFAULT_CAPTURE_ERROR_MESSAGE.to_string(),
        }
    }
}

impl MonitorConfig {
    /// Parse configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MonitorError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        debug!(path = %path.display(), "loading monitor configuration");
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, MonitorError> {
        serde_json::to_string_pretty(self).map_err(MonitorError::JsonError)
    }

    /// Reject configurations that request no media at all
    pub fn validate(&self) -> Result<(), MonitorError> {
        if !self.capture.audio && !self.capture.video {
            return Err(MonitorError::ConfigError(
                "capture must request at least one of audio or video".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay between leaving and exporting
    pub fn export_delay(&self) -> Duration {
        Duration::from_millis(self.export_delay_ms)
    }

    /// Same configuration with the export delay removed
    pub fn without_delay(mut self) -> Self {
        self.export_delay_ms = 0;
        self
    }
}
