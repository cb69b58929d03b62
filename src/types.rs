//! Core data types
//!
//! Sessions, behavioral events and the exported meeting log document. Field
//! names and casing match the downloaded JSON file exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Participant identity collected by the session form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
}

impl Session {
    /// Create a session from already validated values
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Behavioral event types that contribute to the cheating score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BehaviorEventType {
    /// Window blur, focus or resize
    WindowControl,
    /// Switching away from the meeting tab
    TabSwitch,
    /// Clipboard copy, cut or paste
    CopyPaste,
    /// Camera feed lost
    CameraOff,
}

impl BehaviorEventType {
    /// Every behavior type, in export order
    pub const ALL: [BehaviorEventType; 4] = [
        BehaviorEventType::WindowControl,
        BehaviorEventType::TabSwitch,
        BehaviorEventType::CopyPaste,
        BehaviorEventType::CameraOff,
    ];

    /// Wire name as it appears in the exported log
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorEventType::WindowControl => "windowControl",
            BehaviorEventType::TabSwitch => "tabSwitch",
            BehaviorEventType::CopyPaste => "copyPaste",
            BehaviorEventType::CameraOff => "cameraOff",
        }
    }
}

/// A single observed behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    /// Event type
    #[serde(rename = "type")]
    pub event_type: BehaviorEventType,
    /// When the event was observed
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
}

impl BehaviorEvent {
    /// Create an event of `event_type` recorded at `timestamp`
    pub fn new(event_type: BehaviorEventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            timestamp,
        }
    }
}

/// Derived counts written alongside the event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    /// Number of `windowControl` events
    pub window_controls: u32,
    /// Number of `copyPaste` events
    pub copy_pastes: u32,
    /// Final cheating score (0-100)
    pub score: u32,
}

/// The downloadable meeting log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Participant
    pub user: Session,
    /// Ordered event log
    pub events: Vec<BehaviorEvent>,
    /// Derived summary
    pub summary: ExportSummary,
}

/// Timestamps in the `Date.prototype.toISOString` shape: UTC, milliseconds, `Z`.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Format as `YYYY-MM-DDTHH:MM:SS.sssZ`
    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    /// Accepts any RFC 3339 timestamp and normalizes it to UTC
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
