//! Meeting log export
//!
//! Builds the downloadable JSON document from a session and its event log and
//! hands it to an [`Exporter`]. Delivery is fire-and-forget from the view's
//! point of view: failures are reported to the caller, who logs them.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::MonitorError;
use crate::scoring::{EventTally, PointTable};
use crate::types::{BehaviorEvent, ExportDocument, ExportSummary, Session};

/// Suffix appended to the participant's name to form the file name
pub const FILE_SUFFIX: &str = "_meeting_log.json";

impl ExportDocument {
    /// Build a document from a session and its ordered events
    pub fn build(session: &Session, events: &[BehaviorEvent], points: &PointTable) -> Self {
        let tally = EventTally::from_events(events);
        Self {
            user: session.clone(),
            events: events.to_vec(),
            summary: ExportSummary {
                window_controls: tally.window_control,
                copy_pastes: tally.copy_paste,
                score: points.score(events),
            },
        }
    }

    /// Download name: `<name>_meeting_log.json`
    pub fn file_name(&self) -> String {
        format!("{}{}", self.user.name, FILE_SUFFIX)
    }

    /// Serialize to pretty JSON with two-space indentation
    pub fn to_json(&self) -> Result<String, MonitorError> {
        serde_json::to_string_pretty(self).map_err(MonitorError::JsonError)
    }

    /// Parse a previously exported document
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        serde_json::from_str(json)
            .map_err(|e| MonitorError::ParseError(format!("Failed to parse meeting log: {}", e)))
    }

    /// Summary recomputed from the events
    pub fn recompute_summary(&self, points: &PointTable) -> ExportSummary {
        Self::build(&self.user, &self.events, points).summary
    }

    /// Check that the stored summary agrees with the events
    pub fn verify(&self, points: &PointTable) -> Result<(), MonitorError> {
        let expected = self.recompute_summary(points);
        let actual = self.summary;

        if actual.window_controls != expected.window_controls {
            return Err(MonitorError::InconsistentSummary(format!(
                "windowControls is {} but the log holds {}",
                actual.window_controls, expected.window_controls
            )));
        }
        if actual.copy_pastes != expected.copy_pastes {
            return Err(MonitorError::InconsistentSummary(format!(
                "copyPastes is {} but the log holds {}",
                actual.copy_pastes, expected.copy_pastes
            )));
        }
        if actual.score != expected.score {
            return Err(MonitorError::InconsistentSummary(format!(
                "score is {} but the events score {}",
                actual.score, expected.score
            )));
        }
        Ok(())
    }
}

/// Destination for exported meeting logs
pub trait Exporter {
    fn deliver(&mut self, file_name: &str, contents: &str) -> Result<(), MonitorError>;
}

/// Collects exports in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryExporter {
    files: Vec<(String, String)>,
}

impl MemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivered `(file name, contents)` pair, oldest first
    pub fn files(&self) -> &[(String, String)] {
        &self.files
    }

    pub fn last(&self) -> Option<&(String, String)> {
        self.files.last()
    }
}

impl Exporter for MemoryExporter {
    fn deliver(&mut self, file_name: &str, contents: &str) -> Result<(), MonitorError> {
        self.files.push((file_name.to_string(), contents.to_string()));
        Ok(())
    }
}

/// Writes exports into a directory, like a browser download folder
#[derive(Debug, Clone)]
pub struct DirectoryExporter {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectoryExporter {
    /// Write into `dir`, creating it on first delivery
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

/// Make a download name safe to use as a single path component
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

impl Exporter for DirectoryExporter {
    fn deliver(&mut self, file_name: &str, contents: &str) -> Result<(), MonitorError> {
        fs::create_dir_all(&self.dir)?;

        let target = self.dir.join(sanitize_file_name(file_name));
        let partial = target.with_extension("json.part");

        let result = fs::write(&partial, contents).and_then(|()| fs::rename(&partial, &target));
        if result.is_err() {
            // The temporary file is released whether or not the rename succeeded
            let _ = fs::remove_file(&partial);
        }
        result?;

        info!(path = %target.display(), bytes = contents.len(), "meeting log exported");
        self.written.push(target);
        Ok(())
    }
}

/// Serialize a document and deliver it
pub fn export_document(
    document: &ExportDocument,
    exporter: &mut dyn Exporter,
) -> Result<String, MonitorError> {
    let file_name = document.file_name();
    let json = document.to_json()?;
    debug!(file = %file_name, events = document.events.len(), "delivering meeting log");
    exporter.deliver(&file_name, &json)?;
    Ok(file_name)
}
