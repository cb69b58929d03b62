//! Append-only behavioral event log

use tracing::debug;

use crate::scoring::{EventTally, PointTable};
use crate::types::{BehaviorEvent, BehaviorEventType};

/// Ordered log of behavioral events with its current score
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<BehaviorEvent>,
    points: PointTable,
    score: u32,
}

impl EventLog {
    /// Create an empty log scored with `points`
    pub fn new(points: PointTable) -> Self {
        Self {
            events: Vec::new(),
            points,
            score: 0,
        }
    }

    /// Append an event and return the recomputed score
    pub fn append(&mut self, event: BehaviorEvent) -> u32 {
        let event_type = event.event_type;
        self.events.push(event);
        self.score = self.points.score(&self.events);
        debug!(
            event = event_type.as_str(),
            events = self.events.len(),
            score = self.score,
            "behavior logged"
        );
        self.score
    }

    /// Recompute the score from the full log
    pub fn rescore(&mut self) -> u32 {
        self.score = self.points.score(&self.events);
        self.score
    }

    /// Score as of the last append
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Events in the order they were recorded
    pub fn events(&self) -> &[BehaviorEvent] {
        &self.events
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events of one type
    pub fn count(&self, event_type: BehaviorEventType) -> u32 {
        self.tally().get(event_type)
    }

    /// Per-type counts of the whole log
    pub fn tally(&self) -> EventTally {
        EventTally::from_events(&self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(ty: BehaviorEventType) -> BehaviorEvent {
        BehaviorEvent::new(ty, Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap())
    }

    #[test]
    fn test_append_recomputes_score() {
        let mut log = EventLog::default();

        assert_eq!(log.append(event(BehaviorEventType::WindowControl)), 10);
        assert_eq!(log.append(event(BehaviorEventType::WindowControl)), 20);
        assert_eq!(log.append(event(BehaviorEventType::CopyPaste)), 25);
        assert_eq!(log.score(), 25);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_order_is_preserved() {
        let mut log = EventLog::default();
        log.append(event(BehaviorEventType::CopyPaste));
        log.append(event(BehaviorEventType::CameraOff));

        let types: Vec<_> = log.events().iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![BehaviorEventType::CopyPaste, BehaviorEventType::CameraOff]
        );
    }

    #[test]
    fn test_custom_points() {
        let mut log = EventLog::new(PointTable {
            copy_paste: 40,
            ..PointTable::default()
        });

        log.append(event(BehaviorEventType::CopyPaste));
        log.append(event(BehaviorEventType::CopyPaste));
        assert_eq!(log.append(event(BehaviorEventType::CopyPaste)), 100);
        assert_eq!(log.count(BehaviorEventType::CopyPaste), 3);
    }

    #[test]
    fn test_rescore_is_stable() {
        let mut log = EventLog::default();
        log.append(event(BehaviorEventType::TabSwitch));

        assert_eq!(log.rescore(), 10);
        assert_eq!(log.rescore(), 10);
    }
}
