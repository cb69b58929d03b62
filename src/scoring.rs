//! Cheating score computation
//!
//! The score is a pure function of the whole event log: per-type points are
//! summed and the total is clamped to [0, MAX_SCORE]. There is no decay and no
//! per-type cap, so the result does not depend on event order.

use serde::{Deserialize, Serialize};

use crate::types::{BehaviorEvent, BehaviorEventType};

/// Upper bound of the cheating score
pub const MAX_SCORE: u32 = 100;

/// Points awarded per event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointTable {
    pub window_control: u32,
    pub tab_switch: u32,
    pub copy_paste: u32,
    pub camera_off: u32,
}

impl Default for PointTable {
    fn default() -> Self {
        Self {
            window_control: 10,
            tab_switch: 10,
            copy_paste: 5,
            camera_off: 20,
        }
    }
}

impl PointTable {
    /// Points for a single event of the given type
    pub fn points(&self, event_type: BehaviorEventType) -> u32 {
        match event_type {
            BehaviorEventType::WindowControl => self.window_control,
            BehaviorEventType::TabSwitch => self.tab_switch,
            BehaviorEventType::CopyPaste => self.copy_paste,
            BehaviorEventType::CameraOff => self.camera_off,
        }
    }

    /// Score an event log from scratch
    pub fn score(&self, events: &[BehaviorEvent]) -> u32 {
        let total: u64 = events
            .iter()
            .map(|e| u64::from(self.points(e.event_type)))
            .sum();

        total.min(u64::from(MAX_SCORE)) as u32
    }
}

/// Score an event log with the default point table
pub fn score(events: &[BehaviorEvent]) -> u32 {
    PointTable::default().score(events)
}

/// Per-type event counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventTally {
    pub window_control: u32,
    pub tab_switch: u32,
    pub copy_paste: u32,
    pub camera_off: u32,
}

impl EventTally {
    /// Count events by type
    pub fn from_events(events: &[BehaviorEvent]) -> Self {
        let mut tally = Self::default();
        for event in events {
            match event.event_type {
                BehaviorEventType::WindowControl => tally.window_control += 1,
                BehaviorEventType::TabSwitch => tally.tab_switch += 1,
                BehaviorEventType::CopyPaste => tally.copy_paste += 1,
                BehaviorEventType::CameraOff => tally.camera_off += 1,
            }
        }
        tally
    }

    /// Count for one event type
    pub fn get(&self, event_type: BehaviorEventType) -> u32 {
        match event_type {
            BehaviorEventType::WindowControl => self.window_control,
            BehaviorEventType::TabSwitch => self.tab_switch,
            BehaviorEventType::CopyPaste => self.copy_paste,
            BehaviorEventType::CameraOff => self.camera_off,
        }
    }

    /// Total events across all types
    pub fn total(&self) -> u32 {
        self.window_control + self.tab_switch + self.copy_paste + self.camera_off
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn events(types: &[BehaviorEventType]) -> Vec<BehaviorEvent> {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        types
            .iter()
            .enumerate()
            .map(|(i, ty)| BehaviorEvent::new(*ty, start + Duration::seconds(i as i64)))
            .collect()
    }

    #[test]
    fn test_empty_log_scores_zero() {
        assert_eq!(score(&[]), 0);
    }

    #[test]
    fn test_default_points() {
        use BehaviorEventType::*;

        assert_eq!(score(&events(&[WindowControl])), 10);
        assert_eq!(score(&events(&[TabSwitch])), 10);
        assert_eq!(score(&events(&[CopyPaste])), 5);
        assert_eq!(score(&events(&[CameraOff])), 20);
    }

    #[test]
    fn test_two_blurs_and_a_paste() {
        use BehaviorEventType::*;

        let log = events(&[WindowControl, WindowControl, CopyPaste]);
        assert_eq!(score(&log), 25);
    }

    #[test]
    fn test_score_is_clamped() {
        let log = events(&[BehaviorEventType::CameraOff; 6]);
        assert_eq!(score(&log), MAX_SCORE);

        let log = events(&[BehaviorEventType::WindowControl; 10]);
        assert_eq!(score(&log), 100);
    }

    #[test]
    fn test_score_matches_capped_sum_for_every_prefix() {
        use BehaviorEventType::*;

        let pattern = [CopyPaste, WindowControl, CameraOff, TabSwitch, CopyPaste];
        let log = events(&pattern.repeat(5));
        let table = PointTable::default();

        let mut previous = 0;
        for len in 0..=log.len() {
            let prefix = &log[..len];
            let expected: u32 = prefix.iter().map(|e| table.points(e.event_type)).sum();
            let current = table.score(prefix);

            assert_eq!(current, expected.min(MAX_SCORE));
            assert!(current <= MAX_SCORE);
            assert!(current >= previous, "score decreased at prefix {len}");
            previous = current;
        }
    }

    #[test]
    fn test_score_is_order_independent() {
        use BehaviorEventType::*;

        let forward = events(&[CameraOff, CopyPaste, WindowControl]);
        let mut reversed = forward.clone();
        reversed.reverse();

        assert_eq!(score(&forward), score(&reversed));
    }

    #[test]
    fn test_huge_point_values_do_not_overflow() {
        let table = PointTable {
            window_control: u32::MAX,
            ..PointTable::default()
        };
        let log = events(&[BehaviorEventType::WindowControl; 3]);

        assert_eq!(table.score(&log), MAX_SCORE);
    }

    #[test]
    fn test_tally() {
        use BehaviorEventType::*;

        let tally = EventTally::from_events(&events(&[WindowControl, CopyPaste, WindowControl]));
        assert_eq!(tally.get(WindowControl), 2);
        assert_eq!(tally.get(CopyPaste), 1);
        assert_eq!(tally.get(CameraOff), 0);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_point_table_partial_override() {
        let table: PointTable = serde_json::from_str(r#"{"copy_paste": 7}"#).unwrap();
        assert_eq!(table.copy_paste, 7);
        assert_eq!(table.window_control, 10);
        assert_eq!(table.camera_off, 20);
    }
}
