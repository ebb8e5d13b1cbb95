//! Session statistics from an event timeline.
//!
//! A session's events form a step function: the state at any instant is the
//! state of the latest event at or before it, or `Focused` before the first
//! event. Integrating that function between the session start and "now"
//! gives the time spent in each state.

use crate::detection::FocusState;
use crate::session::model::SessionEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-state durations and the derived focus score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Rounded percentage of total duration spent focused (0-100)
    pub focus_score: u32,
    pub focused_time: u64,
    pub drowsy_time: u64,
    pub distracted_time: u64,
    pub stressed_time: u64,
    pub total_duration: u64,
}

impl SessionStats {
    /// Seconds spent in `state`.
    pub fn time_in(&self, state: FocusState) -> u64 {
        match state {
            FocusState::Focused => self.focused_time,
            FocusState::Drowsy => self.drowsy_time,
            FocusState::Distracted => self.distracted_time,
            FocusState::Stressed => self.stressed_time,
        }
    }

    /// Sum of the four state buckets.
    pub fn bucket_total(&self) -> u64 {
        FocusState::ALL.iter().map(|s| self.time_in(*s)).sum()
    }

    /// Whether any time has been accounted yet.
    pub fn is_empty(&self) -> bool {
        self.total_duration == 0 && self.bucket_total() == 0
    }
}

/// Whole seconds from `from` to `to`, never negative.
fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_seconds().max(0) as u64
}

/// Compute session statistics from `start` to `now`.
///
/// Events may arrive in any order; they are stably sorted by timestamp
/// first. Timestamps outside `[start, now]` are clamped into it. Every
/// interval between consecutive boundaries is truncated to whole seconds.
/// Consecutive events with the same state simply extend that state's bucket.
///
/// With no events at all the result is all zeros, whatever the elapsed time.
/// Callers read that as "no data yet".
pub fn aggregate(start: DateTime<Utc>, events: &[SessionEvent], now: DateTime<Utc>) -> SessionStats {
    if events.is_empty() {
        return SessionStats::default();
    }

    let mut ordered: Vec<&SessionEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.timestamp);

    // Each interval is floored on its own, so with sub-second timestamps the
    // buckets may fall short of the total by under a second per event.
    let end = now.max(start);
    let mut buckets = [0u64; 4];
    let mut current = FocusState::Focused;
    let mut cursor = start;

    for event in ordered {
        let at = event.timestamp.clamp(start, end);
        buckets[current.index()] += elapsed_secs(cursor, at);
        current = event.state;
        cursor = cursor.max(at);
    }
    buckets[current.index()] += elapsed_secs(cursor, end);

    let total_duration = elapsed_secs(start, now);
    let focused_time = buckets[FocusState::Focused.index()];
    let focus_score = if total_duration > 0 {
        ((focused_time as f64 / total_duration as f64) * 100.0)
            .round()
            .clamp(0.0, 100.0) as u32
    } else {
        0
    };

    SessionStats {
        focus_score,
        focused_time,
        drowsy_time: buckets[FocusState::Drowsy.index()],
        distracted_time: buckets[FocusState::Distracted.index()],
        stressed_time: buckets[FocusState::Stressed.index()],
        total_duration,
    }
}
