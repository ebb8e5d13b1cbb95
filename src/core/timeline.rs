//! Point queries over a session's state step function.
//!
//! The state at an instant is the state of the latest event at or before it,
//! or `Focused` when no event has happened yet. Events stamped before the
//! session start take effect at the start, as in [`crate::core::aggregate`].

use crate::detection::FocusState;
use crate::session::model::SessionEvent;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The session state sampled at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub at: DateTime<Utc>,
    pub state: FocusState,
}

/// State of the session at `at`.
///
/// Among events sharing a timestamp the one listed last wins, matching the
/// stable sort used for aggregation. Before `start` the session is
/// `Focused`.
pub fn state_at(start: DateTime<Utc>, events: &[SessionEvent], at: DateTime<Utc>) -> FocusState {
    events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.timestamp.max(start) <= at)
        .max_by_key(|(i, e)| (e.timestamp, *i))
        .map(|(_, e)| e.state)
        .unwrap_or_default()
}

/// Sample the session every `step` from `start` through `until`.
///
/// The first point is at `start` and the last at `until`, which is appended
/// when it does not fall on the grid. A non-positive `step` or an `until`
/// before `start` yields only the start point.
pub fn series(
    start: DateTime<Utc>,
    events: &[SessionEvent],
    until: DateTime<Utc>,
    step: Duration,
) -> Vec<TimelinePoint> {
    let mut ordered: Vec<&SessionEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.timestamp);

    let mut points = Vec::new();
    let mut next = ordered.into_iter().peekable();
    let mut current = FocusState::Focused;
    let mut at = start;

    loop {
        while let Some(event) = next.next_if(|e| e.timestamp.max(start) <= at) {
            current = event.state;
        }
        points.push(TimelinePoint { at, state: current });

        if step <= Duration::zero() || at >= until {
            break;
        }
        at = (at + step).min(until);
    }
    points
}
