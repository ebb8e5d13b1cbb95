//! Session and session-event records.
//!
//! Field names serialize in camelCase to match the dashboard's JSON.

use crate::core::aggregation::SessionStats;
use crate::detection::FocusState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One continuous monitoring interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds from start to the last refresh (or to the end, once ended)
    pub total_duration: u64,
    pub focused_time: u64,
    pub drowsy_time: u64,
    pub distracted_time: u64,
    pub stressed_time: u64,
    /// Percentage of total duration spent focused
    pub focus_score: f64,
    pub current_state: FocusState,
}

impl Session {
    /// A fresh session starting at `start_time`.
    pub fn new(user_id: Option<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            start_time,
            end_time: None,
            total_duration: 0,
            focused_time: 0,
            drowsy_time: 0,
            distracted_time: 0,
            stressed_time: 0,
            focus_score: 0.0,
            current_state: FocusState::Focused,
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// Copy computed stats into the running totals.
    pub fn apply_stats(&mut self, stats: &SessionStats) {
        self.focused_time = stats.focused_time;
        self.drowsy_time = stats.drowsy_time;
        self.distracted_time = stats.distracted_time;
        self.stressed_time = stats.stressed_time;
        self.total_duration = stats.total_duration;
        self.focus_score = f64::from(stats.focus_score);
    }

    /// The running totals as a stats value.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            focus_score: self.focus_score.round().clamp(0.0, 100.0) as u32,
            focused_time: self.focused_time,
            drowsy_time: self.drowsy_time,
            distracted_time: self.distracted_time,
            stressed_time: self.stressed_time,
            total_duration: self.total_duration,
        }
    }

    /// Mark the session ended at `at`, freezing its total duration.
    pub fn end(&mut self, at: DateTime<Utc>) {
        self.total_duration = (at - self.start_time).num_seconds().max(0) as u64;
        self.end_time = Some(at);
    }

    /// Apply a partial update.
    pub fn apply_patch(&mut self, patch: &SessionPatch) {
        if let Some(end_time) = patch.end_time {
            self.end_time = Some(end_time);
        }
        if let Some(v) = patch.total_duration {
            self.total_duration = v;
        }
        if let Some(v) = patch.focused_time {
            self.focused_time = v;
        }
        if let Some(v) = patch.drowsy_time {
            self.drowsy_time = v;
        }
        if let Some(v) = patch.distracted_time {
            self.distracted_time = v;
        }
        if let Some(v) = patch.stressed_time {
            self.stressed_time = v;
        }
        if let Some(v) = patch.focus_score {
            self.focus_score = v;
        }
        if let Some(state) = patch.current_state {
            self.current_state = state;
        }
    }
}

/// Body of a create-session request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Partial session update; absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drowsy_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distracted_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stressed_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<FocusState>,
}

impl SessionPatch {
    /// A patch carrying a full set of stats.
    pub fn from_stats(stats: &SessionStats) -> Self {
        Self {
            total_duration: Some(stats.total_duration),
            focused_time: Some(stats.focused_time),
            drowsy_time: Some(stats.drowsy_time),
            distracted_time: Some(stats.distracted_time),
            stressed_time: Some(stats.stressed_time),
            focus_score: Some(f64::from(stats.focus_score)),
            ..Self::default()
        }
    }
}

/// A recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    pub id: Uuid,
    pub session_id: Uuid,
    /// When the transition was recorded
    pub timestamp: DateTime<Utc>,
    /// The state entered at `timestamp`
    pub state: FocusState,
    pub confidence: f64,
}

impl SessionEvent {
    pub fn new(
        session_id: Uuid,
        timestamp: DateTime<Utc>,
        state: FocusState,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            timestamp,
            state,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Body of an append-event request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionEvent {
    pub state: FocusState,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.8
}

/// A session with its full timeline, as exported at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session: Session,
    pub events: Vec<SessionEvent>,
    pub stats: SessionStats,
}
