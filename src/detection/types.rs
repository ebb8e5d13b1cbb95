//! Detection result types.
//!
//! A [`DetectionSample`] is what the classifier (here, the simulator) reports
//! for a single frame: an inferred [`FocusState`], a confidence and a set of
//! illustrative facial readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inferred attentiveness of the user. Exactly one applies at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FocusState {
    #[default]
    Focused,
    Drowsy,
    Distracted,
    Stressed,
}

impl FocusState {
    /// All states, in bucket order.
    pub const ALL: [FocusState; 4] = [
        FocusState::Focused,
        FocusState::Drowsy,
        FocusState::Distracted,
        FocusState::Stressed,
    ];

    /// Position of this state in [`FocusState::ALL`].
    pub fn index(self) -> usize {
        match self {
            FocusState::Focused => 0,
            FocusState::Drowsy => 1,
            FocusState::Distracted => 2,
            FocusState::Stressed => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FocusState::Focused => "FOCUSED",
            FocusState::Drowsy => "DROWSY",
            FocusState::Distracted => "DISTRACTED",
            FocusState::Stressed => "STRESSED",
        }
    }

    pub fn is_focused(self) -> bool {
        self == FocusState::Focused
    }
}

impl fmt::Display for FocusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown state name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown focus state '{0}' (expected focused, drowsy, distracted or stressed)")]
pub struct ParseFocusStateError(pub String);

impl FromStr for FocusState {
    type Err = ParseFocusStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "focused" => Ok(FocusState::Focused),
            "drowsy" => Ok(FocusState::Drowsy),
            "distracted" => Ok(FocusState::Distracted),
            "stressed" => Ok(FocusState::Stressed),
            _ => Err(ParseFocusStateError(s.to_string())),
        }
    }
}

/// Head orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeadPose {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Stress-related facial readings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressIndicators {
    /// Facial muscle tension (0-1)
    pub facial_tension: f64,
    /// Blinks per minute
    pub blink_rate: f64,
}

/// Per-frame facial readings backing a detection.
///
/// Nothing downstream consumes these; they exist so a dashboard has
/// something plausible to show next to the state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detections {
    pub face_detected: bool,
    pub eye_aspect_ratio: f64,
    pub head_pose: HeadPose,
    pub stress_indicators: StressIndicators,
}

/// A single classifier result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSample {
    pub state: FocusState,
    /// Confidence in the state (0-1)
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub detections: Detections,
}
