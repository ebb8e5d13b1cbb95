//! Focus detection for the study companion.
//!
//! Frames come from a [`FrameSource`], and a [`DetectionService`] turns each
//! one into a [`DetectionSample`]. The classifier is a simulation; see
//! [`simulator`] for how states are drawn.

pub mod camera;
pub mod service;
pub mod simulator;
pub mod types;

// Re-export commonly used types
pub use camera::{CameraConfig, CameraError, Frame, FrameSource, SyntheticCamera};
pub use service::{DetectionService, DEFAULT_HISTORY_CAPACITY, DEFAULT_PROCESSING_DELAY};
pub use simulator::{adjusted_weights, fatigue_multiplier, StateSimulator, BASE_WEIGHTS};
pub use types::{
    DetectionSample, Detections, FocusState, HeadPose, ParseFocusStateError, StressIndicators,
};
