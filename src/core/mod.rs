//! Core functionality for the study companion.
//!
//! This module contains:
//! - Aggregation of a session's event timeline into per-state durations
//! - The state at an instant and sampled timeline series
//! - The recording rule deciding which observations become events
//! - Nudges for unfocused states and duration formatting
//! - Goodness-of-fit checks for the simulated state distribution

pub mod aggregation;
pub mod distribution;
pub mod format;
pub mod nudge;
pub mod recording;
pub mod timeline;

// Re-export commonly used types
pub use aggregation::{aggregate, SessionStats};
pub use distribution::{chi_squared_fit, FitError, FitReport, StateTally};
pub use format::{format_duration, format_timer};
pub use nudge::{Nudge, NudgePolicy};
pub use recording::{decide, RecordDecision};
pub use timeline::{series, state_at, TimelinePoint};
