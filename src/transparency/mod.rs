//! Transparency module for the study companion.
//!
//! Tracks and exposes what the companion does with the camera feed,
//! supporting user trust.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
