//! Study Companion - focus monitoring for study sessions.
//!
//! This library tracks a study session as a timeline of focus-state
//! transitions and turns that timeline into time-per-state totals and a
//! focus score. The per-frame classifier is a simulation: states are drawn
//! from a weighted distribution that drifts with session length, smoothed so
//! the output does not flicker.
//!
//! # Privacy Guarantees
//!
//! - **No frames kept**: Camera frames are discarded right after analysis
//! - **No uploads**: Nothing leaves the machine
//! - **Minimal record**: Only focus states and their timings are retained
//! - **Transparency**: Frame analysis is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Study Companion                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Camera    │──▶│  Detection  │──▶│  Recording  │       │
//! │  │  (frames)   │   │ (simulator) │   │  (policy)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                 │                  │              │
//! │         ▼                 ▼                  ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │Transparency │   │   Nudges    │   │ Aggregation │       │
//! │  │    Log      │   │             │   │   (stats)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use study_companion::core::aggregate;
//! use study_companion::detection::FocusState;
//! use study_companion::session::SessionEvent;
//! use uuid::Uuid;
//!
//! let start = Utc::now();
//! let session = Uuid::new_v4();
//! let events = vec![
//!     SessionEvent::new(session, start + Duration::seconds(60), FocusState::Drowsy, 0.8),
//!     SessionEvent::new(session, start + Duration::seconds(180), FocusState::Focused, 0.9),
//! ];
//!
//! let stats = aggregate(start, &events, start + Duration::seconds(300));
//! assert_eq!(stats.focused_time, 180);
//! assert_eq!(stats.drowsy_time, 120);
//! assert_eq!(stats.focus_score, 60);
//! ```

pub mod clock;
pub mod config;
pub mod core;
pub mod detection;
pub mod monitor;
pub mod schedule;
pub mod session;
pub mod transparency;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{Config, ConfigError};
pub use core::{aggregate, format_duration, format_timer, Nudge, NudgePolicy, SessionStats};
pub use detection::{DetectionSample, DetectionService, FocusState, StateSimulator};
pub use monitor::{FocusMonitor, MonitorError, TickReport};
pub use schedule::{spawn_periodic, PeriodicTask};
pub use session::{Session, SessionEvent, SessionReport, SessionStore, StoreError};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

// Client re-exports (when enabled)
#[cfg(feature = "client")]
pub use client::{ApiClient, ApiConfig, ClientError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║             STUDY COMPANION - PRIVACY DECLARATION                ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This companion watches your camera to estimate focus.           ║
║                                                                  ║
║  ✓ WHAT WE KEEP:                                                 ║
║    • Your inferred focus state (focused, drowsy, ...)            ║
║    • When that state changed                                     ║
║    • Session totals and a focus score                            ║
║                                                                  ║
║  ✗ WHAT WE NEVER KEEP:                                           ║
║    • Video or images of you                                      ║
║    • Audio of any kind                                           ║
║    • Facial measurements beyond the current frame                ║
║    • Anything sent off this machine                              ║
║                                                                  ║
║  Frames are analyzed in memory and discarded immediately.        ║
║                                                                  ║
║  You can view analysis statistics anytime with:                  ║
║    study-companion status                                        ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER KEEP"));
        assert!(PRIVACY_DECLARATION.contains("Video or images"));
    }
}
