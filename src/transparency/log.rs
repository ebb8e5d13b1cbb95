//! Privacy-preserving transparency log.
//!
//! Counts what the companion has done with the camera feed, without keeping
//! any frame content, so the user can check that frames are analyzed and
//! discarded rather than stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Transparency counters for the current run.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Frames passed to the detector
    frames_analyzed: AtomicU64,
    /// State transitions written to a session timeline
    transitions_recorded: AtomicU64,
    /// Nudges shown to the user
    nudges_shown: AtomicU64,
    /// Sessions started
    sessions_started: AtomicU64,
    /// When this log was created
    run_start: DateTime<Utc>,
    /// Path for persisting counters
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            frames_analyzed: AtomicU64::new(0),
            transitions_recorded: AtomicU64::new(0),
            nudges_shown: AtomicU64::new(0),
            sessions_started: AtomicU64::new(0),
            run_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that loads and saves its counters at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous transparency stats: {e}");
        }

        log
    }

    pub fn record_frame_analyzed(&self) {
        self.frames_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transition(&self) {
        self.transitions_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_nudge(&self) {
        self.nudges_shown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
            transitions_recorded: self.transitions_recorded.load(Ordering::Relaxed),
            nudges_shown: self.nudges_shown.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_seconds().max(0) as u64,
        }
    }

    /// Summary for display at the end of a run.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - Frames analyzed: {}\n\
             - State transitions recorded: {}\n\
             - Nudges shown: {}\n\
             - Sessions started: {}\n\
             - Run duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No video or audio stored or transmitted\n\
             - Frames are discarded right after analysis\n\
             - Only focus states and timings are retained",
            stats.frames_analyzed,
            stats.transitions_recorded,
            stats.nudges_shown,
            stats.sessions_started,
            stats.run_duration_secs
        )
    }

    /// Save counters to disk, if persistence is configured.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                frames_analyzed: stats.frames_analyzed,
                transitions_recorded: stats.transitions_recorded,
                nudges_shown: stats.nudges_shown,
                sessions_started: stats.sessions_started,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_analyzed
                    .store(persisted.frames_analyzed, Ordering::Relaxed);
                self.transitions_recorded
                    .store(persisted.transitions_recorded, Ordering::Relaxed);
                self.nudges_shown
                    .store(persisted.nudges_shown, Ordering::Relaxed);
                self.sessions_started
                    .store(persisted.sessions_started, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn reset(&self) {
        self.frames_analyzed.store(0, Ordering::Relaxed);
        self.transitions_recorded.store(0, Ordering::Relaxed);
        self.nudges_shown.store(0, Ordering::Relaxed);
        self.sessions_started.store(0, Ordering::Relaxed);
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the transparency counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub frames_analyzed: u64,
    pub transitions_recorded: u64,
    pub nudges_shown: u64,
    pub sessions_started: u64,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    frames_analyzed: u64,
    transitions_recorded: u64,
    nudges_shown: u64,
    sessions_started: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let log = TransparencyLog::new();
        log.record_frame_analyzed();
        log.record_frame_analyzed();
        log.record_transition();
        log.record_nudge();

        let stats = log.stats();
        assert_eq!(stats.frames_analyzed, 2);
        assert_eq!(stats.transitions_recorded, 1);
        assert_eq!(stats.nudges_shown, 1);
        assert_eq!(stats.sessions_started, 0);

        log.reset();
        assert_eq!(log.stats().frames_analyzed, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("study-companion-transparency-{}", uuid::Uuid::new_v4()))
            .join("transparency.json");

        let log = TransparencyLog::with_persistence(path.clone());
        log.record_frame_analyzed();
        log.record_session_started();
        log.save().unwrap();

        let reloaded = TransparencyLog::with_persistence(path.clone());
        assert_eq!(reloaded.stats().frames_analyzed, 1);
        assert_eq!(reloaded.stats().sessions_started, 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_summary_mentions_privacy() {
        let summary = TransparencyLog::new().summary();
        assert!(summary.contains("Frames analyzed"));
        assert!(summary.contains("Privacy Guarantee"));
        assert!(summary.contains("No video or audio stored"));
    }
}
