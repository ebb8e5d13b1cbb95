//! The detection loop: camera frame -> classifier -> timeline -> nudge.
//!
//! A [`FocusMonitor`] owns one session in a [`SharedSessionStore`] and runs a
//! single detection step per [`FocusMonitor::tick`]. Scheduling the ticks,
//! the stats refresh and the timer display is left to the caller (see
//! [`crate::schedule`]).

use crate::core::nudge::{Nudge, NudgePolicy};
use crate::detection::{CameraError, DetectionSample, DetectionService, FrameSource};
use crate::session::{SessionEvent, SharedSessionStore, StoreError};
use crate::transparency::SharedTransparencyLog;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Length of the "take a break" pause.
pub const DEFAULT_BREAK: Duration = Duration::from_secs(5);

/// Errors from a monitor step.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("camera is not capturing")]
    CameraInactive,
}

/// Outcome of one detection step.
#[derive(Debug, Clone)]
pub enum TickReport {
    /// Detection is paused; nothing was captured.
    Paused,
    /// A frame was classified.
    Detected {
        sample: DetectionSample,
        /// The event appended, when the state changed
        event: Option<SessionEvent>,
        nudge: Option<Nudge>,
    },
}

/// Runs detection for one session.
pub struct FocusMonitor {
    session_id: Uuid,
    store: SharedSessionStore,
    detector: Arc<DetectionService>,
    camera: Mutex<Box<dyn FrameSource>>,
    nudges: Mutex<NudgePolicy>,
    paused: AtomicBool,
    /// Bumped by every pause, resume and break; a break only resumes if it
    /// still holds the latest value.
    break_token: AtomicU64,
    transparency: Option<SharedTransparencyLog>,
}

impl FocusMonitor {
    /// Start the camera and open a new session in `store`.
    pub async fn start(
        store: SharedSessionStore,
        detector: Arc<DetectionService>,
        mut camera: Box<dyn FrameSource>,
        nudges: NudgePolicy,
    ) -> Result<Self, MonitorError> {
        camera.start()?;
        let session = store.write().await.create_session(None);

        Ok(Self {
            session_id: session.id,
            store,
            detector,
            camera: Mutex::new(camera),
            nudges: Mutex::new(nudges),
            paused: AtomicBool::new(false),
            break_token: AtomicU64::new(0),
            transparency: None,
        })
    }

    /// Count frames, transitions and nudges in `log`.
    pub fn with_transparency(mut self, log: SharedTransparencyLog) -> Self {
        log.record_session_started();
        self.transparency = Some(log);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn store(&self) -> &SharedSessionStore {
        &self.store
    }

    pub fn pause(&self) {
        self.break_token.fetch_add(1, Ordering::SeqCst);
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.break_token.fetch_add(1, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Pause now and resume automatically after `length`.
    ///
    /// A manual [`pause`](Self::pause) or [`resume`](Self::resume) during the
    /// break takes over, and the break then leaves the flag alone.
    pub fn take_break(self: &Arc<Self>, length: Duration) -> JoinHandle<()> {
        let token = self.break_token.fetch_add(1, Ordering::SeqCst) + 1;
        self.paused.store(true, Ordering::SeqCst);
        tracing::info!(session = %self.session_id, secs = length.as_secs(), "break started");

        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(length).await;
            if monitor
                .break_token
                .compare_exchange(token, token + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                monitor.paused.store(false, Ordering::SeqCst);
                tracing::info!(session = %monitor.session_id, "break over, detection resumed");
            }
        })
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_nudges_enabled(&self, enabled: bool) {
        self.nudges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_enabled(enabled);
    }

    /// Capture and classify one frame, recording a transition if the state
    /// changed.
    pub async fn tick(&self) -> Result<TickReport, MonitorError> {
        if self.is_paused() {
            return Ok(TickReport::Paused);
        }

        let frame = self
            .camera
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capture_frame()
            .ok_or(MonitorError::CameraInactive)?;

        let sample = self.detector.process_frame(&frame).await;
        if let Some(log) = &self.transparency {
            log.record_frame_analyzed();
        }

        // A pause requested while the frame was processing drops the result.
        if self.is_paused() {
            return Ok(TickReport::Paused);
        }

        let event = self.store.write().await.record_state(
            self.session_id,
            sample.state,
            sample.confidence,
        )?;

        let nudge = self
            .nudges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(sample.state);

        if let Some(log) = &self.transparency {
            if event.is_some() {
                log.record_transition();
            }
            if nudge.is_some() {
                log.record_nudge();
            }
        }

        Ok(TickReport::Detected {
            sample,
            event,
            nudge,
        })
    }

    /// Recompute the session totals.
    pub async fn refresh_stats(&self) -> Result<crate::session::Session, MonitorError> {
        Ok(self.store.write().await.refresh_stats(self.session_id)?)
    }

    /// Stop the camera and end the session.
    pub async fn finish(&self) -> Result<crate::session::SessionReport, MonitorError> {
        self.camera
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();

        let mut store = self.store.write().await;
        store.end_session(self.session_id)?;
        Ok(store.report(self.session_id)?)
    }
}
