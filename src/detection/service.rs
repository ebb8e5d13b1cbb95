//! Shared detection service.
//!
//! Wraps a [`StateSimulator`] with everything a long-running caller needs:
//! an RNG, the last emitted sample, a bounded history and a clock. All of it
//! sits behind one mutex so overlapping requests cannot interleave a
//! half-updated counter. The lock is never held across an `.await`.

use crate::clock::SharedClock;
use crate::detection::camera::Frame;
use crate::detection::simulator::StateSimulator;
use crate::detection::types::{DetectionSample, FocusState};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default artificial processing delay per frame.
pub const DEFAULT_PROCESSING_DELAY: Duration = Duration::from_millis(100);

/// Default number of samples kept in history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

struct DetectorState {
    simulator: StateSimulator,
    rng: StdRng,
    last: Option<DetectionSample>,
    history: VecDeque<DetectionSample>,
}

/// Thread-safe mock detector.
pub struct DetectionService {
    state: Mutex<DetectorState>,
    clock: SharedClock,
    processing_delay: Duration,
    history_capacity: usize,
}

impl DetectionService {
    /// Create a service seeded from OS entropy.
    pub fn new(clock: SharedClock) -> Self {
        Self::from_rng(clock, StdRng::from_entropy())
    }

    /// Create a service whose samples replay for a given seed.
    pub fn with_seed(clock: SharedClock, seed: u64) -> Self {
        Self::from_rng(clock, StdRng::seed_from_u64(seed))
    }

    fn from_rng(clock: SharedClock, rng: StdRng) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(DetectorState {
                simulator: StateSimulator::new(now),
                rng,
                last: None,
                history: VecDeque::with_capacity(DEFAULT_HISTORY_CAPACITY),
            }),
            clock,
            processing_delay: DEFAULT_PROCESSING_DELAY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Override the per-frame processing delay.
    pub fn with_processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = delay;
        self
    }

    /// Override the history length (at least one sample is always kept).
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, DetectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Classify a frame. The frame content is not inspected.
    pub async fn process_frame(&self, frame: &Frame) -> DetectionSample {
        if !self.processing_delay.is_zero() {
            tokio::time::sleep(self.processing_delay).await;
        }
        let sample = self.sample_now();
        tracing::trace!(frame = frame.sequence, state = %sample.state, "frame processed");
        sample
    }

    /// Draw a sample immediately, without the processing delay.
    pub fn sample_now(&self) -> DetectionSample {
        let now = self.clock.now();
        let mut guard = self.lock();
        let DetectorState {
            simulator,
            rng,
            last,
            ..
        } = &mut *guard;

        let elapsed = simulator.elapsed_minutes(now);
        let sample = simulator.sample(rng, now, elapsed, last.as_ref());
        self.remember(&mut guard, sample.clone());
        sample
    }

    /// Emit a sample in a chosen state, for testing nudges and timelines.
    pub fn trigger_state(&self, state: FocusState) -> DetectionSample {
        let now = self.clock.now();
        let mut guard = self.lock();
        let DetectorState {
            simulator,
            rng,
            last,
            ..
        } = &mut *guard;

        let sample = simulator.forced_sample(rng, now, state, last.as_ref());
        tracing::debug!(state = %state, "detection state triggered manually");
        self.remember(&mut guard, sample.clone());
        sample
    }

    fn remember(&self, state: &mut DetectorState, sample: DetectionSample) {
        state.history.push_back(sample.clone());
        while state.history.len() > self.history_capacity {
            state.history.pop_front();
        }
        state.last = Some(sample);
    }

    /// Restart the simulated session: counters, last sample and history are
    /// cleared and fatigue starts from zero again.
    pub fn reset(&self) {
        let now = self.clock.now();
        Self::clear(&mut self.lock(), now);
        tracing::debug!("detection service reset");
    }

    /// Reset and replace the RNG with a seeded one, in one step.
    pub fn reseed(&self, seed: u64) {
        let now = self.clock.now();
        let mut guard = self.lock();
        Self::clear(&mut guard, now);
        guard.rng = StdRng::seed_from_u64(seed);
        tracing::debug!(seed, "detection service reseeded");
    }

    fn clear(state: &mut DetectorState, now: chrono::DateTime<chrono::Utc>) {
        state.simulator.reset(now);
        state.last = None;
        state.history.clear();
    }

    /// Samples in the order they were produced, oldest first.
    pub fn history(&self) -> Vec<DetectionSample> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn last_sample(&self) -> Option<DetectionSample> {
        self.lock().last.clone()
    }

    /// State of the last sample, or `Focused` before the first one.
    pub fn current_state(&self) -> FocusState {
        self.lock()
            .last
            .as_ref()
            .map(|s| s.state)
            .unwrap_or_default()
    }

    /// Minutes the simulated session has been running.
    pub fn elapsed_minutes(&self) -> f64 {
        let now = self.clock.now();
        self.lock().simulator.elapsed_minutes(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Utc;
    use std::sync::Arc;

    fn manual_service(seed: u64) -> (Arc<ManualClock>, DetectionService) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = DetectionService::with_seed(clock.clone(), seed)
            .with_processing_delay(Duration::ZERO);
        (clock, service)
    }

    #[test]
    fn test_history_is_bounded() {
        let (clock, service) = manual_service(1);
        let service = service.with_history_capacity(10);

        for _ in 0..25 {
            clock.advance(chrono::Duration::seconds(1));
            service.sample_now();
        }

        let history = service.history();
        assert_eq!(history.len(), 10);
        assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(history.last(), service.last_sample().as_ref());
    }

    #[test]
    fn test_default_capacity_is_one_hundred() {
        let (clock, service) = manual_service(2);
        for _ in 0..150 {
            clock.advance(chrono::Duration::seconds(1));
            service.sample_now();
        }
        assert_eq!(service.history().len(), DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn test_current_state_defaults_to_focused() {
        let (_clock, service) = manual_service(3);
        assert_eq!(service.current_state(), FocusState::Focused);

        service.trigger_state(FocusState::Stressed);
        assert_eq!(service.current_state(), FocusState::Stressed);
    }

    #[test]
    fn test_reset_clears_history_and_origin() {
        let (clock, service) = manual_service(4);
        clock.advance(chrono::Duration::minutes(20));
        service.sample_now();
        assert!(service.elapsed_minutes() >= 20.0);

        service.reset();
        assert!(service.history().is_empty());
        assert!(service.last_sample().is_none());
        assert_eq!(service.elapsed_minutes(), 0.0);
    }

    #[test]
    fn test_reseed_replays_sequence() {
        let (clock, service) = manual_service(5);

        service.reseed(77);
        let first: Vec<FocusState> = (0..20)
            .map(|_| {
                clock.advance(chrono::Duration::seconds(1));
                service.sample_now().state
            })
            .collect();

        clock.set(Utc::now());
        service.reseed(77);
        let second: Vec<FocusState> = (0..20)
            .map(|_| {
                clock.advance(chrono::Duration::seconds(1));
                service.sample_now().state
            })
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_reseed_matches_fresh_service() {
        let (clock, service) = manual_service(12);
        for _ in 0..30 {
            clock.advance(chrono::Duration::seconds(1));
            service.sample_now();
        }

        service.reseed(40);
        assert!(service.history().is_empty());
        let fresh = DetectionService::with_seed(clock.clone(), 40)
            .with_processing_delay(Duration::ZERO);

        for _ in 0..20 {
            clock.advance(chrono::Duration::seconds(1));
            assert_eq!(service.sample_now(), fresh.sample_now());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_frame_waits_for_delay() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = DetectionService::with_seed(clock, 6);
        let frame = Frame::blank(1, Utc::now());

        let started = tokio::time::Instant::now();
        let sample = service.process_frame(&frame).await;
        assert!(started.elapsed() >= DEFAULT_PROCESSING_DELAY);
        assert_eq!(service.last_sample(), Some(sample));
    }

    #[tokio::test]
    async fn test_concurrent_frames_keep_history_consistent() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = Arc::new(
            DetectionService::with_seed(clock, 8).with_processing_delay(Duration::from_millis(5)),
        );

        let mut handles = Vec::new();
        for i in 0..20 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let frame = Frame::blank(i, Utc::now());
                service.process_frame(&frame).await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(service.history().len(), 20);
    }
}
