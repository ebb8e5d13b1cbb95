//! Mock focus-state classifier.
//!
//! There is no vision model behind this: each sample is a weighted random
//! draw over the four states, skewed towards fatigue as the session gets
//! longer and smoothed so states persist for a few seconds instead of
//! flickering every frame.
//!
//! The simulator holds only its own counters. The caller supplies the clock
//! reading, the elapsed session time, the previous sample and the random
//! source, so several simulations can run side by side and a seeded RNG
//! replays the exact same sequence.

use crate::detection::types::{
    DetectionSample, Detections, FocusState, HeadPose, StressIndicators,
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Base categorical weights, in [`FocusState::ALL`] order.
pub const BASE_WEIGHTS: [f64; 4] = [0.30, 0.30, 0.30, 0.10];

/// Fatigue grows by this much per elapsed minute.
const FATIGUE_PER_MINUTE: f64 = 0.02;

/// Upper bound of the fatigue multiplier.
const MAX_FATIGUE: f64 = 1.5;

/// Caps applied to the multiplier for the distracted and stressed weights.
const MAX_DISTRACTED_BOOST: f64 = 1.3;
const MAX_STRESSED_BOOST: f64 = 1.2;

/// A state change younger than this may be held by the persistence rule.
const PERSISTENCE_WINDOW_MS: i64 = 3_000;

/// Chance of repeating the previous state inside the persistence window.
const PERSISTENCE_PROBABILITY: f64 = 0.4;

/// Consecutive repeats tolerated before a snap-back may happen.
const STICKY_THRESHOLD: u32 = 4;

/// Chance of snapping a stuck drowsy/distracted run back to focused.
const SNAP_BACK_PROBABILITY: f64 = 0.3;

/// Fatigue multiplier for a session that has been running `elapsed_minutes`.
pub fn fatigue_multiplier(elapsed_minutes: f64) -> f64 {
    (1.0 + elapsed_minutes.max(0.0) * FATIGUE_PER_MINUTE).min(MAX_FATIGUE)
}

/// State weights after the fatigue adjustment, normalized to sum to 1.
pub fn adjusted_weights(elapsed_minutes: f64) -> [f64; 4] {
    let fatigue = fatigue_multiplier(elapsed_minutes);
    let mut weights = BASE_WEIGHTS;

    weights[FocusState::Focused.index()] /= fatigue;
    weights[FocusState::Drowsy.index()] *= fatigue;
    weights[FocusState::Distracted.index()] *= fatigue.min(MAX_DISTRACTED_BOOST);
    weights[FocusState::Stressed.index()] *= fatigue.min(MAX_STRESSED_BOOST);

    let total: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= total;
    }
    weights
}

/// Pick a state by walking the cumulative weights with a uniform draw in `[0, 1)`.
pub fn draw_state(weights: &[f64; 4], uniform: f64) -> FocusState {
    let mut cumulative = 0.0;
    for (state, weight) in FocusState::ALL.iter().zip(weights) {
        cumulative += weight;
        if uniform < cumulative {
            return *state;
        }
    }
    // Rounding can leave the total a hair under 1.
    FocusState::ALL[FocusState::ALL.len() - 1]
}

/// Mutable bookkeeping for one simulated feed.
#[derive(Debug, Clone)]
pub struct StateSimulator {
    /// How many samples in a row repeated the previous state
    consecutive_same: u32,
    /// When the emitted state last changed
    last_state_change: DateTime<Utc>,
    /// Start of the simulated session, used for elapsed-time drift
    origin: DateTime<Utc>,
}

impl StateSimulator {
    /// Create a simulator whose session starts at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            consecutive_same: 0,
            last_state_change: now,
            origin: now,
        }
    }

    /// Minutes since the simulator's origin.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> f64 {
        ((now - self.origin).num_milliseconds().max(0) as f64) / 60_000.0
    }

    pub fn consecutive_count(&self) -> u32 {
        self.consecutive_same
    }

    pub fn last_state_change(&self) -> DateTime<Utc> {
        self.last_state_change
    }

    pub fn origin(&self) -> DateTime<Utc> {
        self.origin
    }

    /// Clear the counters and restart the elapsed-time origin at `now`.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.consecutive_same = 0;
        self.last_state_change = now;
        self.origin = now;
    }

    /// Produce the next sample.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Utc>,
        elapsed_minutes: f64,
        previous: Option<&DetectionSample>,
    ) -> DetectionSample {
        let weights = adjusted_weights(elapsed_minutes);
        let mut state = draw_state(&weights, rng.gen::<f64>());

        if let Some(previous) = previous {
            let since_change = now - self.last_state_change;
            if since_change < Duration::milliseconds(PERSISTENCE_WINDOW_MS)
                && rng.gen::<f64>() < PERSISTENCE_PROBABILITY
            {
                state = previous.state;
            }
            state = self.track_transition(rng, now, previous.state, state);
        }

        self.build_sample(rng, now, state)
    }

    /// Produce a sample pinned to `state`, updating the counters as if it had
    /// been drawn.
    pub fn forced_sample<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Utc>,
        state: FocusState,
        previous: Option<&DetectionSample>,
    ) -> DetectionSample {
        match previous {
            Some(previous) if previous.state == state => {
                self.consecutive_same += 1;
            }
            _ => {
                self.consecutive_same = 0;
                self.last_state_change = now;
            }
        }
        self.build_sample(rng, now, state)
    }

    /// Update the repeat counter for `state` following `previous`, applying
    /// the snap-back rule. Returns the state to emit.
    fn track_transition<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Utc>,
        previous: FocusState,
        state: FocusState,
    ) -> FocusState {
        if state != previous {
            self.consecutive_same = 0;
            self.last_state_change = now;
            return state;
        }

        self.consecutive_same += 1;
        let stuck = matches!(state, FocusState::Drowsy | FocusState::Distracted);
        if stuck
            && self.consecutive_same > STICKY_THRESHOLD
            && rng.gen::<f64>() < SNAP_BACK_PROBABILITY
        {
            tracing::debug!(
                from = %state,
                repeats = self.consecutive_same,
                "simulator snapped back to focused"
            );
            self.consecutive_same = 0;
            self.last_state_change = now;
            return FocusState::Focused;
        }
        state
    }

    fn build_sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        now: DateTime<Utc>,
        state: FocusState,
    ) -> DetectionSample {
        DetectionSample {
            state,
            confidence: rng.gen_range(0.75..1.0),
            timestamp: now,
            detections: synthesize_detections(rng, state),
        }
    }
}

/// Facial readings skewed by state, so a reader can tell states apart.
pub fn synthesize_detections<R: Rng + ?Sized>(rng: &mut R, state: FocusState) -> Detections {
    let eye_aspect_ratio = if state == FocusState::Drowsy {
        rng.gen_range(0.15..0.25)
    } else {
        rng.gen_range(0.25..0.35)
    };
    let yaw_span = if state == FocusState::Distracted { 60.0 } else { 20.0 };
    let facial_tension = if state == FocusState::Stressed {
        rng.gen_range(0.6..1.0)
    } else {
        rng.gen_range(0.0..0.4)
    };
    let blink_rate = if state == FocusState::Drowsy {
        rng.gen_range(8.0..13.0)
    } else {
        rng.gen_range(15.0..25.0)
    };

    Detections {
        face_detected: true,
        eye_aspect_ratio,
        head_pose: HeadPose {
            yaw: (rng.gen::<f64>() - 0.5) * yaw_span,
            pitch: (rng.gen::<f64>() - 0.5) * 20.0,
            roll: (rng.gen::<f64>() - 0.5) * 15.0,
        },
        stress_indicators: StressIndicators {
            facial_tension,
            blink_rate,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_with_state(state: FocusState, at: DateTime<Utc>) -> DetectionSample {
        let mut rng = StdRng::seed_from_u64(0);
        DetectionSample {
            state,
            confidence: 0.9,
            timestamp: at,
            detections: synthesize_detections(&mut rng, state),
        }
    }

    #[test]
    fn test_fatigue_multiplier() {
        assert_eq!(fatigue_multiplier(0.0), 1.0);
        assert!((fatigue_multiplier(10.0) - 1.2).abs() < 1e-12);
        assert_eq!(fatigue_multiplier(25.0), 1.5);
        assert_eq!(fatigue_multiplier(600.0), 1.5);
    }

    #[test]
    fn test_weights_at_start_match_base() {
        let weights = adjusted_weights(0.0);
        for (w, base) in weights.iter().zip(BASE_WEIGHTS.iter()) {
            assert!((w - base).abs() < 1e-12, "{w} != {base}");
        }
    }

    #[test]
    fn test_weights_drift_with_fatigue() {
        let fresh = adjusted_weights(0.0);
        let tired = adjusted_weights(60.0);

        assert!(tired[FocusState::Focused.index()] < fresh[FocusState::Focused.index()]);
        assert!(tired[FocusState::Drowsy.index()] > fresh[FocusState::Drowsy.index()]);
        assert!((tired.iter().sum::<f64>() - 1.0).abs() < 1e-12);

        // fatigue 1.5: 0.2, 0.45, 0.39, 0.12 before normalizing
        let total = 0.2 + 0.45 + 0.39 + 0.12;
        assert!((tired[0] - 0.2 / total).abs() < 1e-12);
        assert!((tired[2] - 0.39 / total).abs() < 1e-12);
    }

    #[test]
    fn test_draw_state_boundaries() {
        let weights = BASE_WEIGHTS;
        assert_eq!(draw_state(&weights, 0.0), FocusState::Focused);
        assert_eq!(draw_state(&weights, 0.29), FocusState::Focused);
        assert_eq!(draw_state(&weights, 0.31), FocusState::Drowsy);
        assert_eq!(draw_state(&weights, 0.61), FocusState::Distracted);
        assert_eq!(draw_state(&weights, 0.95), FocusState::Stressed);
        assert_eq!(draw_state(&weights, 0.999_999_999), FocusState::Stressed);
    }

    #[test]
    fn test_first_sample_leaves_counters_alone() {
        let now = Utc::now();
        let mut sim = StateSimulator::new(now);
        let mut rng = StdRng::seed_from_u64(7);

        let sample = sim.sample(&mut rng, now, 0.0, None);
        assert_eq!(sample.timestamp, now);
        assert!((0.75..1.0).contains(&sample.confidence));
        assert_eq!(sim.consecutive_count(), 0);
    }

    #[test]
    fn test_change_resets_counter_and_timestamp() {
        let start = Utc::now();
        let mut sim = StateSimulator::new(start);
        let mut rng = StdRng::seed_from_u64(3);

        let later = start + Duration::seconds(10);
        let previous = sample_with_state(FocusState::Stressed, start);
        sim.consecutive_same = 3;

        let state = sim.track_transition(&mut rng, later, previous.state, FocusState::Focused);
        assert_eq!(state, FocusState::Focused);
        assert_eq!(sim.consecutive_count(), 0);
        assert_eq!(sim.last_state_change(), later);
    }

    #[test]
    fn test_repeats_increment_counter() {
        let start = Utc::now();
        let mut sim = StateSimulator::new(start);
        let mut rng = StdRng::seed_from_u64(3);

        for expected in 1..=4 {
            let state =
                sim.track_transition(&mut rng, start, FocusState::Stressed, FocusState::Stressed);
            assert_eq!(state, FocusState::Stressed);
            assert_eq!(sim.consecutive_count(), expected);
        }
    }

    #[test]
    fn test_stressed_runs_never_snap_back() {
        let start = Utc::now();
        let mut sim = StateSimulator::new(start);
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..200 {
            let state =
                sim.track_transition(&mut rng, start, FocusState::Stressed, FocusState::Stressed);
            assert_eq!(state, FocusState::Stressed);
        }
        assert_eq!(sim.consecutive_count(), 200);
    }

    #[test]
    fn test_long_drowsy_run_eventually_snaps_back() {
        let start = Utc::now();
        let mut sim = StateSimulator::new(start);
        let mut rng = StdRng::seed_from_u64(5);

        let mut snapped = false;
        for _ in 0..200 {
            let state =
                sim.track_transition(&mut rng, start, FocusState::Drowsy, FocusState::Drowsy);
            if state == FocusState::Focused {
                snapped = true;
                break;
            }
            // Snap-back only becomes possible past the threshold.
            assert!(sim.consecutive_count() >= 1);
        }
        assert!(snapped);
        assert_eq!(sim.consecutive_count(), 0);
    }

    #[test]
    fn test_no_snap_back_before_threshold() {
        let start = Utc::now();
        let mut sim = StateSimulator::new(start);
        let mut rng = StdRng::seed_from_u64(99);

        for _ in 0..STICKY_THRESHOLD {
            let state = sim.track_transition(
                &mut rng,
                start,
                FocusState::Distracted,
                FocusState::Distracted,
            );
            assert_eq!(state, FocusState::Distracted);
        }
    }

    #[test]
    fn test_persistence_holds_recent_state_more_often() {
        // Inside the persistence window the previous state should show up
        // noticeably more often than its base weight of 0.10.
        let start = Utc::now();
        let mut rng = StdRng::seed_from_u64(2024);
        let previous = sample_with_state(FocusState::Stressed, start);

        let trials = 4_000;
        let mut held = 0;
        for _ in 0..trials {
            let mut sim = StateSimulator::new(start);
            let now = start + Duration::milliseconds(500);
            let sample = sim.sample(&mut rng, now, 0.0, Some(&previous));
            if sample.state == FocusState::Stressed {
                held += 1;
            }
        }
        // Expected rate: 0.4 + 0.6 * 0.1 = 0.46
        let rate = held as f64 / trials as f64;
        assert!((0.40..0.52).contains(&rate), "rate = {rate}");
    }

    #[test]
    fn test_persistence_lapses_after_window() {
        // Three seconds after the last change the previous state is back to
        // its base weight of 0.10.
        let start = Utc::now();
        let mut rng = StdRng::seed_from_u64(2025);
        let previous = sample_with_state(FocusState::Stressed, start);

        for offset_ms in [3_000, 10_000] {
            let trials = 4_000;
            let mut held = 0;
            for _ in 0..trials {
                let mut sim = StateSimulator::new(start);
                let now = start + Duration::milliseconds(offset_ms);
                let sample = sim.sample(&mut rng, now, 0.0, Some(&previous));
                if sample.state == FocusState::Stressed {
                    held += 1;
                }
            }
            let rate = held as f64 / trials as f64;
            assert!((0.07..0.13).contains(&rate), "rate = {rate} at {offset_ms} ms");
        }
    }

    #[test]
    fn test_forced_sample_counts_as_change() {
        let start = Utc::now();
        let mut sim = StateSimulator::new(start);
        let mut rng = StdRng::seed_from_u64(1);
        let previous = sample_with_state(FocusState::Focused, start);

        let now = start + Duration::seconds(30);
        let sample = sim.forced_sample(&mut rng, now, FocusState::Drowsy, Some(&previous));
        assert_eq!(sample.state, FocusState::Drowsy);
        assert_eq!(sim.last_state_change(), now);
        assert_eq!(sim.consecutive_count(), 0);
    }

    #[test]
    fn test_reset_restarts_origin() {
        let start = Utc::now();
        let mut sim = StateSimulator::new(start);
        sim.consecutive_same = 9;

        let later = start + Duration::minutes(30);
        assert!((sim.elapsed_minutes(later) - 30.0).abs() < 1e-9);

        sim.reset(later);
        assert_eq!(sim.consecutive_count(), 0);
        assert_eq!(sim.origin(), later);
        assert_eq!(sim.last_state_change(), later);
        assert_eq!(sim.elapsed_minutes(later), 0.0);
    }

    #[test]
    fn test_feature_skew_by_state() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let drowsy = synthesize_detections(&mut rng, FocusState::Drowsy);
            assert!(drowsy.eye_aspect_ratio < 0.25);
            assert!(drowsy.stress_indicators.blink_rate < 13.0);

            let focused = synthesize_detections(&mut rng, FocusState::Focused);
            assert!(focused.eye_aspect_ratio >= 0.25);
            assert!(focused.head_pose.yaw.abs() <= 10.0);
            assert!(focused.stress_indicators.facial_tension < 0.4);
            assert!(focused.stress_indicators.blink_rate >= 15.0);

            let stressed = synthesize_detections(&mut rng, FocusState::Stressed);
            assert!(stressed.stress_indicators.facial_tension >= 0.6);

            let distracted = synthesize_detections(&mut rng, FocusState::Distracted);
            assert!(distracted.head_pose.yaw.abs() <= 30.0);
        }
    }

    #[test]
    fn test_seeded_sequences_replay() {
        let start = Utc::now();
        let run = |seed: u64| {
            let mut sim = StateSimulator::new(start);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut previous: Option<DetectionSample> = None;
            let mut states = Vec::new();
            for i in 0..50 {
                let now = start + Duration::seconds(i);
                let sample = sim.sample(&mut rng, now, i as f64 / 60.0, previous.as_ref());
                states.push(sample.state);
                previous = Some(sample);
            }
            states
        };
        assert_eq!(run(17), run(17));
    }
}
