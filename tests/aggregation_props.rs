//! Property tests for session aggregation

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use study_companion::core::aggregate;
use study_companion::session::SessionEvent;
use study_companion::FocusState;
use uuid::Uuid;

fn session_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn any_state() -> impl Strategy<Value = FocusState> {
    prop_oneof![
        Just(FocusState::Focused),
        Just(FocusState::Drowsy),
        Just(FocusState::Distracted),
        Just(FocusState::Stressed),
    ]
}

/// Events at millisecond offsets within the first two hours, in any order.
fn any_fractional_events() -> impl Strategy<Value = Vec<SessionEvent>> {
    prop::collection::vec((0i64..7_200_000, any_state()), 1..40).prop_map(|raw| {
        let id = Uuid::nil();
        raw.into_iter()
            .map(|(offset, state)| {
                SessionEvent::new(id, session_start() + Duration::milliseconds(offset), state, 0.9)
            })
            .collect()
    })
}

/// Events at whole-second offsets within the first two hours, in any order.
fn any_events() -> impl Strategy<Value = Vec<SessionEvent>> {
    prop::collection::vec((0i64..7_200, any_state()), 0..40).prop_map(|raw| {
        let id = Uuid::nil();
        raw.into_iter()
            .map(|(offset, state)| {
                SessionEvent::new(id, session_start() + Duration::seconds(offset), state, 0.9)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn buckets_sum_to_total(events in any_events(), now_offset in 0i64..7_200) {
        prop_assume!(!events.is_empty());
        let start = session_start();
        let now = start + Duration::seconds(now_offset);

        let stats = aggregate(start, &events, now);
        prop_assert_eq!(stats.total_duration, now_offset as u64);
        prop_assert_eq!(stats.bucket_total(), stats.total_duration);
    }

    #[test]
    fn fractional_buckets_lose_under_a_second_per_event(
        events in any_fractional_events(),
        now_offset in 0i64..7_200_000,
    ) {
        let start = session_start();
        let stats = aggregate(start, &events, start + Duration::milliseconds(now_offset));

        prop_assert_eq!(stats.total_duration, (now_offset / 1_000) as u64);
        prop_assert!(stats.bucket_total() <= stats.total_duration);
        prop_assert!(stats.total_duration - stats.bucket_total() <= events.len() as u64);
    }

    #[test]
    fn score_is_a_percentage(events in any_events(), now_offset in 0i64..7_200) {
        let start = session_start();
        let stats = aggregate(start, &events, start + Duration::seconds(now_offset));

        prop_assert!(stats.focus_score <= 100);
        if stats.total_duration == 0 {
            prop_assert_eq!(stats.focus_score, 0);
        }
    }

    #[test]
    fn order_of_events_does_not_matter(events in any_events(), now_offset in 0i64..7_200) {
        let start = session_start();
        let now = start + Duration::seconds(now_offset);

        let mut reversed = events.clone();
        reversed.reverse();

        // Equal timestamps keep their relative order under a stable sort, so
        // compare only logs without ties.
        let mut stamps: Vec<_> = events.iter().map(|e| e.timestamp).collect();
        stamps.sort();
        stamps.dedup();
        prop_assume!(stamps.len() == events.len());

        prop_assert_eq!(aggregate(start, &events, now), aggregate(start, &reversed, now));
    }

    #[test]
    fn aggregation_is_idempotent(events in any_events(), now_offset in 0i64..7_200) {
        let start = session_start();
        let now = start + Duration::seconds(now_offset);
        let snapshot = events.clone();

        let first = aggregate(start, &events, now);
        let second = aggregate(start, &events, now);
        prop_assert_eq!(first, second);
        prop_assert_eq!(events, snapshot);
    }

    #[test]
    fn empty_log_is_all_zero(now_offset in 0i64..100_000) {
        let start = session_start();
        let stats = aggregate(start, &[], start + Duration::seconds(now_offset));
        prop_assert!(stats.is_empty());
        prop_assert_eq!(stats.focus_score, 0);
    }
}
