//! Property tests for the fold's convergence guarantees.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use proptest::prelude::*;
use serde_json::json;

use streakproj_events::{EVENT_POST_CREATED, EVENT_POST_EDITED, Event};

use crate::{ProjectionState, Projector};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// A duplicate-free stream `1..=n` with timestamps spread over a few days.
fn stream() -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec((0i64..(4 * 24 * 60), any::<bool>()), 1..40).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (minutes, qualifies))| {
                let event_type = if qualifies {
                    EVENT_POST_CREATED
                } else {
                    EVENT_POST_EDITED
                };
                Event::new(
                    i as u64 + 1,
                    event_type,
                    base_time() + Duration::minutes(minutes),
                    json!({ "i": i }),
                )
            })
            .collect()
    })
}

fn timezone() -> impl Strategy<Value = Tz> {
    prop_oneof![
        Just(Tz::UTC),
        Just(Tz::Asia__Seoul),
        Just(Tz::America__New_York),
        Just(Tz::Pacific__Kiritimati),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// Property: folding the same batch twice equals folding it once.
    #[test]
    fn apply_is_idempotent(events in stream(), tz in timezone()) {
        let projector = Projector::default();
        let zero = projector.zero_state();

        let once = projector.apply(&zero, &events, Some(tz)).unwrap();
        let twice = projector.apply(&once, &events, Some(tz)).unwrap();

        prop_assert_eq!(once, twice);
    }

    /// Property: delivery order does not matter.
    #[test]
    fn apply_is_order_independent(
        events in stream(),
        tz in timezone(),
        seed in any::<u64>(),
    ) {
        let projector = Projector::default();
        let zero = projector.zero_state();

        let mut shuffled = events.clone();
        // Deterministic Fisher-Yates driven by the generated seed.
        let mut x = seed | 1;
        for i in (1..shuffled.len()).rev() {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            let j = (x % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }

        prop_assert_eq!(
            projector.apply(&zero, &events, Some(tz)).unwrap(),
            projector.apply(&zero, &shuffled, Some(tz)).unwrap()
        );
    }

    /// Property: the checkpoint never moves backwards, whatever the batch.
    #[test]
    fn checkpoint_is_monotonic(
        events in stream(),
        applied in 0u64..50,
        tz in timezone(),
    ) {
        let projector = Projector::default();
        let start = ProjectionState { applied_seq: applied, ..projector.zero_state() };

        let out = projector.apply(&start, &events, Some(tz)).unwrap();

        prop_assert!(out.applied_seq >= start.applied_seq);
    }

    /// Property: splitting a stream into redelivered, overlapping chunks with a
    /// checkpoint persisted between them converges to a single ordered pass.
    #[test]
    fn chunked_redelivery_converges(
        events in stream(),
        cut in 0usize..40,
        overlap in 0usize..10,
        tz in timezone(),
    ) {
        let projector = Projector::default();
        let zero = projector.zero_state();
        let cut = cut.min(events.len());
        let replay_from = cut.saturating_sub(overlap);

        let first = projector.apply(&zero, &events[..cut], Some(tz)).unwrap();
        let mut second_batch: Vec<Event> = events[replay_from..].to_vec();
        second_batch.extend_from_slice(&events[..cut]);
        let chunked = projector.apply(&first, &second_batch, Some(tz)).unwrap();

        let direct = projector.apply(&zero, &events, Some(tz)).unwrap();
        prop_assert_eq!(chunked, direct);
    }

    /// Property: the day counter never exceeds the number of qualifying events.
    #[test]
    fn counter_bounded_by_qualifying_events(events in stream(), tz in timezone()) {
        let projector = Projector::default();
        let out = projector.apply(&projector.zero_state(), &events, Some(tz)).unwrap();

        let qualifying = events
            .iter()
            .filter(|e| projector.policy().qualifies(&e.event_type))
            .count() as u32;
        prop_assert!(out.current_day_post_count <= qualifying);
        prop_assert_eq!(out.last_contribution_date.is_some(), qualifying > 0);
    }
}
