// Property-based tests for interval merging, change evaluation and fan-out

use chrono::{DateTime, Duration, TimeZone};
use chrono_tz::Tz;
use common::differ::SnapshotDiffer;
use common::evaluator::ChangeEvaluator;
use common::intervals::{Interval, IntervalSet, INPUT_FORMAT, SCHEDULE_TZ};
use common::models::{Device, DeviceType, FetchedRecord, TrackedQueue, VALID_QUEUES};
use common::notify::plan_notifications;
use proptest::prelude::*;
use serde_json::{json, Value};

fn base() -> DateTime<Tz> {
    SCHEDULE_TZ.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap()
}

/// Intervals within one winter week, whole minutes, up to ten hours long
fn interval_strategy() -> impl Strategy<Value = Interval> {
    (0i64..10_000, 0i64..600).prop_map(|(offset, length)| {
        let start = base() + Duration::minutes(offset);
        Interval::new(start, start + Duration::minutes(length)).unwrap()
    })
}

fn payload(intervals: &[Interval]) -> Value {
    let entries: Vec<Value> = intervals
        .iter()
        .map(|interval| {
            json!({
                "acc_begin": interval.start.format(INPUT_FORMAT).to_string(),
                "accend_plan": interval.end.format(INPUT_FORMAT).to_string(),
            })
        })
        .collect();
    json!({ "aData": entries })
}

proptest! {
    #[test]
    fn property_merged_set_is_sorted_and_disjoint(
        intervals in prop::collection::vec(interval_strategy(), 0..30)
    ) {
        let set: IntervalSet = intervals.iter().copied().collect();
        for pair in set.as_slice().windows(2) {
            prop_assert!(pair[0].end < pair[1].start);
        }
        prop_assert!(set.len() <= intervals.len());
    }

    #[test]
    fn property_every_input_is_covered(
        intervals in prop::collection::vec(interval_strategy(), 1..30)
    ) {
        let set: IntervalSet = intervals.iter().copied().collect();
        for interval in &intervals {
            let cover = set.containing(&interval.start);
            prop_assert!(cover.is_some());
            prop_assert!(cover.unwrap().contains(&interval.end));
        }
    }

    #[test]
    fn property_insertion_order_does_not_matter(
        intervals in prop::collection::vec(interval_strategy(), 0..20)
    ) {
        let mut forward = IntervalSet::new();
        for interval in &intervals {
            forward.insert(*interval);
        }

        let mut backward = IntervalSet::new();
        for interval in intervals.iter().rev() {
            backward.insert(*interval);
        }

        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn property_reinserting_is_idempotent(
        intervals in prop::collection::vec(interval_strategy(), 1..20)
    ) {
        let once: IntervalSet = intervals.iter().copied().collect();
        let mut twice = once.clone();
        for interval in &intervals {
            twice.insert(*interval);
        }
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn property_formatted_input_round_trips_through_append(
        intervals in prop::collection::vec(interval_strategy(), 0..20)
    ) {
        let expected: IntervalSet = intervals.iter().copied().collect();
        let mut parsed = IntervalSet::new();
        for interval in &intervals {
            parsed.append(
                &interval.start.format(INPUT_FORMAT).to_string(),
                &interval.end.format(INPUT_FORMAT).to_string(),
            );
        }
        prop_assert_eq!(parsed, expected);
    }

    #[test]
    fn property_identical_snapshots_never_notify(
        intervals in prop::collection::vec(interval_strategy(), 0..20),
        now_offset in 0i64..12_000
    ) {
        let set: IntervalSet = intervals.iter().copied().collect();
        let now = base() + Duration::minutes(now_offset);
        prop_assert!(!ChangeEvaluator::new().evaluate_at(&set, &set.clone(), now));
    }

    #[test]
    fn property_growing_schedule_always_notifies(
        intervals in prop::collection::vec(interval_strategy(), 0..10),
        extra in interval_strategy(),
        now_offset in 0i64..12_000
    ) {
        let saved: IntervalSet = intervals.iter().copied().collect();
        let fresh: IntervalSet = intervals.iter().copied().chain(std::iter::once(extra)).collect();
        prop_assume!(fresh.len() > saved.len());

        let now = base() + Duration::minutes(now_offset);
        prop_assert!(ChangeEvaluator::new().evaluate_at(&saved, &fresh, now));
    }

    #[test]
    fn property_unchanged_records_are_not_reported(
        intervals in prop::collection::vec(interval_strategy(), 0..10),
        account in 1i64..1_000_000,
        queue in prop::sample::select(VALID_QUEUES.to_vec())
    ) {
        let body = payload(&intervals);
        let record = FetchedRecord::new(
            TrackedQueue::new(account, queue, body.to_string()),
            body,
        );

        let outcome = SnapshotDiffer::default().find_changes(&[record]);
        prop_assert_eq!(outcome.count, 0);
        prop_assert!(outcome.changed_queues.is_empty());
    }

    #[test]
    fn property_fanout_matches_watchers(
        watched in prop::collection::vec(prop::sample::select(VALID_QUEUES.to_vec()), 0..20),
        changed in prop::collection::vec(prop::sample::select(VALID_QUEUES.to_vec()), 0..5)
    ) {
        let devices: Vec<Device> = watched
            .iter()
            .enumerate()
            .map(|(i, queue)| Device {
                device_uuid: format!("device-{}", i),
                device_type: DeviceType::Ios,
                push_address: format!("push-{}", i),
                watched_queue: queue.to_string(),
                device_details: None,
            })
            .collect();
        let changed: Vec<String> = changed.iter().map(|q| q.to_string()).collect();

        let planned = plan_notifications(&changed, &devices);
        let expected: usize = changed
            .iter()
            .map(|queue| devices.iter().filter(|d| &d.watched_queue == queue).count())
            .sum();
        prop_assert_eq!(planned.len(), expected);
    }
}
