//! Property tests for the rolling window.
//!
//! Invariants tested:
//! - error rate stays within [0, 1] and is 0 for an empty window
//! - counts add up to the total
//! - reading a window twice without recording gives the same snapshot
//! - nothing older than the window survives rotation

use super::outcome;
use bulwark_core::{CallOutcome, RollingWindow, WindowConfig};
use proptest::prelude::*;
use std::time::Duration;
use tokio::time::Instant;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: snapshot counts are consistent and the rate is bounded
    #[test]
    fn snapshot_is_consistent(
        events in prop::collection::vec((outcome(), 0u64..500), 0..200),
        bucket_count in 1usize..=10,
        bucket_ms in 100u64..=3000,
    ) {
        let config = WindowConfig::new(bucket_count, Duration::from_millis(bucket_ms)).unwrap();
        let origin = Instant::now();
        let mut window = RollingWindow::starting_at(config, origin);

        let mut now = origin;
        for (outcome, gap_ms) in events {
            now += Duration::from_millis(gap_ms);
            window.record_at(outcome, now);
        }

        let snapshot = window.snapshot_at(now);
        prop_assert!((0.0..=1.0).contains(&snapshot.error_rate));
        prop_assert!((0.0..=1.0).contains(&snapshot.timeout_rate));
        prop_assert_eq!(
            snapshot.total,
            snapshot.success + snapshot.failure + snapshot.timeout + snapshot.rejection
        );
        if snapshot.total == 0 {
            prop_assert_eq!(snapshot.error_rate, 0.0);
        } else {
            let expected = snapshot.error_count() as f64 / snapshot.total as f64;
            prop_assert!((snapshot.error_rate - expected).abs() < 1e-12);
        }

        // Reading does not change the window.
        prop_assert_eq!(window.snapshot_at(now), snapshot);
    }

    /// Property: a window left alone for its full span is empty
    #[test]
    fn old_outcomes_expire(
        outcomes in prop::collection::vec(outcome(), 1..100),
        bucket_count in 1usize..=10,
        bucket_ms in 100u64..=3000,
    ) {
        let config = WindowConfig::new(bucket_count, Duration::from_millis(bucket_ms)).unwrap();
        let origin = Instant::now();
        let mut window = RollingWindow::starting_at(config, origin);
        for outcome in &outcomes {
            window.record_at(*outcome, origin);
        }
        prop_assert_eq!(window.snapshot_at(origin).total, outcomes.len() as u64);

        let later = origin + config.window_duration() + Duration::from_millis(bucket_ms);
        let snapshot = window.snapshot_at(later);
        prop_assert_eq!(snapshot.total, 0);
        prop_assert_eq!(snapshot.error_rate, 0.0);
    }

    /// Property: only errors move the error rate
    #[test]
    fn successes_only_never_error(n in 1usize..300) {
        let config = WindowConfig::new(10, Duration::from_secs(1)).unwrap();
        let origin = Instant::now();
        let mut window = RollingWindow::starting_at(config, origin);
        for _ in 0..n {
            window.record_at(CallOutcome::Success, origin);
        }
        prop_assert_eq!(window.snapshot_at(origin).error_rate, 0.0);
    }
}
