//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - the breaker opens exactly when volume and error rate both reach their
//!   thresholds
//! - an open breaker refuses every call until the sleep window passes
//! - a half-open breaker lets exactly one probe through

use super::outcome;
use bulwark_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use bulwark_core::{CallOutcome, OperationKey, WindowConfig};
use proptest::prelude::*;
use std::time::Duration;
use tokio::runtime::Builder;

fn breaker(volume: u64, threshold: f64) -> CircuitBreaker {
    CircuitBreaker::builder()
        .default_config(CircuitBreakerConfig {
            request_volume_threshold: volume,
            error_threshold: threshold,
            sleep_window: Duration::from_millis(7000),
            window: WindowConfig::new(5, Duration::from_secs(3)).unwrap(),
        })
        .build()
}

fn paused_runtime() -> tokio::runtime::Runtime {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: the trip decision matches the window's arithmetic
    #[test]
    fn opens_iff_thresholds_reached(
        outcomes in prop::collection::vec(outcome(), 1..60),
        volume in 1u64..30,
        percent in 1u32..=100,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let threshold = f64::from(percent) / 100.0;
            let breaker = breaker(volume, threshold);
            let key = OperationKey::from("organization-lookup");

            for outcome in &outcomes {
                match breaker.permit(&key) {
                    Ok(permit) => permit.complete(*outcome),
                    Err(_) => break,
                }
            }

            let snapshot = breaker.snapshot(&key);
            let should_open = breaker.state(&key) == CircuitState::Open
                || (snapshot.total >= volume && snapshot.error_rate >= threshold);
            prop_assert_eq!(breaker.permit(&key).is_err(), should_open);
            prop_assert_eq!(breaker.state(&key) == CircuitState::Open, should_open);
            Ok(())
        })?;
    }

    /// Property: open means no calls until the sleep window is over
    #[test]
    fn open_refuses_until_sleep_window(checks in 1usize..50, wait_ms in 0u64..7000) {
        let rt = paused_runtime();
        rt.block_on(async {
            let breaker = breaker(1, 0.5);
            let key = OperationKey::from("license-by-org");
            breaker.permit(&key).unwrap().complete(CallOutcome::Failure);
            prop_assert!(breaker.permit(&key).is_err());

            tokio::time::advance(Duration::from_millis(wait_ms)).await;
            for _ in 0..checks {
                prop_assert!(breaker.permit(&key).is_err());
            }
            Ok(())
        })?;
    }

    /// Property: one probe at a time in half-open
    #[test]
    fn single_probe(extra_checks in 1usize..50) {
        let rt = paused_runtime();
        rt.block_on(async {
            let breaker = breaker(1, 0.5);
            let key = OperationKey::from("license-by-org");
            breaker.permit(&key).unwrap().complete(CallOutcome::Timeout);
            prop_assert!(breaker.permit(&key).is_err());

            tokio::time::advance(Duration::from_millis(7000)).await;
            let probe = breaker.permit(&key).unwrap();
            prop_assert!(probe.is_probe());
            for _ in 0..extra_checks {
                prop_assert!(breaker.permit(&key).is_err());
            }
            probe.complete(CallOutcome::Success);
            prop_assert_eq!(breaker.state(&key), CircuitState::Closed);
            Ok(())
        })?;
    }
}
