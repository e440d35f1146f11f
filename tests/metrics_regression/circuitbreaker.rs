//! Circuit breaker metrics regression tests

use super::helpers::*;
use bulwark_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
use bulwark_core::{CallOutcome, OperationKey, WindowConfig};
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn circuitbreaker_metrics_exist() {
    init_recorder();

    let breaker = CircuitBreaker::builder()
        .breaker(
            "metrics-breaker",
            CircuitBreakerConfig {
                request_volume_threshold: 2,
                error_threshold: 0.5,
                sleep_window: Duration::from_secs(5),
                window: WindowConfig::new(5, Duration::from_secs(1)).unwrap(),
            },
        )
        .build();
    let key = OperationKey::from("metrics-breaker");

    breaker.permit(&key).unwrap().complete(CallOutcome::Success);
    breaker.permit(&key).unwrap().complete(CallOutcome::Failure);
    assert!(breaker.permit(&key).is_err());

    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "metrics-breaker");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "failure");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected_by_breaker");

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label(
        "circuitbreaker_transitions_total",
        "circuitbreaker",
        "metrics-breaker",
    );

    assert_gauge_exists("circuitbreaker_state");
}
