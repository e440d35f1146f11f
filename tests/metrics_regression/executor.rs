//! Executor and fallback metrics regression tests

use super::helpers::*;
use bulwark_core::OperationKey;
use bulwark_executor::{CommandConfig, ResilientExecutor};
use bulwark_fallback::Fallback;
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn executor_metrics_exist() {
    init_recorder();

    let executor = ResilientExecutor::builder()
        .command(
            "metrics-executor",
            CommandConfig::builder()
                .timeout(Duration::from_millis(20))
                .build()
                .unwrap(),
        )
        .fallback(
            "metrics-executor",
            Fallback::<u32, u32>::value(0),
        )
        .build();
    let key = OperationKey::from("metrics-executor");

    let ok = executor
        .invoke(&key, 1u32, |n| async move { Ok::<_, std::io::Error>(n) })
        .await
        .unwrap();
    assert_eq!(ok, 1);

    let recovered = executor
        .invoke(&key, 2u32, |_| async move {
            Err::<u32, _>(std::io::Error::other("organization service down"))
        })
        .await
        .unwrap();
    assert_eq!(recovered, 0);

    assert_counter_exists("executor_calls_total");
    assert_metric_has_label("executor_calls_total", "executor", "metrics-executor");
    assert_metric_has_label("executor_calls_total", "outcome", "success");
    assert_metric_has_label("executor_calls_total", "outcome", "failure");
    assert_histogram_exists("executor_call_duration_seconds");

    assert_counter_exists("fallback_calls_total");
    assert_metric_has_label("fallback_calls_total", "fallback", "metrics-executor");
    assert_metric_has_label("fallback_calls_total", "result", "applied");
}
