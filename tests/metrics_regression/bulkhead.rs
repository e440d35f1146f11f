//! Bulkhead metrics regression tests

use super::helpers::*;
use bulwark_bulkhead::{BulkheadPool, PoolConfig};
use bulwark_core::OperationKey;
use serial_test::serial;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test]
#[serial]
async fn bulkhead_metrics_exist() {
    init_recorder();

    let pool = BulkheadPool::builder()
        .pool("metrics-bulkhead", PoolConfig::new(1, 0).unwrap())
        .build();
    let key = OperationKey::from("metrics-bulkhead");
    let deadline = Instant::now() + Duration::from_secs(1);

    let slot = pool.try_acquire(&key, deadline).await.unwrap();
    assert!(pool.try_acquire(&key, deadline).await.is_err());
    slot.release();

    assert_counter_exists("bulkhead_calls_permitted_total");
    assert_metric_has_label("bulkhead_calls_permitted_total", "bulkhead", "metrics-bulkhead");

    assert_counter_exists("bulkhead_calls_rejected_total");
    assert_metric_has_label("bulkhead_calls_rejected_total", "reason", "full");

    assert_gauge_exists("bulkhead_concurrent_calls");
    assert_histogram_exists("bulkhead_wait_duration_seconds");
}

#[tokio::test]
#[serial]
async fn bulkhead_queue_metrics_exist() {
    init_recorder();

    let pool = BulkheadPool::builder()
        .pool("metrics-queue", PoolConfig::new(1, 1).unwrap())
        .build();
    let key = OperationKey::from("metrics-queue");

    let slot = pool
        .try_acquire(&key, Instant::now() + Duration::from_secs(1))
        .await
        .unwrap();
    let timed_out = pool
        .try_acquire(&key, Instant::now() + Duration::from_millis(10))
        .await;
    assert!(timed_out.is_err());
    drop(slot);

    assert_gauge_exists("bulkhead_queue_depth");
    assert_metric_has_label("bulkhead_queue_depth", "bulkhead", "metrics-queue");
    assert_metric_has_label("bulkhead_calls_rejected_total", "reason", "queue_timeout");
}
