//! Bulkhead stress tests

use super::ConcurrencyTracker;
use bulwark_bulkhead::{BulkheadPool, PoolConfig};
use bulwark_core::OperationKey;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Test: a thousand callers funnel through ten slots
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_large_queue() {
    let pool = Arc::new(
        BulkheadPool::builder()
            .default_config(PoolConfig::new(10, 1000).unwrap())
            .build(),
    );
    let key = OperationKey::from("license-by-org");
    let tracker = ConcurrencyTracker::new();
    let processed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let handles: Vec<_> = (0..1000)
        .map(|_| {
            let (pool, key) = (Arc::clone(&pool), key.clone());
            let (tracker, processed) = (Arc::clone(&tracker), Arc::clone(&processed));
            tokio::spawn(async move {
                let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
                let slot = pool.try_acquire(&key, deadline).await.unwrap();
                tracker.enter();
                sleep(Duration::from_millis(5)).await;
                processed.fetch_add(1, Ordering::Relaxed);
                tracker.exit();
                drop(slot);
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    println!("1000 queued callers with max concurrency 10");
    println!("Completed in: {:?}", start.elapsed());
    println!("Peak concurrency: {}", tracker.peak());

    assert!(tracker.peak() <= 10, "Should not exceed max concurrency");
    assert_eq!(processed.load(Ordering::Relaxed), 1000);
    let metrics = pool.metrics(&key);
    assert_eq!((metrics.in_flight, metrics.queued), (0, 0));
}

/// Test: rejected and timed-out callers leave no queue places behind
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_rejection_churn() {
    let pool = Arc::new(
        BulkheadPool::builder()
            .default_config(PoolConfig::new(4, 8).unwrap())
            .build(),
    );
    let key = OperationKey::from("organization-lookup");
    let (admitted, rejected) = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));

    let handles: Vec<_> = (0..5000)
        .map(|_| {
            let (pool, key) = (Arc::clone(&pool), key.clone());
            let (admitted, rejected) = (Arc::clone(&admitted), Arc::clone(&rejected));
            tokio::spawn(async move {
                let deadline = tokio::time::Instant::now() + Duration::from_millis(2);
                match pool.try_acquire(&key, deadline).await {
                    Ok(slot) => {
                        admitted.fetch_add(1, Ordering::Relaxed);
                        tokio::task::yield_now().await;
                        drop(slot);
                    }
                    Err(_) => {
                        rejected.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let total = admitted.load(Ordering::Relaxed) + rejected.load(Ordering::Relaxed);
    println!(
        "admitted {}, rejected {}",
        admitted.load(Ordering::Relaxed),
        rejected.load(Ordering::Relaxed)
    );
    assert_eq!(total, 5000);
    let metrics = pool.metrics(&key);
    assert_eq!((metrics.in_flight, metrics.queued), (0, 0));
}

/// Test: thousands of keys created on first use
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_key_fan_out() {
    let pool = Arc::new(BulkheadPool::default());
    let handles: Vec<_> = (0..10_000)
        .map(|i| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                let key = OperationKey::from(format!("tenant-{}", i % 2000));
                let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
                let _slot = pool.try_acquire(&key, deadline).await;
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(pool.keys().len(), 2000);
}
