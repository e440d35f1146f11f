//! Property tests for the bulkhead.
//!
//! Invariants tested:
//! - with every slot held, exactly `max_queue_depth` callers queue and the
//!   rest are rejected immediately
//! - queued callers are admitted in arrival order

use bulwark_bulkhead::{BulkheadPool, PoolConfig};
use bulwark_core::OperationKey;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Builder;
use tokio::time::Instant;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: admitted + queued + rejected accounts for every caller
    #[test]
    fn admission_is_bounded(
        max_concurrent in 1usize..=8,
        max_queue_depth in 0usize..=8,
        callers in 1usize..=40,
    ) {
        let rt = Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let pool = Arc::new(
                BulkheadPool::builder()
                    .default_config(PoolConfig::new(max_concurrent, max_queue_depth).unwrap())
                    .build(),
            );
            let key = OperationKey::from("license-by-org");
            let deadline = Instant::now() + Duration::from_secs(60);

            let mut held = Vec::new();
            let mut rejected = 0;
            let mut waiters = Vec::new();
            for _ in 0..callers {
                if held.len() < max_concurrent {
                    held.push(pool.try_acquire(&key, deadline).await.unwrap());
                    continue;
                }
                let pool = Arc::clone(&pool);
                let key = key.clone();
                let waiter = tokio::spawn(async move { pool.try_acquire(&key, deadline).await });
                tokio::task::yield_now().await;
                if waiter.is_finished() {
                    prop_assert!(waiter.await.unwrap().is_err());
                    rejected += 1;
                } else {
                    waiters.push(waiter);
                }
            }

            let expected_queued = callers.saturating_sub(max_concurrent).min(max_queue_depth);
            prop_assert_eq!(waiters.len(), expected_queued);
            prop_assert_eq!(rejected, callers.saturating_sub(max_concurrent + max_queue_depth));
            prop_assert_eq!(pool.metrics(&key).queued, expected_queued);

            drop(held);
            for waiter in waiters {
                prop_assert!(waiter.await.unwrap().is_ok());
            }
            Ok(())
        })?;
    }

    /// Property: waiters get slots in the order they queued
    #[test]
    fn queue_is_fifo(waiting in 2usize..=12) {
        let rt = Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let pool = Arc::new(
                BulkheadPool::builder()
                    .default_config(PoolConfig::new(1, waiting).unwrap())
                    .build(),
            );
            let key = OperationKey::from("organization-lookup");
            let deadline = Instant::now() + Duration::from_secs(60);
            let order = Arc::new(Mutex::new(Vec::new()));

            let first = pool.try_acquire(&key, deadline).await.unwrap();
            let mut waiters = Vec::new();
            for i in 0..waiting {
                let (pool, key, order) = (Arc::clone(&pool), key.clone(), Arc::clone(&order));
                waiters.push(tokio::spawn(async move {
                    let slot = pool.try_acquire(&key, deadline).await.unwrap();
                    order.lock().unwrap().push(i);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    drop(slot);
                }));
                tokio::task::yield_now().await;
            }

            drop(first);
            for waiter in waiters {
                waiter.await.unwrap();
            }
            let order = order.lock().unwrap().clone();
            prop_assert_eq!(order, (0..waiting).collect::<Vec<_>>());
            Ok(())
        })?;
    }
}
