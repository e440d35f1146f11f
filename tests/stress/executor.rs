//! Executor stress tests

use bulwark_core::OperationKey;
use bulwark_executor::{CommandConfig, ResilientExecutor};
use bulwark_fallback::Fallback;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Test: every call under heavy concurrency ends in a value
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_mixed_outcomes() {
    let executor = ResilientExecutor::builder()
        .command(
            "organization-lookup",
            CommandConfig::builder()
                .max_concurrent(16)
                .max_queue_depth(32)
                .timeout(Duration::from_millis(50))
                .build()
                .unwrap(),
        )
        .fallback(
            "organization-lookup",
            Fallback::<u64, u64>::value(u64::MAX),
        )
        .build();
    let key = OperationKey::from("organization-lookup");
    let attempts = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let handles: Vec<_> = (0..20_000u64)
        .map(|i| {
            let (executor, key, attempts) = (executor.clone(), key.clone(), Arc::clone(&attempts));
            tokio::spawn(async move {
                executor
                    .invoke(&key, i, move |i| async move {
                        attempts.fetch_add(1, Ordering::Relaxed);
                        match i % 10 {
                            0 => Err(std::io::Error::other("organization service down")),
                            1 => {
                                tokio::time::sleep(Duration::from_millis(100)).await;
                                Ok(i)
                            }
                            _ => Ok(i),
                        }
                    })
                    .await
            })
        })
        .collect();

    let mut fallbacks = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() == u64::MAX {
            fallbacks += 1;
        }
    }

    println!("20000 calls in {:?}", start.elapsed());
    println!(
        "attempted {}, fallbacks {}, breaker {:?}",
        attempts.load(Ordering::Relaxed),
        fallbacks,
        executor.breaker_state(&key)
    );

    // Failing and slow calls always end in the fallback, whether attempted or not.
    assert!(fallbacks >= 4000);
    let bulkhead = executor.bulkhead_metrics(&key);
    assert_eq!((bulkhead.in_flight, bulkhead.queued), (0, 0));
}

/// Test: a saturated key does not slow down a healthy one
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_isolation_between_keys() {
    let executor = ResilientExecutor::builder()
        .command(
            "license-by-org",
            CommandConfig::builder()
                .max_concurrent(2)
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap(),
        )
        .command(
            "organization-lookup",
            CommandConfig::builder()
                .max_concurrent(32)
                .timeout(Duration::from_millis(500))
                .build()
                .unwrap(),
        )
        .fallback("license-by-org", Fallback::<u32, u32>::value(0))
        .build();

    let slow = OperationKey::from("license-by-org");
    for _ in 0..500 {
        let (executor, slow) = (executor.clone(), slow.clone());
        tokio::spawn(async move {
            let _ = executor
                .invoke(&slow, 0u32, |_| async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok::<_, std::io::Error>(1)
                })
                .await;
        });
    }

    let fast = OperationKey::from("organization-lookup");
    let start = Instant::now();
    for i in 0..1000u32 {
        let value = executor
            .invoke(&fast, i, |i| async move { Ok::<_, std::io::Error>(i) })
            .await
            .unwrap();
        assert_eq!(value, i);
    }
    println!("1000 healthy calls next to a saturated key in {:?}", start.elapsed());
    assert!(start.elapsed() < Duration::from_secs(1));
}
