//! Stress tests for bulwark.
//!
//! ## What We Test
//!
//! - **High concurrency**: thousands of callers on one key
//! - **Key fan-out**: thousands of keys created lazily
//! - **State consistency**: counters and breaker state after the storm
//! - **Resource cleanup**: no slot or queue place leaks

pub mod bulkhead;
pub mod executor;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks peak concurrent operations.
pub struct ConcurrencyTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn enter(&self) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}
