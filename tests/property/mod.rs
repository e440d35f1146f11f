//! Property-based tests for bulwark.
//!
//! Run with: cargo test --test property_tests

pub mod bulkhead;
pub mod circuit_breaker;
pub mod window;

use bulwark_core::{CallOutcome, Rejection};
use proptest::prelude::*;

/// Any outcome a protected call can end with.
pub fn outcome() -> impl Strategy<Value = CallOutcome> {
    prop_oneof![
        3 => Just(CallOutcome::Success),
        1 => Just(CallOutcome::Failure),
        1 => Just(CallOutcome::Timeout),
        1 => Just(CallOutcome::Rejected(Rejection::ByBreaker)),
        1 => Just(CallOutcome::Rejected(Rejection::ByBulkhead)),
    ]
}
