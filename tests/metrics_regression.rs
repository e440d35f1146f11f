//! Metrics regression tests for every protection.
//!
//! These tests pin metric names, types and labels. Dashboards and alerts
//! depend on them, so they are treated as part of the public API.
//!
//! Run with: cargo test --test metrics_regression --features metrics

#[cfg(feature = "metrics")]
mod metrics_regression {
    mod bulkhead;
    mod circuitbreaker;
    mod executor;

    pub(crate) mod helpers {
        use metrics_util::debugging::{DebugValue, DebuggingRecorder};
        use std::sync::LazyLock;

        pub(crate) static RECORDER: LazyLock<DebuggingRecorder> =
            LazyLock::new(DebuggingRecorder::default);

        /// Installs the shared recorder; later calls are no-ops.
        pub(crate) fn init_recorder() {
            let _ = metrics::set_global_recorder(&*RECORDER);
        }

        pub(crate) fn get_metrics_snapshot() -> Vec<(
            metrics_util::CompositeKey,
            Option<metrics::Unit>,
            Option<metrics::SharedString>,
            DebugValue,
        )> {
            RECORDER.snapshotter().snapshot().into_vec()
        }

        fn assert_exists(name: &str, kind: &str, is_kind: fn(&DebugValue) -> bool) {
            let found = get_metrics_snapshot()
                .iter()
                .any(|(key, _, _, value)| key.key().name() == name && is_kind(value));
            assert!(found, "Expected {kind} '{name}' not found in metrics");
        }

        pub(crate) fn assert_counter_exists(name: &str) {
            assert_exists(name, "counter", |v| matches!(v, DebugValue::Counter(_)));
        }

        pub(crate) fn assert_gauge_exists(name: &str) {
            assert_exists(name, "gauge", |v| matches!(v, DebugValue::Gauge(_)));
        }

        pub(crate) fn assert_histogram_exists(name: &str) {
            assert_exists(name, "histogram", |v| matches!(v, DebugValue::Histogram(_)));
        }

        pub(crate) fn assert_metric_has_label(name: &str, label_key: &str, label_value: &str) {
            let found = get_metrics_snapshot().iter().any(|(composite_key, _, _, _)| {
                let key = composite_key.key();
                key.name() == name
                    && key
                        .labels()
                        .any(|label| label.key() == label_key && label.value() == label_value)
            });
            assert!(
                found,
                "Expected metric '{name}' with label {label_key}='{label_value}' not found"
            );
        }
    }
}
