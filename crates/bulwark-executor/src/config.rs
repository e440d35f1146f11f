//! Per-key command configuration.

use bulwark_bulkhead::PoolConfig;
use bulwark_circuitbreaker::CircuitBreakerConfig;
use bulwark_core::{ConfigError, WindowConfig};
use std::time::Duration;

/// Everything that governs how one operation key is protected.
///
/// With the `serde` feature, durations are (de)serialized as whole
/// milliseconds under `*_ms` names:
///
/// ```json
/// {
///   "max_concurrent": 30,
///   "max_queue_depth": 10,
///   "timeout_ms": 2000,
///   "request_volume_threshold": 10,
///   "error_threshold_percentage": 75,
///   "sleep_window_ms": 7000,
///   "bucket_count": 5,
///   "bucket_duration_ms": 3000
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CommandConfig {
    /// Calls allowed to run at the same time.
    pub max_concurrent: usize,
    /// Calls allowed to wait for a slot.
    pub max_queue_depth: usize,
    /// Deadline for one call, including time spent queued.
    #[cfg_attr(feature = "serde", serde(rename = "timeout_ms", with = "millis"))]
    pub timeout: Duration,
    /// Minimum calls in the window before the breaker may open.
    pub request_volume_threshold: u64,
    /// Error percentage (1 to 100) at or above which the breaker opens.
    pub error_threshold_percentage: u32,
    /// How long the breaker stays open before probing.
    #[cfg_attr(feature = "serde", serde(rename = "sleep_window_ms", with = "millis"))]
    pub sleep_window: Duration,
    /// Number of buckets in the rolling window.
    pub bucket_count: usize,
    /// Length of one bucket.
    #[cfg_attr(feature = "serde", serde(rename = "bucket_duration_ms", with = "millis"))]
    pub bucket_duration: Duration,
}

impl CommandConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> CommandConfigBuilder {
        CommandConfigBuilder {
            config: CommandConfig::default(),
        }
    }

    /// Checks every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool_config()?;
        self.breaker_config()?;
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "must be non-zero"));
        }
        Ok(())
    }

    /// The bulkhead part of this configuration.
    pub fn pool_config(&self) -> Result<PoolConfig, ConfigError> {
        PoolConfig::new(self.max_concurrent, self.max_queue_depth)
    }

    /// The circuit breaker part of this configuration.
    pub fn breaker_config(&self) -> Result<CircuitBreakerConfig, ConfigError> {
        if !(1..=100).contains(&self.error_threshold_percentage) {
            return Err(ConfigError::invalid(
                "error_threshold_percentage",
                format!("must be in 1..=100, got {}", self.error_threshold_percentage),
            ));
        }
        let config = CircuitBreakerConfig {
            request_volume_threshold: self.request_volume_threshold,
            error_threshold: f64::from(self.error_threshold_percentage) / 100.0,
            sleep_window: self.sleep_window,
            window: WindowConfig::new(self.bucket_count, self.bucket_duration)?,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for CommandConfig {
    /// 10 concurrent, no queue, 1s timeout; breaker at 20 calls / 50% with
    /// a 5s sleep window over ten 1s buckets.
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_queue_depth: 0,
            timeout: Duration::from_millis(1000),
            request_volume_threshold: 20,
            error_threshold_percentage: 50,
            sleep_window: Duration::from_millis(5000),
            bucket_count: 10,
            bucket_duration: Duration::from_millis(1000),
        }
    }
}

/// Builder for [`CommandConfig`].
///
/// # Example
///
/// ```rust
/// use bulwark_executor::CommandConfig;
/// use std::time::Duration;
///
/// let config = CommandConfig::builder()
///     .max_concurrent(30)
///     .max_queue_depth(10)
///     .timeout(Duration::from_millis(2000))
///     .request_volume_threshold(10)
///     .error_threshold_percentage(75)
///     .sleep_window(Duration::from_millis(7000))
///     .buckets(5, Duration::from_millis(3000))
///     .build()
///     .unwrap();
/// assert_eq!(config.timeout, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct CommandConfigBuilder {
    config: CommandConfig,
}

impl CommandConfigBuilder {
    /// Calls allowed to run at the same time.
    ///
    /// Default: 10
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.config.max_concurrent = n;
        self
    }

    /// Calls allowed to wait for a slot.
    ///
    /// Default: 0
    pub fn max_queue_depth(mut self, n: usize) -> Self {
        self.config.max_queue_depth = n;
        self
    }

    /// Deadline for one call.
    ///
    /// Default: 1000ms
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Minimum calls in the window before the breaker may open.
    ///
    /// Default: 20
    pub fn request_volume_threshold(mut self, n: u64) -> Self {
        self.config.request_volume_threshold = n;
        self
    }

    /// Error percentage at or above which the breaker opens.
    ///
    /// Default: 50
    pub fn error_threshold_percentage(mut self, percent: u32) -> Self {
        self.config.error_threshold_percentage = percent;
        self
    }

    /// How long the breaker stays open before probing.
    ///
    /// Default: 5000ms
    pub fn sleep_window(mut self, duration: Duration) -> Self {
        self.config.sleep_window = duration;
        self
    }

    /// Shape of the rolling window.
    ///
    /// Default: 10 buckets of 1000ms
    pub fn buckets(mut self, count: usize, duration: Duration) -> Self {
        self.config.bucket_count = count;
        self.config.bucket_duration = duration;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<CommandConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(feature = "serde")]
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
