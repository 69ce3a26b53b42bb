//! Circuit breaker configuration
//!
//! `Config` is a plain value object. It derives serde so an application can
//! load it from whatever format it already uses and hand it to
//! [`CircuitBreaker::new`](crate::CircuitBreaker::new).

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Failures inside the rolling window required to open the circuit
    pub failure_threshold: usize,

    /// How far back failures are counted, in milliseconds
    pub rolling_window_ms: u64,

    /// How long the circuit stays open before a probe is allowed, in milliseconds
    pub open_duration_ms: u64,

    /// Jitter factor for the open duration (0.0 = no jitter, 1.0 = full jitter)
    /// Uses chrono-machines formula: duration * (1 - jitter + rand * jitter)
    pub jitter_factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            rolling_window_ms: 10_000,
            open_duration_ms: 5_000,
            jitter_factor: 0.0,
        }
    }
}

impl Config {
    pub fn new(failure_threshold: usize, rolling_window: Duration, open_duration: Duration) -> Self {
        Self {
            failure_threshold,
            rolling_window_ms: duration_millis(rolling_window),
            open_duration_ms: duration_millis(open_duration),
            ..Default::default()
        }
    }

    pub fn rolling_window(&self) -> Duration {
        Duration::from_millis(self.rolling_window_ms)
    }

    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }

    /// Reject values the breaker cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold);
        }
        if self.rolling_window_ms == 0 {
            return Err(ConfigError::InvalidRollingWindow);
        }
        if self.open_duration_ms == 0 {
            return Err(ConfigError::InvalidOpenDuration);
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::InvalidJitterFactor(self.jitter_factor));
        }
        Ok(())
    }
}

pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
