//! Builder API for ergonomic circuit breaker configuration

use crate::{
    callbacks::{Callbacks, FailureRecorded, Transition},
    circuit::CircuitBreaker,
    clock::{Clock, MonotonicClock},
    config::{Config, duration_millis},
    errors::ConfigError,
};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating circuit breakers with fluent API
pub struct CircuitBuilder {
    name: String,
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    callbacks: Callbacks,
}

impl CircuitBuilder {
    /// Create a new builder for a circuit with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            clock: None,
            callbacks: Callbacks::new(),
        }
    }

    /// Start from an existing configuration (e.g. one loaded from a file)
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the failure threshold (failures inside the window that open the circuit)
    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set how far back failures are counted
    pub fn rolling_window(mut self, window: Duration) -> Self {
        self.config.rolling_window_ms = duration_millis(window);
        self
    }

    pub fn rolling_window_ms(mut self, millis: u64) -> Self {
        self.config.rolling_window_ms = millis;
        self
    }

    /// Set how long the circuit stays open before probing
    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.config.open_duration_ms = duration_millis(duration);
        self
    }

    pub fn open_duration_ms(mut self, millis: u64) -> Self {
        self.config.open_duration_ms = millis;
        self
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    /// Uses chrono-machines formula: duration * (1 - jitter + rand * jitter)
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.config.jitter_factor = factor;
        self
    }

    /// Use a custom time source instead of the monotonic default
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tripwire::{CircuitBreaker, ManualClock};
    /// use std::sync::Arc;
    ///
    /// let clock = Arc::new(ManualClock::new());
    /// let circuit = CircuitBreaker::builder("api")
    ///     .clock(clock.clone())
    ///     .build()
    ///     .unwrap();
    ///
    /// clock.set(10_000);
    /// assert!(circuit.is_closed());
    /// ```
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set callback for when circuit opens
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&Transition<'_>) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit closes
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&Transition<'_>) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit enters half-open
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&Transition<'_>) + Send + Sync + 'static,
    {
        self.callbacks.on_half_open = Some(Arc::new(f));
        self
    }

    /// Set callback for every failure counted while closed
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&FailureRecorded<'_>) + Send + Sync + 'static,
    {
        self.callbacks.on_failure = Some(Arc::new(f));
        self
    }

    /// Build the circuit breaker
    ///
    /// Fails if the configuration has a zero threshold, window or open
    /// duration, or a jitter factor outside `0.0..=1.0`.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));

        CircuitBreaker::with_parts(self.name, self.config, clock, self.callbacks)
    }
}
