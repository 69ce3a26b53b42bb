//! Error types for circuit breaker operations

use thiserror::Error;

/// Errors that can occur during circuit breaker operations
#[derive(Debug, Error)]
pub enum CircuitError<E = Box<dyn std::error::Error + Send + Sync>> {
    /// Circuit is open, calls are being rejected until the cooldown ends
    #[error("Circuit '{circuit}' is open (until {open_until}ms)")]
    Open { circuit: String, open_until: u64 },
    /// A half-open probe is already running
    #[error("Circuit '{circuit}' is half-open and a probe is already in flight")]
    ProbeInFlight { circuit: String },
    /// The wrapped operation failed
    #[error("Circuit execution failed: {0}")]
    Execution(E),
}

impl<E> CircuitError<E> {
    /// True when the call never reached the protected operation
    pub fn is_rejection(&self) -> bool {
        !matches!(self, CircuitError::Execution(_))
    }

    /// The operation's own error, if the call got that far
    pub fn into_execution(self) -> Option<E> {
        match self {
            CircuitError::Execution(e) => Some(e),
            _ => None,
        }
    }
}

/// Rejected circuit configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("failure threshold must be at least 1")]
    InvalidFailureThreshold,
    #[error("rolling window must be longer than 0ms")]
    InvalidRollingWindow,
    #[error("open duration must be longer than 0ms")]
    InvalidOpenDuration,
    #[error("jitter factor must be within 0.0..=1.0, got {0}")]
    InvalidJitterFactor(f64),
}
