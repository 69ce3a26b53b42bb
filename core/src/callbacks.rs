//! Callback system for circuit breaker state transitions
//!
//! Callbacks are an observability hook only. They run after the breaker has
//! released its transition lock and their presence never changes how calls
//! are dispatched.

use crate::circuit::CircuitState;
use std::sync::Arc;

/// A state change of a circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<'a> {
    pub circuit: &'a str,
    pub from: CircuitState,
    pub to: CircuitState,
    /// Clock reading that triggered the transition
    pub at_millis: u64,
    /// End of the cooldown, set when entering `Open`
    pub open_until: Option<u64>,
}

/// A failure counted toward the threshold while closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecorded<'a> {
    pub circuit: &'a str,
    pub at_millis: u64,
    /// Failures inside the rolling window, including this one
    pub failures: usize,
    pub threshold: usize,
}

type TransitionFn = Arc<dyn Fn(&Transition<'_>) + Send + Sync>;
type FailureFn = Arc<dyn Fn(&FailureRecorded<'_>) + Send + Sync>;

/// Callbacks for circuit breaker events
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_open: Option<TransitionFn>,
    pub on_close: Option<TransitionFn>,
    pub on_half_open: Option<TransitionFn>,
    pub on_failure: Option<FailureFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger_transition(&self, transition: &Transition<'_>) {
        let callback = match transition.to {
            CircuitState::Open => &self.on_open,
            CircuitState::Closed => &self.on_close,
            CircuitState::HalfOpen => &self.on_half_open,
        };
        if let Some(callback) = callback {
            callback(transition);
        }
    }

    pub fn trigger_failure(&self, failure: &FailureRecorded<'_>) {
        if let Some(ref callback) = self.on_failure {
            callback(failure);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}
