//! Half-open probe gate
//!
//! While the circuit is half-open exactly one caller may run the protected
//! operation as a recovery probe. `ProbeGate` hands out that single permit;
//! everyone else is turned away until the permit is dropped. The flag is
//! only ever cleared by the permit itself, so a new half-open period can never
//! hand out a second permit while an old probe is still running.

use std::sync::atomic::{AtomicBool, Ordering};

/// Single-permit gate for half-open trial calls
#[derive(Debug, Default)]
pub struct ProbeGate {
    in_flight: AtomicBool,
}

impl ProbeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to become the probing caller without blocking
    ///
    /// Returns `None` if another probe is already running.
    pub fn try_acquire(&self) -> Option<ProbePermit<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProbePermit { gate: self })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Permit for the one in-flight probe
///
/// Dropping the permit reopens the gate, even if the probe panics.
#[derive(Debug)]
pub struct ProbePermit<'a> {
    gate: &'a ProbeGate,
}

impl Drop for ProbePermit<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.store(false, Ordering::Release);
    }
}
