//! Circuit breaker implementation using state machines
//!
//! The lifecycle (Closed → Open → HalfOpen → Closed/Open) is driven by a
//! `state_machines` dynamic machine kept behind a single transition lock.
//! The current state is mirrored into an atomic so the fast path can branch
//! without taking that lock.

use crate::{
    callbacks::{Callbacks, FailureRecorded, Transition},
    clock::{Clock, MonotonicClock},
    config::Config,
    errors::{CircuitError, ConfigError},
    probe::{ProbeGate, ProbePermit},
    window::FailureLog,
};
use state_machines::state_machine;
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace};

/// Observable circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls pass through, failures are counted
    Closed = 0,
    /// Calls are short-circuited to the fallback
    Open = 1,
    /// One probe call is allowed through to test recovery
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

impl From<u8> for CircuitState {
    fn from(v: u8) -> Self {
        match v {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker context - shared data across all states
#[derive(Debug, Clone)]
pub struct CircuitContext {
    pub name: String,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub failures: Arc<FailureLog>,
}

impl CircuitContext {
    pub fn new(name: String, config: Config, clock: Arc<dyn Clock>) -> Self {
        let failures = Arc::new(FailureLog::new(config.rolling_window_ms));
        Self {
            name,
            config,
            clock,
            failures,
        }
    }
}

impl Default for CircuitContext {
    fn default() -> Self {
        Self::new(
            String::new(),
            Config::default(),
            Arc::new(MonotonicClock::new()),
        )
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    pub open_until: u64,
}

/// Data specific to the HalfOpen state
#[derive(Debug, Clone, Default)]
pub struct HalfOpenData {
    pub probe_succeeded: bool,
}

state_machine! {
    name: Lifecycle,
    context: CircuitContext,
    dynamic: true,

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
        HalfOpen(HalfOpenData),
    ],
    events {
        trip {
            guards: [should_open],
            transition: { from: [Closed, HalfOpen], to: Open }
        }
        attempt_reset {
            guards: [cooldown_elapsed],
            transition: { from: Open, to: HalfOpen }
        }
        close {
            guards: [probe_succeeded],
            transition: { from: HalfOpen, to: Closed }
        }
    }
}

impl Lifecycle<Closed> {
    /// Failures inside the rolling window reached the threshold
    fn should_open(&self, ctx: &CircuitContext) -> bool {
        ctx.failures.len() >= ctx.config.failure_threshold
    }
}

impl Lifecycle<HalfOpen> {
    /// Any failed probe reopens the circuit
    fn should_open(&self, _ctx: &CircuitContext) -> bool {
        !self
            .state_data_half_open()
            .is_some_and(|data| data.probe_succeeded)
    }

    fn probe_succeeded(&self, _ctx: &CircuitContext) -> bool {
        self.state_data_half_open()
            .is_some_and(|data| data.probe_succeeded)
    }
}

impl Lifecycle<Open> {
    fn cooldown_elapsed(&self, ctx: &CircuitContext) -> bool {
        self.state_data_open()
            .is_some_and(|data| ctx.clock.now_millis() >= data.open_until)
    }
}

/// Circuit breaker public API
///
/// A breaker is shared by reference (typically in an `Arc`) between all the
/// callers of one protected resource.
pub struct CircuitBreaker {
    /// Transition lock; every state change happens while holding it
    machine: Mutex<DynamicLifecycle>,
    context: CircuitContext,
    state: AtomicU8,
    open_until: AtomicU64,
    probe: ProbeGate,
    /// Bumped on every half-open entry and on reset
    half_open_period: AtomicU64,
    callbacks: Callbacks,
}

impl CircuitBreaker {
    /// Create a new circuit breaker (use builder() for more options)
    pub fn new(name: impl Into<String>, config: Config) -> Result<Self, ConfigError> {
        Self::with_parts(
            name.into(),
            config,
            Arc::new(MonotonicClock::new()),
            Callbacks::new(),
        )
    }

    /// Create a circuit breaker with a custom clock and callbacks (used by builder)
    pub(crate) fn with_parts(
        name: String,
        config: Config,
        clock: Arc<dyn Clock>,
        callbacks: Callbacks,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let context = CircuitContext::new(name, config, clock);
        let machine = DynamicLifecycle::new(context.clone());

        debug!(
            circuit = %context.name,
            failure_threshold = context.config.failure_threshold,
            rolling_window_ms = context.config.rolling_window_ms,
            open_duration_ms = context.config.open_duration_ms,
            "circuit breaker created"
        );

        Ok(Self {
            machine: Mutex::new(machine),
            context,
            state: AtomicU8::new(CircuitState::Closed as u8),
            open_until: AtomicU64::new(0),
            probe: ProbeGate::new(),
            half_open_period: AtomicU64::new(0),
            callbacks,
        })
    }

    /// Create a new circuit breaker builder
    pub fn builder(name: impl Into<String>) -> crate::builder::CircuitBuilder {
        crate::builder::CircuitBuilder::new(name)
    }

    /// Run `operation` under circuit protection, falling back on denial or failure
    ///
    /// Operation failures never reach the caller: they are counted and
    /// replaced by `fallback()`. A panicking fallback propagates.
    pub fn execute<T, E, F, G>(&self, operation: F, fallback: G) -> T
    where
        F: FnOnce() -> Result<T, E>,
        G: FnOnce() -> T,
    {
        match self.try_execute(operation, || Ok::<T, Infallible>(fallback())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`execute`](Self::execute), but with a fallible fallback whose
    /// error is handed back to the caller untouched
    pub fn try_execute<T, E, FE, F, G>(&self, operation: F, fallback: G) -> Result<T, FE>
    where
        F: FnOnce() -> Result<T, E>,
        G: FnOnce() -> Result<T, FE>,
    {
        match self.call(operation) {
            Ok(value) => Ok(value),
            Err(err) => {
                trace!(
                    circuit = %self.context.name,
                    rejected = err.is_rejection(),
                    "routing call to fallback"
                );
                fallback()
            }
        }
    }

    /// Execute a fallible operation with circuit breaker protection
    ///
    /// Denied calls come back as [`CircuitError::Open`] or
    /// [`CircuitError::ProbeInFlight`] without running `operation`.
    pub fn call<T, E, F>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let now = self.context.clock.now_millis();
        let mut state = self.state();

        if state == CircuitState::Open {
            let open_until = self.open_until.load(Ordering::SeqCst);
            if now < open_until {
                trace!(circuit = %self.context.name, now, open_until, "call rejected, circuit open");
                return Err(self.open_error());
            }
            state = self.attempt_half_open(now);
        }

        match state {
            CircuitState::HalfOpen => self.probe(now, operation),
            CircuitState::Closed => self.call_closed(operation),
            CircuitState::Open => Err(self.open_error()),
        }
    }

    /// Current state, safe to read while other threads are calling
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::SeqCst))
    }

    /// Get current state name
    pub fn state_name(&self) -> &'static str {
        self.state().as_str()
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    pub fn is_half_open(&self) -> bool {
        self.state() == CircuitState::HalfOpen
    }

    pub fn name(&self) -> &str {
        &self.context.name
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    /// Failures currently counted toward the threshold
    pub fn failure_count(&self) -> usize {
        self.context.failures.len()
    }

    /// End of the open cooldown, while the circuit is open
    pub fn open_until(&self) -> Option<u64> {
        match self.state() {
            CircuitState::Open => Some(self.open_until.load(Ordering::SeqCst)),
            _ => None,
        }
    }

    /// Clear all failures and force the circuit back to Closed
    ///
    /// A recovery call still running when this is called cannot settle any
    /// later half-open period, but it keeps turning away callers in such a
    /// period until it returns.
    pub fn reset(&self) {
        let now = self.context.clock.now_millis();
        let transition = {
            let mut machine = self.lock_machine();
            let from = self.state();

            *machine = DynamicLifecycle::new(self.context.clone());
            self.half_open_period.fetch_add(1, Ordering::SeqCst);
            self.context.failures.clear();
            self.open_until.store(0, Ordering::SeqCst);
            self.publish(CircuitState::Closed);

            (from != CircuitState::Closed).then(|| self.transition(from, CircuitState::Closed, now))
        };

        if let Some(transition) = transition {
            self.announce(&transition);
        }
    }

    /// Open → HalfOpen once the cooldown is over; returns the state to dispatch on
    fn attempt_half_open(&self, now: u64) -> CircuitState {
        let transition = {
            let mut machine = self.lock_machine();

            // Another caller may have moved us already
            let due = self.state() == CircuitState::Open
                && now >= self.open_until.load(Ordering::SeqCst);

            if due && machine.handle(LifecycleEvent::AttemptReset).is_ok() {
                self.half_open_period.fetch_add(1, Ordering::SeqCst);
                self.publish(CircuitState::HalfOpen);
                Some(self.transition(CircuitState::Open, CircuitState::HalfOpen, now))
            } else {
                None
            }
        };

        if let Some(transition) = transition {
            self.announce(&transition);
        }
        self.state()
    }

    fn probe<T, E, F>(&self, now: u64, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let Some(permit) = self.probe.try_acquire() else {
            trace!(circuit = %self.context.name, "call rejected, probe in flight");
            return Err(CircuitError::ProbeInFlight {
                circuit: self.context.name.clone(),
            });
        };

        // The previous probe finished between our state read and the permit
        match self.state() {
            CircuitState::HalfOpen => {}
            CircuitState::Closed => {
                drop(permit);
                return self.call_closed(operation);
            }
            CircuitState::Open => return Err(self.open_error()),
        }

        let period = self.half_open_period.load(Ordering::SeqCst);
        debug!(circuit = %self.context.name, now, period, "half-open probe started");
        let result = operation();
        let finished = self.context.clock.now_millis();

        let transition = self.settle_probe(permit, period, result.is_ok(), finished);
        if let Some(transition) = transition {
            self.announce(&transition);
        }

        result.map_err(CircuitError::Execution)
    }

    /// Apply the probe outcome. The permit is released inside the transition
    /// lock so no new half-open period can start while it is still held.
    ///
    /// An outcome from an earlier half-open period (one that `reset` cut
    /// short) is discarded.
    fn settle_probe(
        &self,
        permit: ProbePermit<'_>,
        period: u64,
        succeeded: bool,
        at: u64,
    ) -> Option<Transition<'_>> {
        let mut machine = self.lock_machine();

        let current = self.state() == CircuitState::HalfOpen
            && self.half_open_period.load(Ordering::SeqCst) == period;

        let transition = if !current {
            None
        } else if succeeded {
            self.close_locked(&mut machine, at)
        } else {
            self.trip_locked(&mut machine, CircuitState::HalfOpen, at)
        };

        drop(permit);
        transition
    }

    fn call_closed<T, E, F>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        match operation() {
            Ok(value) => {
                let now = self.context.clock.now_millis();
                let pruned = self.context.failures.prune(now);
                if pruned > 0 {
                    debug!(circuit = %self.context.name, pruned, now, "expired failures pruned");
                }
                Ok(value)
            }
            Err(e) => {
                self.record_failure(self.context.clock.now_millis());
                Err(CircuitError::Execution(e))
            }
        }
    }

    fn record_failure(&self, at: u64) {
        let threshold = self.context.config.failure_threshold;

        let (failures, transition) = {
            let mut machine = self.lock_machine();

            // Failures racing with an open transition belong to the old period
            if self.state() != CircuitState::Closed {
                return;
            }

            let failures = self.context.failures.record(at);
            let transition = if failures >= threshold {
                self.trip_locked(&mut machine, CircuitState::Closed, at)
            } else {
                None
            };
            (failures, transition)
        };

        debug!(circuit = %self.context.name, failures, threshold, at, "failure recorded");
        self.callbacks.trigger_failure(&FailureRecorded {
            circuit: &self.context.name,
            at_millis: at,
            failures,
            threshold,
        });

        if let Some(transition) = transition {
            self.announce(&transition);
        }
    }

    fn trip_locked(
        &self,
        machine: &mut DynamicLifecycle,
        from: CircuitState,
        at: u64,
    ) -> Option<Transition<'_>> {
        machine.handle(LifecycleEvent::Trip).ok()?;

        let open_until = at.saturating_add(self.cooldown_millis());
        if let Some(data) = machine.open_data_mut() {
            data.open_until = open_until;
        }
        self.context.failures.clear();
        self.open_until.store(open_until, Ordering::SeqCst);
        self.publish(CircuitState::Open);

        let mut transition = self.transition(from, CircuitState::Open, at);
        transition.open_until = Some(open_until);
        Some(transition)
    }

    fn close_locked(&self, machine: &mut DynamicLifecycle, at: u64) -> Option<Transition<'_>> {
        if let Some(data) = machine.half_open_data_mut() {
            data.probe_succeeded = true;
        }
        machine.handle(LifecycleEvent::Close).ok()?;

        self.context.failures.clear();
        self.open_until.store(0, Ordering::SeqCst);
        self.publish(CircuitState::Closed);

        Some(self.transition(CircuitState::HalfOpen, CircuitState::Closed, at))
    }

    /// Open duration for the next cooldown, with optional jitter
    fn cooldown_millis(&self) -> u64 {
        let config = &self.context.config;
        if config.jitter_factor > 0.0 {
            let policy = chrono_machines::Policy {
                max_attempts: 1,
                base_delay_ms: config.open_duration_ms,
                multiplier: 1.0,
                max_delay_ms: config.open_duration_ms,
            };
            u64::from(policy.calculate_delay(1, config.jitter_factor)).max(1)
        } else {
            config.open_duration_ms
        }
    }

    fn publish(&self, state: CircuitState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn transition(&self, from: CircuitState, to: CircuitState, at: u64) -> Transition<'_> {
        Transition {
            circuit: &self.context.name,
            from,
            to,
            at_millis: at,
            open_until: None,
        }
    }

    fn announce(&self, transition: &Transition<'_>) {
        info!(
            circuit = %transition.circuit,
            from = %transition.from,
            to = %transition.to,
            at = transition.at_millis,
            open_until = ?transition.open_until,
            "circuit state changed"
        );
        self.callbacks.trigger_transition(transition);
    }

    fn open_error<E>(&self) -> CircuitError<E> {
        CircuitError::Open {
            circuit: self.context.name.clone(),
            open_until: self.open_until.load(Ordering::SeqCst),
        }
    }

    fn lock_machine(&self) -> MutexGuard<'_, DynamicLifecycle> {
        // No user code runs under this lock
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.context.name)
            .field("state", &self.state())
            .field("failures", &self.context.failures.len())
            .field("open_until", &self.open_until.load(Ordering::SeqCst))
            .field("probe_in_flight", &self.probe.is_in_flight())
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use std::cell::Cell;

    fn manual_circuit(threshold: usize) -> (Arc<ManualClock>, CircuitBreaker) {
        let clock = Arc::new(ManualClock::new());
        let circuit = CircuitBreaker::builder("test")
            .failure_threshold(threshold)
            .rolling_window_ms(1000)
            .open_duration_ms(2000)
            .clock(clock.clone())
            .build()
            .expect("valid config");
        (clock, circuit)
    }

    fn context_with(clock: Arc<ManualClock>, threshold: usize) -> CircuitContext {
        let config = Config {
            failure_threshold: threshold,
            rolling_window_ms: 1000,
            open_duration_ms: 2000,
            ..Default::default()
        };
        CircuitContext::new("test_circuit".to_string(), config, clock)
    }

    #[test]
    fn test_circuit_breaker_creation() {
        let circuit = CircuitBreaker::new("test", Config::default()).unwrap();

        assert!(circuit.is_closed());
        assert!(!circuit.is_open());
        assert_eq!(circuit.state_name(), "Closed");
        assert_eq!(circuit.open_until(), None);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = Config {
            failure_threshold: 0,
            ..Default::default()
        };

        let result = CircuitBreaker::new("test", config);
        assert!(matches!(result, Err(ConfigError::InvalidFailureThreshold)));
    }

    #[test]
    fn test_circuit_opens_after_threshold() {
        let (_clock, circuit) = manual_circuit(3);

        let _ = circuit.call(|| Err::<(), _>("error 1"));
        let _ = circuit.call(|| Err::<(), _>("error 2"));
        assert!(circuit.is_closed());
        assert_eq!(circuit.failure_count(), 2);

        let _ = circuit.call(|| Err::<(), _>("error 3"));
        assert!(circuit.is_open());
        assert_eq!(circuit.failure_count(), 0, "Opening clears the failure log");
        assert_eq!(circuit.open_until(), Some(2000));
    }

    #[test]
    fn test_open_circuit_rejects_without_running_operation() {
        let (clock, circuit) = manual_circuit(1);

        let _ = circuit.call(|| Err::<(), _>("error"));
        assert!(circuit.is_open());

        clock.set(1999);
        let ran = Cell::new(false);
        let result = circuit.call(|| {
            ran.set(true);
            Ok::<_, &str>("should not execute")
        });

        assert!(!ran.get());
        match result {
            Err(CircuitError::Open {
                circuit: name,
                open_until,
            }) => {
                assert_eq!(name, "test");
                assert_eq!(open_until, 2000);
            }
            other => panic!("Expected CircuitError::Open, got: {:?}", other),
        }
    }

    #[test]
    fn test_execute_returns_fallback_on_failure() {
        let (_clock, circuit) = manual_circuit(5);

        let value = circuit.execute(|| Err::<String, _>("boom"), || "cached".to_string());

        assert_eq!(value, "cached");
        assert_eq!(circuit.failure_count(), 1);
    }

    #[test]
    fn test_execute_returns_operation_result_on_success() {
        let (_clock, circuit) = manual_circuit(5);

        let value = circuit.execute(|| Ok::<_, &str>(42), || 0);

        assert_eq!(value, 42);
        assert_eq!(circuit.failure_count(), 0);
    }

    #[test]
    fn test_fallback_error_propagation() {
        let (_clock, circuit) = manual_circuit(1);

        let _ = circuit.call(|| Err::<(), _>("error"));
        assert!(circuit.is_open());

        let result = circuit.try_execute(
            || Ok::<String, &str>("should not execute".to_string()),
            || Err::<String, _>("fallback error"),
        );

        assert_eq!(result, Err("fallback error"));
    }

    #[test]
    #[should_panic(expected = "fallback exploded")]
    fn test_panicking_fallback_propagates() {
        let (_clock, circuit) = manual_circuit(1);

        circuit.execute(|| Err::<(), _>("error"), || panic!("fallback exploded"));
    }

    #[test]
    fn test_open_to_half_open_after_cooldown() {
        let (clock, circuit) = manual_circuit(1);

        let _ = circuit.call(|| Err::<(), _>("error"));
        assert!(circuit.is_open());

        clock.set(2000);
        let result = circuit.call(|| Ok::<_, &str>("probe"));

        assert_eq!(result.unwrap(), "probe");
        assert!(circuit.is_closed());
        assert_eq!(circuit.open_until(), None);
    }

    #[test]
    fn test_failed_probe_reopens_with_fresh_cooldown() {
        let (clock, circuit) = manual_circuit(1);

        let _ = circuit.call(|| Err::<(), _>("error"));
        clock.set(2500);

        let result = circuit.call(|| Err::<(), _>("still down"));
        assert!(matches!(result, Err(CircuitError::Execution("still down"))));
        assert!(circuit.is_open());
        assert_eq!(circuit.open_until(), Some(4500));
        assert_eq!(circuit.failure_count(), 0);
    }

    #[test]
    fn test_probe_in_flight_rejects_other_callers() {
        let (clock, circuit) = manual_circuit(1);

        let _ = circuit.call(|| Err::<(), _>("error"));
        clock.set(2000);

        let nested = circuit.call(|| {
            assert!(circuit.is_half_open());
            let inner = circuit.call(|| Ok::<_, &str>("second probe"));
            assert!(matches!(inner, Err(CircuitError::ProbeInFlight { .. })));
            Ok::<_, &str>("first probe")
        });

        assert_eq!(nested.unwrap(), "first probe");
        assert!(circuit.is_closed());
    }

    #[test]
    fn test_reset_discards_outcome_of_interrupted_recovery_call() {
        let (clock, circuit) = manual_circuit(1);

        let _ = circuit.call(|| Err::<(), _>("error"));
        clock.set(2000);

        let outer = circuit.call(|| {
            assert!(circuit.is_half_open());

            // Reset, re-trip and reach a fresh half-open period meanwhile
            circuit.reset();
            let _ = circuit.call(|| Err::<(), _>("error again"));
            assert!(circuit.is_open());
            assert_eq!(circuit.open_until(), Some(4000));

            clock.set(4000);
            let inner = circuit.call(|| Ok::<_, &str>("new period"));
            assert!(matches!(inner, Err(CircuitError::ProbeInFlight { .. })));
            assert!(circuit.is_half_open());

            Ok::<_, &str>("stale success")
        });

        assert_eq!(outer.unwrap(), "stale success");
        assert!(
            circuit.is_half_open(),
            "A stale outcome must not close the new half-open period"
        );

        let fresh = circuit.call(|| Ok::<_, &str>("fresh"));
        assert_eq!(fresh.unwrap(), "fresh");
        assert!(circuit.is_closed());
    }

    #[test]
    fn test_reset_clears_state() {
        let (_clock, circuit) = manual_circuit(2);

        let _ = circuit.call(|| Err::<(), _>("error 1"));
        let _ = circuit.call(|| Err::<(), _>("error 2"));
        assert!(circuit.is_open());

        circuit.reset();
        assert!(circuit.is_closed());
        assert_eq!(circuit.open_until(), None);

        // A reset circuit counts from zero again
        let _ = circuit.call(|| Err::<(), _>("error 3"));
        assert!(circuit.is_closed());
    }

    #[test]
    fn test_success_prunes_without_transition() {
        let (clock, circuit) = manual_circuit(3);

        let _ = circuit.call(|| Err::<(), _>("error 1"));
        clock.set(100);
        let _ = circuit.call(|| Err::<(), _>("error 2"));
        assert_eq!(circuit.failure_count(), 2);

        clock.set(2000);
        let _ = circuit.call(|| Ok::<_, &str>("ok"));

        assert_eq!(circuit.failure_count(), 0);
        assert!(circuit.is_closed());
    }

    #[test]
    fn test_callbacks_receive_transitions() {
        use std::sync::Mutex;

        let clock = Arc::new(ManualClock::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let (open_log, half_open_log, close_log) =
            (events.clone(), events.clone(), events.clone());
        let failure_counts = Arc::new(Mutex::new(Vec::new()));
        let failure_log = failure_counts.clone();

        let circuit = CircuitBreaker::builder("test")
            .failure_threshold(2)
            .rolling_window_ms(1000)
            .open_duration_ms(2000)
            .clock(clock.clone())
            .on_open(move |t| open_log.lock().unwrap().push((t.from, t.to)))
            .on_half_open(move |t| half_open_log.lock().unwrap().push((t.from, t.to)))
            .on_close(move |t| close_log.lock().unwrap().push((t.from, t.to)))
            .on_failure(move |f| failure_log.lock().unwrap().push(f.failures))
            .build()
            .unwrap();

        let _ = circuit.call(|| Err::<(), _>("error 1"));
        let _ = circuit.call(|| Err::<(), _>("error 2"));
        clock.set(2000);
        let _ = circuit.call(|| Ok::<_, &str>("recovered"));

        assert_eq!(*failure_counts.lock().unwrap(), vec![1, 2]);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[test]
    fn test_state_machine_closed_to_open_transition() {
        let clock = Arc::new(ManualClock::new());
        let ctx = context_with(clock, 3);
        let mut circuit = DynamicLifecycle::new(ctx.clone());

        // Initially closed - trip should fail guard
        let result = circuit.handle(LifecycleEvent::Trip);
        assert!(result.is_err(), "Should fail guard when below threshold");

        ctx.failures.record(0);
        ctx.failures.record(10);
        ctx.failures.record(20);

        circuit
            .handle(LifecycleEvent::Trip)
            .expect("Should open after reaching threshold");

        assert_eq!(circuit.current_state(), "Open");
    }

    #[test]
    fn test_state_machine_open_to_half_open_transition() {
        let clock = Arc::new(ManualClock::new());
        let ctx = context_with(clock.clone(), 1);
        ctx.failures.record(0);

        let mut circuit = DynamicLifecycle::new(ctx.clone());
        circuit.handle(LifecycleEvent::Trip).expect("Should open");
        if let Some(data) = circuit.open_data_mut() {
            data.open_until = 2000;
        }

        clock.set(1999);
        let result = circuit.handle(LifecycleEvent::AttemptReset);
        assert!(result.is_err(), "Should fail guard before cooldown ends");

        clock.set(2000);
        circuit
            .handle(LifecycleEvent::AttemptReset)
            .expect("Should reset after cooldown");

        assert_eq!(circuit.current_state(), "HalfOpen");
        let data = circuit.half_open_data().expect("Should have HalfOpen data");
        assert!(!data.probe_succeeded);
    }

    #[test]
    fn test_state_machine_half_open_close_guard() {
        let clock = Arc::new(ManualClock::new());
        let ctx = context_with(clock.clone(), 1);
        ctx.failures.record(0);

        let mut circuit = DynamicLifecycle::new(ctx.clone());
        circuit.handle(LifecycleEvent::Trip).expect("Should open");
        clock.set(1);
        circuit
            .handle(LifecycleEvent::AttemptReset)
            .expect("Should reset with zero cooldown data");

        let result = circuit.handle(LifecycleEvent::Close);
        assert!(result.is_err(), "Should fail guard without a successful probe");

        if let Some(data) = circuit.half_open_data_mut() {
            data.probe_succeeded = true;
        }
        circuit.handle(LifecycleEvent::Close).expect("Should close");
        assert_eq!(circuit.current_state(), "Closed");
    }

    #[test]
    fn test_jitter_shortens_cooldown_within_bounds() {
        let clock = Arc::new(ManualClock::new());
        let circuit = CircuitBreaker::builder("jitter_test")
            .failure_threshold(1)
            .open_duration_ms(1000)
            .jitter_factor(0.25)
            .clock(clock)
            .build()
            .unwrap();

        for _ in 0..20 {
            let cooldown = circuit.cooldown_millis();
            assert!(
                (740..=1000).contains(&cooldown),
                "Jittered cooldown {} should be within 740..=1000",
                cooldown
            );
        }
    }

    #[test]
    fn test_zero_jitter_produces_constant_cooldown() {
        let (_clock, circuit) = manual_circuit(1);

        for _ in 0..10 {
            assert_eq!(circuit.cooldown_millis(), 2000);
        }
    }

    #[test]
    fn test_state_from_u8() {
        assert_eq!(CircuitState::from(0), CircuitState::Closed);
        assert_eq!(CircuitState::from(1), CircuitState::Open);
        assert_eq!(CircuitState::from(2), CircuitState::HalfOpen);
        assert_eq!(CircuitState::HalfOpen.to_string(), "HalfOpen");
    }
}
