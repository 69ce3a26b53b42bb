//! Tripwire - thread-safe circuit breaker with single-probe recovery
//!
//! This crate provides a circuit breaker that can be shared between threads:
//! - Rolling window of failure timestamps, pruned from the oldest end
//! - State machine for the breaker lifecycle (Closed → Open → HalfOpen)
//! - Exactly one recovery probe at a time while half-open
//! - Monotonic, injectable millisecond clock
//! - Fallbacks for denied or failed calls
//!
//! # Example
//!
//! ```rust
//! use tripwire::CircuitBreaker;
//! use std::time::Duration;
//!
//! let circuit = CircuitBreaker::builder("payment_api")
//!     .failure_threshold(3)
//!     .rolling_window(Duration::from_secs(1))
//!     .open_duration(Duration::from_secs(2))
//!     .on_open(|t| println!("Circuit {} opened until {:?}", t.circuit, t.open_until))
//!     .build()
//!     .expect("valid configuration");
//!
//! // Failures and open-circuit denials both end up in the fallback
//! let quote = circuit.execute(
//!     || Err::<String, _>("remote failure"),
//!     || "cached-value".to_string(),
//! );
//! assert_eq!(quote, "cached-value");
//!
//! // Check circuit state
//! if circuit.is_open() {
//!     println!("Circuit is open, skipping call");
//! }
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod clock;
pub mod config;
pub mod errors;
pub mod probe;
pub mod window;

pub use builder::CircuitBuilder;
pub use callbacks::{Callbacks, FailureRecorded, Transition};
pub use circuit::{CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::Config;
pub use errors::{CircuitError, ConfigError};
pub use probe::{ProbeGate, ProbePermit};
pub use window::FailureLog;
