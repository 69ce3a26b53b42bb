//! Basic circuit breaker usage example
//!
//! Run with `RUST_LOG=debug cargo run --example basic` to see the breaker's
//! own structured events.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tripwire::CircuitBreaker;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Circuit Breaker Basic Example ===\n");

    let circuit = CircuitBreaker::builder("remote_api")
        .failure_threshold(3)
        .rolling_window(Duration::from_millis(1500))
        .open_duration(Duration::from_millis(1000))
        .on_open(|t| println!("🔴 Circuit '{}' opened until {:?}", t.circuit, t.open_until))
        .on_half_open(|t| println!("🟡 Circuit '{}' half-open, testing...", t.circuit))
        .on_close(|t| println!("🟢 Circuit '{}' closed!", t.circuit))
        .build()
        .expect("valid circuit configuration");

    println!("Initial state: {}\n", circuit.state_name());

    // Simulated unreliable client: three out of every four calls fail
    let counter = AtomicUsize::new(0);
    let unreliable_call = || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if n % 4 != 0 {
            Err(format!("remote failure {}", n))
        } else {
            Ok(format!("remote-success-{}", n))
        }
    };

    for i in 0..30 {
        let result = circuit.execute(unreliable_call, || "cached-value".to_string());
        println!("call {} -> {} (state={})", i, result, circuit.state_name());
        std::thread::sleep(Duration::from_millis(250));
    }
}
