// Runtime metrics module
//
// Process-level counters for the mutation coordinator. These are not
// persisted; the usage statistics that survive restarts live in the state
// document.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process metrics
///
/// Uses atomic operations for thread-safe tracking without locks.
#[derive(Debug)]
pub struct Metrics {
    /// Mutations applied and persisted
    pub mutations: AtomicU64,

    /// Mutations that failed to load or persist the document
    pub mutation_failures: AtomicU64,

    /// Change events delivered to at least one subscriber
    pub state_broadcasts: AtomicU64,

    /// Change events dropped because nobody was subscribed
    pub state_broadcasts_unobserved: AtomicU64,

    /// Process start time
    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            mutations: AtomicU64::new(0),
            mutation_failures: AtomicU64::new(0),
            state_broadcasts: AtomicU64::new(0),
            state_broadcasts_unobserved: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mutation_failure(&self) {
        self.mutation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_broadcast(&self) {
        self.state_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unobserved_broadcast(&self) {
        self.state_broadcasts_unobserved.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Runtime Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Mutations: {} applied, {} failed",
            self.mutations.load(Ordering::Relaxed),
            self.mutation_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "State broadcasts: {} delivered, {} unobserved",
            self.state_broadcasts.load(Ordering::Relaxed),
            self.state_broadcasts_unobserved.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
