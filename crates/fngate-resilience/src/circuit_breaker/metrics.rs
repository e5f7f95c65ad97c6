//! Circuit Breaker Metrics
//!
//! Lock-free counters for call outcomes and state transitions of one
//! isolation group.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::state::State;

/// How many transitions are retained for inspection.
const TRANSITION_HISTORY: usize = 32;

/// State transition event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Previous state
    pub from_state: State,
    /// New state
    pub to_state: State,
    /// Timestamp of transition (milliseconds since Unix epoch)
    pub timestamp_ms: u64,
}

impl StateTransition {
    /// Create a new state transition stamped with the current time
    pub fn new(from_state: State, to_state: State) -> Self {
        Self {
            from_state,
            to_state,
            timestamp_ms: now_ms(),
        }
    }
}

/// Circuit breaker metrics
#[derive(Debug, Default)]
pub struct CircuitBreakerMetrics {
    /// Calls that returned a result
    total_successes: AtomicU64,
    /// Calls that failed (transport error, timeout or rejection)
    total_failures: AtomicU64,
    /// Subset of failures caused by the timeout
    total_timeouts: AtomicU64,
    /// Subset of failures caused by a full bulkhead
    total_rejected: AtomicU64,
    /// Calls refused because the circuit was open
    total_short_circuited: AtomicU64,
    /// Responses served by a fallback provider
    total_fallbacks: AtomicU64,
    /// Number of state transitions
    total_transitions: AtomicU64,
    /// Timestamp (ms since epoch) of the last transition to open, 0 if never
    last_opened_ms: AtomicU64,
    transitions: Mutex<Vec<StateTransition>>,
}

impl CircuitBreakerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.total_timeouts.fetch_add(1, Ordering::Relaxed);
        self.record_failure();
    }

    pub fn record_rejected(&self) {
        self.total_rejected.fetch_add(1, Ordering::Relaxed);
        self.record_failure();
    }

    pub fn record_short_circuited(&self) {
        self.total_short_circuited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.total_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a state transition
    pub fn record_transition(&self, transition: StateTransition) {
        self.total_transitions.fetch_add(1, Ordering::Relaxed);
        if transition.to_state == State::Open {
            self.last_opened_ms
                .store(transition.timestamp_ms, Ordering::Relaxed);
        }

        let mut transitions = self.transitions.lock();
        transitions.push(transition);
        if transitions.len() > TRANSITION_HISTORY {
            transitions.remove(0);
        }
    }

    pub fn total_successes(&self) -> u64 {
        self.total_successes.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }

    pub fn total_timeouts(&self) -> u64 {
        self.total_timeouts.load(Ordering::Relaxed)
    }

    pub fn total_rejected(&self) -> u64 {
        self.total_rejected.load(Ordering::Relaxed)
    }

    pub fn total_short_circuited(&self) -> u64 {
        self.total_short_circuited.load(Ordering::Relaxed)
    }

    pub fn total_fallbacks(&self) -> u64 {
        self.total_fallbacks.load(Ordering::Relaxed)
    }

    pub fn total_transitions(&self) -> u64 {
        self.total_transitions.load(Ordering::Relaxed)
    }

    /// Most recent transitions, oldest first.
    pub fn transitions(&self) -> Vec<StateTransition> {
        self.transitions.lock().clone()
    }

    /// Take a snapshot of current metrics
    pub fn snapshot(&self) -> CircuitBreakerMetricsSnapshot {
        let successes = self.total_successes();
        let failures = self.total_failures();
        let total = successes + failures;
        CircuitBreakerMetricsSnapshot {
            total_successes: successes,
            total_failures: failures,
            total_timeouts: self.total_timeouts(),
            total_rejected: self.total_rejected(),
            total_short_circuited: self.total_short_circuited(),
            total_fallbacks: self.total_fallbacks(),
            total_transitions: self.total_transitions(),
            failure_rate: if total == 0 {
                0.0
            } else {
                failures as f64 / total as f64 * 100.0
            },
            last_opened_ms: self.last_opened_ms.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics for monitoring/display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetricsSnapshot {
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_timeouts: u64,
    pub total_rejected: u64,
    pub total_short_circuited: u64,
    pub total_fallbacks: u64,
    pub total_transitions: u64,
    /// Lifetime failure percentage
    pub failure_rate: f64,
    /// Last opened timestamp (ms since epoch, 0 if never)
    pub last_opened_ms: u64,
}

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    u64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis(),
    )
    .unwrap_or(u64::MAX)
}
