//! Circuit Breaker State Machine
//!
//! Three states:
//! - Closed: calls pass through, outcomes feed the rolling window
//! - Open: calls are short-circuited until the sleep window elapses
//! - Half-Open: a bounded number of trial calls probe recovery
//!
//! All state lives behind one mutex; every operation is a short critical
//! section with no `.await` inside, so the breaker is safe to share between
//! tasks and worker threads.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::config::CircuitBreakerConfig;
use super::metrics::{CircuitBreakerMetrics, StateTransition};
use super::window::{RollingWindow, WindowCounts};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum State {
    /// Normal operation - calls are allowed
    Closed,
    /// Circuit is open - calls are short-circuited
    Open,
    /// Testing recovery - limited trial calls allowed
    HalfOpen,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Closed => write!(f, "closed"),
            State::Open => write!(f, "open"),
            State::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Kind of failed outcome being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The call itself returned an error
    Error,
    /// The call exceeded its timeout
    Timeout,
    /// No concurrency permit was available
    Rejected,
}

#[derive(Debug)]
struct Inner {
    state: State,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    window: RollingWindow,
}

/// Circuit breaker for one isolation group
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    metrics: Arc<CircuitBreakerMetrics>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let window = RollingWindow::new(config.rolling_window(), config.window_buckets);
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                opened_at: None,
                half_open_in_flight: 0,
                window,
            }),
            metrics: Arc::new(CircuitBreakerMetrics::new()),
        }
    }

    /// Current state. An open circuit whose sleep window has elapsed is
    /// reported (and moved) as half-open.
    pub fn state(&self) -> State {
        let mut inner = self.inner.lock();
        self.promote_if_sleep_elapsed(&mut inner);
        inner.state
    }

    /// Admit or refuse one call.
    ///
    /// Admission in the half-open state reserves one trial slot, which is
    /// released by the matching `record_*` call.
    pub fn allow_request(&self) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut inner = self.inner.lock();
        self.promote_if_sleep_elapsed(&mut inner);

        let allowed = match inner.state {
            State::Closed => true,
            State::Open => false,
            State::HalfOpen => {
                if inner.half_open_in_flight < self.config.half_open_max_requests.max(1) {
                    inner.half_open_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        };

        if !allowed {
            self.metrics.record_short_circuited();
        }
        allowed
    }

    /// Record a successful call
    pub fn record_success(&self) {
        self.metrics.record_success();
        if !self.config.enabled {
            return;
        }

        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => inner.window.record(Instant::now(), true),
            State::HalfOpen => self.transition(&mut inner, State::Closed),
            // A straggler admitted before the circuit opened.
            State::Open => {}
        }
    }

    /// Record a failed call
    pub fn record_failure(&self, kind: FailureKind) {
        match kind {
            FailureKind::Error => self.metrics.record_failure(),
            FailureKind::Timeout => self.metrics.record_timeout(),
            FailureKind::Rejected => self.metrics.record_rejected(),
        }
        if !self.config.enabled {
            return;
        }

        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => {
                let now = Instant::now();
                inner.window.record(now, false);
                let counts = inner.window.counts(now);
                if self.should_trip(counts) {
                    warn!(
                        circuit = %self.name,
                        requests = counts.total,
                        error_percentage = counts.error_percentage(),
                        "failure threshold exceeded, opening circuit"
                    );
                    self.transition(&mut inner, State::Open);
                }
            }
            State::HalfOpen => {
                warn!(circuit = %self.name, failure = ?kind, "trial call failed, re-opening circuit");
                self.transition(&mut inner, State::Open);
            }
            State::Open => {}
        }
    }

    /// Failure counts over the live rolling window.
    pub fn window_counts(&self) -> WindowCounts {
        self.inner.lock().window.counts(Instant::now())
    }

    pub fn metrics(&self) -> &Arc<CircuitBreakerMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // =========================================================================
    // Private methods
    // =========================================================================

    fn should_trip(&self, counts: WindowCounts) -> bool {
        counts.total >= u64::from(self.config.request_volume_threshold)
            && counts.error_percentage() >= u64::from(self.config.error_threshold_percentage)
    }

    fn promote_if_sleep_elapsed(&self, inner: &mut Inner) {
        if inner.state == State::Open
            && inner
                .opened_at
                .is_some_and(|at| at.elapsed() >= self.config.sleep_window())
        {
            self.transition(inner, State::HalfOpen);
        }
    }

    fn transition(&self, inner: &mut Inner, to: State) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        inner.half_open_in_flight = 0;
        match to {
            State::Open => inner.opened_at = Some(Instant::now()),
            State::Closed => {
                inner.opened_at = None;
                inner.window.reset();
            }
            State::HalfOpen => {}
        }
        info!(circuit = %self.name, from = %from, to = %to, "circuit state transition");
        self.metrics
            .record_transition(StateTransition::new(from, to));
    }
}
