//! `fngate-resilience`: resilient execution of function invocations.
//!
//! [`ResilientExecutor`] wraps a single invocation with
//!
//! - a circuit breaker per isolation group ([`circuit_breaker`]),
//! - a concurrency bulkhead per isolation group, either a counting semaphore
//!   or a dedicated worker-thread pool ([`isolation`]),
//! - a hard wall-clock timeout,
//! - fallback substitution from a [`FallbackRegistry`].
//!
//! An isolation group is keyed by the function identifier. Groups are created
//! lazily on first use and live as long as the executor.
//!
//! # Timeouts abandon, they do not interrupt
//!
//! When a call exceeds its timeout the caller stops waiting and moves on to
//! the fallback (or the timeout error). The invocation itself keeps running
//! on its worker until the transport returns, holding its concurrency permit
//! the whole time, and may still have side effects on the remote function.

pub mod circuit_breaker;
pub mod executor;
pub mod fallback;
pub mod isolation;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitBreakerMetricsSnapshot,
    CircuitBreakerSettings, State,
};
pub use executor::{ExecutionError, ExecutorSettings, GroupSnapshot, ResilientExecutor};
pub use fallback::FallbackRegistry;
pub use isolation::{
    Bulkhead, BulkheadPermit, IsolationPolicy, IsolationPolicyOverride, IsolationSettings,
    IsolationStrategy,
};
