//! Circuit Breaker
//!
//! One [`CircuitBreaker`] per isolation group, driven by the
//! [`ResilientExecutor`](crate::ResilientExecutor).
//!
//! ```text
//!     +---------+  error % over window   +--------+
//!     | CLOSED  | ---------------------> |  OPEN  |
//!     +---------+                        +--------+
//!          ^                              |     ^
//!          | trial success   sleep window |     | trial failure
//!          |                              v     |
//!          |                        +-------------+
//!          +----------------------- |  HALF-OPEN  |
//!                                   +-------------+
//! ```
//!
//! Failures are transport errors, timeouts and bulkhead rejections. Calls
//! short-circuited by an open circuit are counted separately and never feed
//! the window.

pub mod config;
pub mod metrics;
pub mod state;
mod window;

pub use config::{CircuitBreakerConfig, CircuitBreakerSettings};
pub use metrics::{CircuitBreakerMetrics, CircuitBreakerMetricsSnapshot, StateTransition};
pub use state::{CircuitBreaker, FailureKind, State};
pub use window::WindowCounts;
