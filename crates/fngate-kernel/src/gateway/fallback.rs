//! Fallback provider contract.
//!
//! A [`FallbackProvider`] claims exactly one route (function identifier) and
//! produces a substitute response when the normal invocation is unavailable.

use super::types::GatewayResponse;
use async_trait::async_trait;
use std::fmt;

/// Why the fallback is being consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    /// The call exceeded its wall-clock timeout.
    Timeout,
    /// No concurrency permit was available.
    Rejected,
    /// The circuit breaker short-circuited the call.
    CircuitOpen,
    /// The call failed; carries the rendered error.
    Failure(String),
}

impl fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackCause::Timeout => write!(f, "timeout"),
            FallbackCause::Rejected => write!(f, "rejected"),
            FallbackCause::CircuitOpen => write!(f, "circuit open"),
            FallbackCause::Failure(msg) => write!(f, "failure: {msg}"),
        }
    }
}

/// Substitute-response capability for one route.
#[async_trait]
pub trait FallbackProvider: Send + Sync {
    /// The route (function identifier) this provider claims.
    fn route(&self) -> &str;

    /// Produce the substitute response.
    async fn fallback_response(&self, cause: &FallbackCause) -> GatewayResponse;
}
