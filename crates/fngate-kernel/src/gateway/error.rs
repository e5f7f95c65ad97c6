//! Gateway error types for `fngate-kernel`.
//!
//! [`GatewayError`] covers every failure that can be detected at *definition
//! time*: malformed function identifiers, duplicate registrations and invalid
//! policy values, all before any network I/O occurs. Runtime failures
//! (transport errors, timeouts, …) belong in the runtime crates.

use thiserror::Error;

/// Definition-time error type for the gateway kernel contract.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    // ── Targets ──────────────────────────────────────────────────────────────
    /// The identifier does not start with the recognized target prefix.
    #[error("'{0}' is not a function identifier (expected prefix '{1}')")]
    InvalidTarget(String, String),

    /// The configured target prefix is empty, which would match everything.
    #[error("target prefix cannot be empty")]
    EmptyTargetPrefix,

    // ── Fallbacks ────────────────────────────────────────────────────────────
    /// A fallback provider already claims this route.
    #[error("a fallback provider for route '{0}' is already registered")]
    DuplicateFallback(String),

    // ── Isolation policy ─────────────────────────────────────────────────────
    /// A policy permits no concurrent calls at all.
    #[error("isolation group '{0}' must allow at least one concurrent call")]
    InvalidConcurrency(String),

    /// A breaker threshold percentage outside 1..=100.
    #[error("error threshold percentage must be within 1..=100, got {0}")]
    InvalidErrorThreshold(u32),
}
