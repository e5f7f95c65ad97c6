//! `fngate-kernel`: contracts for the fngate function invocation gateway.
//!
//! Nothing in this crate performs I/O. It defines the vocabulary shared by the
//! runtime crates:
//!
//! | Contract | Implemented in |
//! |----------|----------------|
//! | [`gateway::InvocationTransport`] | `fngate-gateway::transport` |
//! | [`gateway::FallbackProvider`] | user code, `fngate-testing` |
//! | [`gateway::GatewayFilter`] | `fngate-gateway::filter` |
//!
//! plus the request/response/context types and the function-target
//! identifier rules.

pub mod gateway;

// Config loader (multi-format, env substitution)
#[cfg(feature = "config")]
pub mod config;
