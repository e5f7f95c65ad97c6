//! Gateway kernel contract.
//!
//! Trait interfaces and plain data types for the function gateway. Concrete
//! implementations live in `fngate-resilience` (execution isolation) and
//! `fngate-gateway` (payload extraction, invocation, HTTP serving).
//!
//! # Architecture mapping
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              fngate-kernel  (this module)                   │
//! │  InvocationTransport trait   FallbackProvider trait         │
//! │  GatewayFilter trait         FunctionTarget / TargetPattern │
//! │  GatewayRequest/Response/Context   GatewayError             │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │  depends on
//! ┌──────────────────────────▼──────────────────────────────────┐
//! │  fngate-resilience: ResilientExecutor, CircuitBreaker,      │
//! │                     Bulkhead, FallbackRegistry              │
//! │  fngate-gateway:    PayloadExtractor, ClientContext,        │
//! │                     InvocationRequestFactory, FunctionRouter│
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod fallback;
pub mod filter;
pub mod target;
pub mod transport;
pub mod types;

// ── Flat re-exports ────────────────────────────────────────────────────────

pub use error::GatewayError;
pub use fallback::{FallbackCause, FallbackProvider};
pub use filter::{FilterAction, FilterError, FilterOrder, GatewayFilter};
pub use target::{DEFAULT_TARGET_PREFIX, FunctionTarget, TargetPattern};
pub use transport::{InvocationTransport, InvokeRequest, InvokeResult, TransportError};
pub use types::{GatewayContext, GatewayRequest, GatewayResponse, HttpMethod};
