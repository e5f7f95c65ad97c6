//! Gateway filter trait and ordering types.
//!
//! Filters wrap the routing stage. They are sorted by their declared
//! [`FilterOrder`] and executed in ascending order on the request path and in
//! descending order on the response path.
//!
//! ```text
//! Request  ──► PreRoute ──► Logging ──► (function routing stage)
//! Response ◄── PreRoute ◄── Logging ◄──
//! ```

use super::types::{GatewayContext, GatewayResponse};
use async_trait::async_trait;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Filter ordering
// ─────────────────────────────────────────────────────────────────────────────

/// Numeric ordering slot for a filter in the chain.
///
/// Filters with equal order values are executed in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FilterOrder(pub u32);

impl FilterOrder {
    /// Executes before anything else (e.g. request id injection).
    pub const PRE_ROUTE: FilterOrder = FilterOrder(0);
    /// Request / response transformation slot.
    pub const TRANSFORM: FilterOrder = FilterOrder(300);
    /// Audit logging slot.
    pub const LOGGING: FilterOrder = FilterOrder(400);
}

// ─────────────────────────────────────────────────────────────────────────────
// Filter action
// ─────────────────────────────────────────────────────────────────────────────

/// Instruction returned by [`GatewayFilter::on_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FilterAction {
    /// Pass the request to the next filter or the routing stage.
    Continue,
    /// Short-circuit the chain with the given HTTP status and message.
    Reject(u16, String),
}

/// Failure raised by a filter hook.
#[derive(Debug, Error)]
#[error("filter '{filter}' failed: {message}")]
pub struct FilterError {
    pub filter: String,
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayFilter trait
// ─────────────────────────────────────────────────────────────────────────────

/// Kernel contract for a single filter in the gateway pipeline.
#[async_trait]
pub trait GatewayFilter: Send + Sync {
    /// Stable, human-readable identifier for this filter (used in logs).
    fn name(&self) -> &str;

    /// Position in the filter chain.
    fn order(&self) -> FilterOrder;

    /// Called with the inbound request before the routing stage.
    async fn on_request(&self, ctx: &mut GatewayContext) -> Result<FilterAction, FilterError>;

    /// Called with the response before it is returned to the caller.
    async fn on_response(
        &self,
        ctx: &GatewayContext,
        resp: &mut GatewayResponse,
    ) -> Result<(), FilterError>;
}
