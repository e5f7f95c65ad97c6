//! Request id propagation.
//!
//! Makes sure every request carries an `x-request-id` header (reusing the
//! caller's when present) and echoes it on the response.

use async_trait::async_trait;
use fngate_kernel::gateway::{
    FilterAction, FilterError, FilterOrder, GatewayContext, GatewayFilter, GatewayResponse,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Default)]
pub struct RequestIdFilter;

impl RequestIdFilter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GatewayFilter for RequestIdFilter {
    fn name(&self) -> &str {
        "request-id"
    }

    fn order(&self) -> FilterOrder {
        FilterOrder::PRE_ROUTE
    }

    async fn on_request(&self, ctx: &mut GatewayContext) -> Result<FilterAction, FilterError> {
        let caller_id = ctx
            .request
            .headers
            .get(REQUEST_ID_HEADER)
            .filter(|id| !id.trim().is_empty())
            .cloned();
        match caller_id {
            Some(id) => ctx.request.id = id,
            None => {
                ctx.request
                    .headers
                    .insert(REQUEST_ID_HEADER.to_string(), ctx.request.id.clone());
            }
        }
        Ok(FilterAction::Continue)
    }

    async fn on_response(
        &self,
        ctx: &GatewayContext,
        resp: &mut GatewayResponse,
    ) -> Result<(), FilterError> {
        resp.headers
            .insert(REQUEST_ID_HEADER.to_string(), ctx.request.id.clone());
        Ok(())
    }
}
