//! Function routing stage.
//!
//! [`FunctionRouter`] takes over requests whose route key is a function
//! identifier: it builds the invocation, runs it through the
//! [`ResilientExecutor`] and writes the response into the context so that no
//! default routing runs afterwards.

use std::sync::Arc;

use fngate_kernel::gateway::{GatewayContext, GatewayRequest, GatewayResponse, TargetPattern};
use fngate_resilience::ResilientExecutor;
use tracing::{debug, error, instrument};

use crate::error::{GatewayResult, RoutingError};
use crate::invocation::InvocationRequestFactory;

pub struct FunctionRouter {
    factory: InvocationRequestFactory,
    executor: Arc<ResilientExecutor>,
}

impl FunctionRouter {
    pub fn new(factory: InvocationRequestFactory, executor: Arc<ResilientExecutor>) -> Self {
        Self { factory, executor }
    }

    pub fn pattern(&self) -> &TargetPattern {
        self.factory.pattern()
    }

    pub fn executor(&self) -> &Arc<ResilientExecutor> {
        &self.executor
    }

    /// `true` when `route_key` names a function.
    pub fn should_handle(&self, route_key: &str) -> bool {
        self.pattern().matches(route_key)
    }

    /// Invoke the function named by `route_key` for `request`.
    ///
    /// A 4xx/5xx response (from the function or a fallback) is logged and
    /// turned into a `FunctionError` carrying the original status.
    #[instrument(skip(self, request), fields(request_id = %request.id))]
    pub async fn handle(
        &self,
        route_key: &str,
        request: &GatewayRequest,
    ) -> GatewayResult<GatewayResponse> {
        let function_request = self.factory.create_request(route_key, request)?;
        debug!(function = %function_request.target(), "dispatching function invocation");

        let response = self
            .executor
            .execute(route_key, async move {
                function_request.execute().await.map(GatewayResponse::from)
            })
            .await?;

        if response.is_error() {
            error!(
                function = %route_key,
                status = response.status,
                body = %String::from_utf8_lossy(&response.body),
                "function returned an error response"
            );
            return Err(RoutingError::function_error(
                response.status,
                format!("function '{route_key}' failed: {}", response.status_text),
            ));
        }

        Ok(response)
    }

    /// Routing-stage entry point.
    ///
    /// Returns `Ok(false)` when the context is not for this router. On
    /// success the response is stored, the context is marked handled and
    /// the route key is cleared.
    pub async fn run(&self, ctx: &mut GatewayContext) -> GatewayResult<bool> {
        let Some(route_key) = ctx.route_key.clone() else {
            return Ok(false);
        };
        if ctx.handled || !self.should_handle(&route_key) {
            return Ok(false);
        }

        let response = self.handle(&route_key, &ctx.request).await?;
        ctx.response = Some(response);
        ctx.handled = true;
        ctx.route_key = None;
        Ok(true)
    }
}

impl std::fmt::Debug for FunctionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRouter")
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}
