//! Filter module.

mod logger;
mod request_id;

pub use logger::LoggingFilter;
pub use request_id::RequestIdFilter;

use fngate_kernel::gateway::{FilterAction, FilterError, GatewayContext, GatewayFilter, GatewayResponse};
use std::sync::Arc;

/// Ordered list of boxed filters executed as a pipeline.
///
/// Filters are sorted by [`FilterOrder`](fngate_kernel::gateway::FilterOrder) in
/// ascending order (lowest value runs first on request path).
#[derive(Clone)]
pub struct FilterPipeline {
    filters: Vec<Arc<dyn GatewayFilter>>,
}

impl FilterPipeline {
    /// Build a pipeline from a list of filters, sorted by their declared order.
    pub fn new(mut filters: Vec<Arc<dyn GatewayFilter>>) -> Self {
        filters.sort_by_key(|f| f.order());
        Self { filters }
    }

    /// Request id injection followed by access logging.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(RequestIdFilter::new()),
            Arc::new(LoggingFilter::new()),
        ])
    }

    /// Run all filters' `on_request` hooks in ascending order.
    ///
    /// Short-circuits on the first action other than `Continue`.
    pub async fn run_request(&self, ctx: &mut GatewayContext) -> Result<FilterAction, FilterError> {
        for filter in &self.filters {
            match filter.on_request(ctx).await? {
                FilterAction::Continue => {}
                other => return Ok(other),
            }
        }
        Ok(FilterAction::Continue)
    }

    /// Run all filters' `on_response` hooks in descending order
    /// (outermost filter last, so it can finalize latency, etc.).
    pub async fn run_response(
        &self,
        ctx: &GatewayContext,
        resp: &mut GatewayResponse,
    ) -> Result<(), FilterError> {
        for filter in self.filters.iter().rev() {
            filter.on_response(ctx, resp).await?;
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }
}
