use std::sync::Arc;

use async_trait::async_trait;
use fngate_kernel::gateway::{FallbackCause, FallbackProvider, GatewayResponse};
use parking_lot::Mutex;

/// A fallback that always answers with the same response.
///
/// Every cause it was consulted for is recorded.
#[derive(Clone)]
pub struct StaticFallback {
    route: String,
    status: u16,
    body: String,
    /// Track the causes this fallback was consulted for
    pub causes: Arc<Mutex<Vec<FallbackCause>>>,
}

impl StaticFallback {
    pub fn new(route: &str, status: u16, body: &str) -> Self {
        Self {
            route: route.to_string(),
            status,
            body: body.to_string(),
            causes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn causes(&self) -> Vec<FallbackCause> {
        self.causes.lock().clone()
    }
}

#[async_trait]
impl FallbackProvider for StaticFallback {
    fn route(&self) -> &str {
        &self.route
    }

    async fn fallback_response(&self, cause: &FallbackCause) -> GatewayResponse {
        self.causes.lock().push(cause.clone());
        GatewayResponse::new(self.status, self.route.as_str())
            .with_header("content-type", "application/json")
            .with_header("x-fallback-cause", cause.to_string())
            .with_body(self.body.clone())
    }
}
