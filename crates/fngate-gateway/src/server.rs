//! Axum-based HTTP gateway server.
//!
//! [`GatewayServer`] wires together the route table, filter pipeline and
//! [`FunctionRouter`] into a running axum service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness check, always `200 OK`. |
//! | `GET`  | `/v1/isolation-groups` | Breaker state and metrics per isolation group. |
//! | `ANY`  | *anything else* | Resolved through the route table and invoked. |

use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use fngate_kernel::gateway::{
    FilterAction, GatewayContext, GatewayRequest, GatewayResponse, HttpMethod,
    InvocationTransport,
};
use fngate_resilience::{FallbackRegistry, ResilientExecutor};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client_context::DefaultClientContextFactory;
use crate::error::{RoutingError, ServerError};
use crate::filter::FilterPipeline;
use crate::invocation::InvocationRequestFactory;
use crate::payload::DefaultPayloadExtractor;
use crate::routing::FunctionRouter;
use crate::settings::GatewaySettings;
use crate::transport::HttpInvocationTransport;

// ─────────────────────────────────────────────────────────────────────────────
// Shared application state
// ─────────────────────────────────────────────────────────────────────────────

/// Shared state injected into every axum handler via [`State`] extractor.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<GatewaySettings>,
    router: Arc<FunctionRouter>,
    pipeline: Arc<FilterPipeline>,
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayServer
// ─────────────────────────────────────────────────────────────────────────────

pub struct GatewayServer {
    settings: GatewaySettings,
    fallbacks: FallbackRegistry,
}

impl GatewayServer {
    pub fn new(settings: GatewaySettings) -> Self {
        Self {
            settings,
            fallbacks: FallbackRegistry::new(),
        }
    }

    /// Serve fallback responses from `fallbacks`.
    pub fn with_fallbacks(mut self, fallbacks: FallbackRegistry) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Build the axum [`Router`] on top of `transport`.
    pub fn build_app(&self, transport: Arc<dyn InvocationTransport>) -> Result<Router, ServerError> {
        self.settings.validate()?;

        let factory = InvocationRequestFactory::new(
            self.settings.target_pattern()?,
            Arc::new(DefaultPayloadExtractor::new()),
            Arc::new(DefaultClientContextFactory::with_profiles(
                self.settings.client_context.active_profiles.clone(),
                self.settings.client_context.locale.clone(),
            )),
            transport,
        );
        let executor =
            ResilientExecutor::new(self.settings.executor_settings(), self.fallbacks.clone())?;

        let state = AppState {
            settings: Arc::new(self.settings.clone()),
            router: Arc::new(FunctionRouter::new(factory, Arc::new(executor))),
            pipeline: Arc::new(FilterPipeline::standard()),
        };

        Ok(Router::new()
            .route("/health", get(health_handler))
            .route("/v1/isolation-groups", get(isolation_groups_handler))
            .fallback(dispatch_handler)
            .with_state(state))
    }

    /// Bind and serve until the process exits, invoking functions over HTTP.
    pub async fn start(self) -> Result<(), ServerError> {
        let transport = HttpInvocationTransport::new(&self.settings.transport)?;
        let app = self.build_app(Arc::new(transport))?;
        let addr = self.settings.server.bind_address();
        info!(
            addr = %addr,
            endpoint = %self.settings.transport.endpoint,
            routes = self.settings.routes.len(),
            "fngate starting"
        );
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// `GET /health`: liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "fngate" }))
}

/// `GET /v1/isolation-groups`: one snapshot per isolation group.
async fn isolation_groups_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "groups": state.router.executor().snapshots() }))
}

/// Every other path: route table → filters → function router.
async fn dispatch_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(http_method) = axum_method_to_kernel(&method) else {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({ "error": format!("method '{method}' is not supported") })),
        )
            .into_response();
    };

    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let mut request = GatewayRequest::new(Uuid::new_v4().to_string(), http_method, target);
    for (name, value) in &headers {
        if let Ok(v) = value.to_str() {
            request = request.with_header(name.as_str(), v);
        }
    }
    request = request.with_body(body);

    let mut ctx = GatewayContext::new(request);
    ctx.route_key = state.settings.route_key(&ctx.request.path).map(str::to_string);

    match state.pipeline.run_request(&mut ctx).await {
        Ok(FilterAction::Reject(status, msg)) => {
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (code, Json(json!({ "error": msg }))).into_response();
        }
        Ok(_) => {}
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    }

    let route_key = ctx.route_key.clone().unwrap_or_default();
    let mut response = match state.router.run(&mut ctx).await {
        Ok(true) => match ctx.response.take() {
            Some(response) => response,
            None => error_response(&route_key, RoutingError::invoke_error("no response written")),
        },
        Ok(false) => not_found(&ctx),
        Err(err) => error_response(&route_key, err),
    };

    if let Err(err) = state.pipeline.run_response(&ctx, &mut response).await {
        warn!(
            request_id = %ctx.request.id,
            error = %err,
            "response filter pipeline error (response still returned)"
        );
    }

    build_axum_response(response)
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Convert an axum [`Method`] to the kernel [`HttpMethod`].
fn axum_method_to_kernel(m: &Method) -> Option<HttpMethod> {
    HttpMethod::from_str_ci(m.as_str())
}

fn not_found(ctx: &GatewayContext) -> GatewayResponse {
    let message = match &ctx.route_key {
        Some(key) => format!("route key '{key}' does not name a function"),
        None => format!("no route matched '{}'", ctx.request.path),
    };
    json_response(404, "", &json!({ "error": { "code": "RouteNotFound", "message": message } }))
}

fn error_response(function_id: &str, err: RoutingError) -> GatewayResponse {
    json_response(
        err.status,
        function_id,
        &json!({ "error": { "code": err.code.as_str(), "message": err.message } }),
    )
}

fn json_response(status: u16, function_id: &str, body: &serde_json::Value) -> GatewayResponse {
    GatewayResponse::new(status, function_id)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
}

/// Headers describing the upstream connection rather than the content.
const HOP_BY_HOP: [&str; 4] = ["content-length", "transfer-encoding", "connection", "keep-alive"];

fn build_axum_response(resp: GatewayResponse) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (k, v) in &resp.headers {
        if HOP_BY_HOP.contains(&k.as_str()) {
            continue;
        }
        builder = builder.header(k, v);
    }
    builder.body(Body::from(resp.body)).unwrap_or_else(|e| {
        warn!(error = %e, "dropping invalid response headers");
        status.into_response()
    })
}
