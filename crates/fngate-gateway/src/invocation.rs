//! Bridges inbound HTTP requests to function invocations and back.
//!
//! [`InvocationRequestFactory::create_request`] validates the target, extracts
//! the payload and encodes the client context. Nothing touches the network
//! until [`FunctionRequest::execute`], which performs exactly one transport
//! call and never retries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use bytes::Bytes;
use fngate_kernel::gateway::{
    FunctionTarget, GatewayError, GatewayRequest, GatewayResponse, InvocationTransport,
    InvokeRequest, InvokeResult, TargetPattern, TransportError,
};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::client_context::{ClientContextError, ClientContextFactory};
use crate::payload::{PayloadError, PayloadExtractor};

/// Header carrying the invocation service's request id on the response.
pub const REQUEST_ID_HEADER: &str = "x-amzn-requestid";

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error(transparent)]
    Target(#[from] GatewayError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    ClientContext(#[from] ClientContextError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Builds [`FunctionRequest`]s from inbound requests.
#[derive(Clone)]
pub struct InvocationRequestFactory {
    pattern: TargetPattern,
    extractor: Arc<dyn PayloadExtractor>,
    context_factory: Arc<dyn ClientContextFactory>,
    transport: Arc<dyn InvocationTransport>,
}

impl InvocationRequestFactory {
    pub fn new(
        pattern: TargetPattern,
        extractor: Arc<dyn PayloadExtractor>,
        context_factory: Arc<dyn ClientContextFactory>,
        transport: Arc<dyn InvocationTransport>,
    ) -> Self {
        Self {
            pattern,
            extractor,
            context_factory,
            transport,
        }
    }

    pub fn pattern(&self) -> &TargetPattern {
        &self.pattern
    }

    /// Build the invocation of `target` for `request`.
    pub fn create_request(
        &self,
        target: &str,
        request: &GatewayRequest,
    ) -> Result<FunctionRequest, InvocationError> {
        let target = self.pattern.parse(target)?;
        let payload = self.extractor.extract_bytes(request)?;
        let client_context = self.context_factory.create(request).encode()?;

        Ok(FunctionRequest {
            invoke: InvokeRequest {
                function_name: target.as_str().to_string(),
                client_context: Some(client_context),
                payload: Some(payload),
                headers: request.headers.clone(),
            },
            target,
            transport: Arc::clone(&self.transport),
        })
    }
}

impl std::fmt::Debug for InvocationRequestFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationRequestFactory")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// A fully built, not yet sent invocation.
pub struct FunctionRequest {
    target: FunctionTarget,
    invoke: InvokeRequest,
    transport: Arc<dyn InvocationTransport>,
}

impl FunctionRequest {
    pub fn target(&self) -> &FunctionTarget {
        &self.target
    }

    pub fn invoke_request(&self) -> &InvokeRequest {
        &self.invoke
    }

    /// Send the invocation and map the result.
    #[instrument(skip(self), fields(function = %self.target))]
    pub async fn execute(self) -> Result<FunctionResponse, InvocationError> {
        let started = Instant::now();
        let result = self.transport.invoke(self.invoke).await?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(
            status = result.status_code,
            function_error = ?result.function_error,
            request_id = %result.request_id,
            latency_ms,
            "function returned"
        );
        Ok(FunctionResponse::from_result(self.target, result, latency_ms))
    }
}

impl std::fmt::Debug for FunctionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRequest")
            .field("target", &self.target)
            .field("invoke", &self.invoke)
            .finish_non_exhaustive()
    }
}

/// HTTP view of an invocation result.
#[derive(Debug, Clone)]
pub struct FunctionResponse {
    pub target: FunctionTarget,
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub request_id: String,
    pub latency_ms: u64,
}

impl FunctionResponse {
    /// A function error pushes the status into 4xx/5xx (500 unless it is
    /// already there) and becomes the status text.
    pub fn from_result(target: FunctionTarget, result: InvokeResult, latency_ms: u64) -> Self {
        let function_error = result
            .has_function_error()
            .then(|| result.function_error.clone())
            .flatten();

        let status = match function_error {
            Some(_) if !is_error_status(result.status_code) => 500,
            _ => result.status_code,
        };
        let status_text = function_error.unwrap_or_else(|| reason_phrase(status).to_string());

        let mut headers = result.headers;
        if !result.request_id.is_empty() {
            headers
                .entry(REQUEST_ID_HEADER.to_string())
                .or_insert_with(|| result.request_id.clone());
        }

        Self {
            target,
            status,
            status_text,
            headers,
            body: result.payload,
            request_id: result.request_id,
            latency_ms,
        }
    }

    pub fn is_error(&self) -> bool {
        is_error_status(self.status)
    }
}

impl From<FunctionResponse> for GatewayResponse {
    fn from(response: FunctionResponse) -> Self {
        let mut gateway = GatewayResponse::new(response.status, response.target.as_str())
            .with_status_text(response.status_text)
            .with_body(response.body);
        gateway.headers = response.headers;
        gateway.latency_ms = response.latency_ms;
        gateway
    }
}

fn is_error_status(status: u16) -> bool {
    (400..600).contains(&status)
}

fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}
