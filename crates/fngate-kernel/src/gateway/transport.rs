//! Invocation transport contract.
//!
//! The transport is the opaque capability that actually calls the remote
//! function. The gateway hands it a fully built [`InvokeRequest`] and expects
//! exactly one synchronous (request/response) invocation per call.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use thiserror::Error;

/// One synchronous function invocation.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Function identifier.
    pub function_name: String,
    /// Base64 client-context envelope, when one was built.
    pub client_context: Option<String>,
    /// Serialized payload, when one was extracted.
    pub payload: Option<Bytes>,
    /// Headers copied from the inbound HTTP request.
    pub headers: HashMap<String, String>,
}

/// What the transport reports back for an invocation.
#[derive(Debug, Clone)]
pub struct InvokeResult {
    /// Status code reported by the invocation service.
    pub status_code: u16,
    /// Set when the function itself failed (e.g. `Unhandled`).
    pub function_error: Option<String>,
    /// Response metadata headers.
    pub headers: HashMap<String, String>,
    /// Raw payload returned by the function.
    pub payload: Bytes,
    /// Request id assigned by the invocation service.
    pub request_id: String,
}

impl InvokeResult {
    /// A successful result with the given payload.
    pub fn ok(payload: impl Into<Bytes>) -> Self {
        Self {
            status_code: 200,
            function_error: None,
            headers: HashMap::new(),
            payload: payload.into(),
            request_id: String::new(),
        }
    }

    /// Builder helper: mark the result as a function error.
    pub fn with_function_error(mut self, error: impl Into<String>) -> Self {
        self.function_error = Some(error.into());
        self
    }

    /// Builder helper: set the status code.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Builder helper: attach a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_lowercase(), value.into());
        self
    }

    /// `true` when the function reported an error (blank markers are ignored).
    pub fn has_function_error(&self) -> bool {
        self.function_error
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty())
    }
}

/// Failure of the transport itself (as opposed to a function-level error,
/// which arrives inside a successful [`InvokeResult`]).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The invocation service could not be reached.
    #[error("network error invoking '{function}': {message}")]
    Network { function: String, message: String },

    /// The invocation service refused the call (unknown function, throttled, …).
    #[error("invocation service returned {status} for '{function}': {message}")]
    Service {
        function: String,
        status: u16,
        message: String,
    },

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

/// Kernel contract for the component that performs the remote invocation.
#[async_trait]
pub trait InvocationTransport: Send + Sync {
    /// Perform exactly one synchronous invocation.
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResult, TransportError>;
}
