//! Gateway error types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fngate_kernel::config::ConfigError;
use fngate_kernel::gateway::{GatewayError, TransportError};
use fngate_resilience::ExecutionError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::invocation::InvocationError;

/// Machine-readable code carried by a [`RoutingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    /// The invocation could not be built or sent.
    FunctionInvokeError,
    /// The function answered with a 4xx/5xx status.
    FunctionError,
    InvocationTimeout,
    InvocationRejected,
    CircuitOpen,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FunctionInvokeError => "FunctionInvokeError",
            ErrorCode::FunctionError => "FunctionError",
            ErrorCode::InvocationTimeout => "InvocationTimeout",
            ErrorCode::InvocationRejected => "InvocationRejected",
            ErrorCode::CircuitOpen => "CircuitOpen",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing-layer failure with the HTTP status to answer with.
#[derive(Debug, Error)]
#[error("{code} ({status}): {message}")]
pub struct RoutingError {
    pub status: u16,
    pub code: ErrorCode,
    pub message: String,
}

impl RoutingError {
    pub fn new(status: u16, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn invoke_error(message: impl Into<String>) -> Self {
        Self::new(500, ErrorCode::FunctionInvokeError, message)
    }

    pub fn function_error(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, ErrorCode::FunctionError, message)
    }
}

impl From<InvocationError> for RoutingError {
    fn from(err: InvocationError) -> Self {
        RoutingError::invoke_error(err.to_string())
    }
}

impl From<ExecutionError<InvocationError>> for RoutingError {
    fn from(err: ExecutionError<InvocationError>) -> Self {
        let message = err.to_string();
        match err {
            ExecutionError::Timeout { .. } => {
                RoutingError::new(500, ErrorCode::InvocationTimeout, message)
            }
            ExecutionError::Rejected { .. } => {
                RoutingError::new(503, ErrorCode::InvocationRejected, message)
            }
            ExecutionError::CircuitOpen { .. } => {
                RoutingError::new(503, ErrorCode::CircuitOpen, message)
            }
            ExecutionError::Failed { .. }
            | ExecutionError::Aborted { .. }
            | ExecutionError::Isolation { .. } => RoutingError::invoke_error(message),
        }
    }
}

impl IntoResponse for RoutingError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
            }
        }));

        (status, body).into_response()
    }
}

pub type GatewayResult<T> = Result<T, RoutingError>;

/// Failure while assembling or starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to load settings: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid settings: {0}")]
    Settings(#[from] GatewayError),

    #[error("failed to create transport: {0}")]
    Transport(#[from] TransportError),

    #[error("server i/o error: {0}")]
    Io(#[from] std::io::Error),
}
