//! HTTP invocation transport.
//!
//! [`HttpInvocationTransport`] speaks the Lambda `Invoke` REST API:
//!
//! ```text
//! POST {endpoint}/2015-03-31/functions/{function}/invocations
//! X-Amz-Invocation-Type: RequestResponse
//! X-Amz-Client-Context: <base64 envelope>
//! ```
//!
//! Requests are not signed, so the transport targets Lambda-compatible
//! endpoints that accept anonymous calls (local emulators, internal
//! proxies that sign on the way out).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use fngate_kernel::gateway::{InvocationTransport, InvokeRequest, InvokeResult, TransportError};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const API_VERSION: &str = "2015-03-31";
const INVOCATION_TYPE_HEADER: &str = "x-amz-invocation-type";
const CLIENT_CONTEXT_HEADER: &str = "x-amz-client-context";
const FUNCTION_ERROR_HEADER: &str = "x-amz-function-error";
const REQUEST_ID_HEADER: &str = "x-amzn-requestid";

/// Connection settings for [`HttpInvocationTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Base URL of the invocation service.
    pub endpoint: String,
    /// Socket-level request timeout. Keep it above every isolation timeout.
    pub request_timeout_ms: u64,
    /// Inbound headers forwarded to the invocation service.
    pub forward_headers: Vec<String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3001".to_string(),
            request_timeout_ms: 60_000,
            forward_headers: vec!["x-request-id".to_string(), "traceparent".to_string()],
        }
    }
}

/// Invokes functions over HTTP.
pub struct HttpInvocationTransport {
    endpoint: Url,
    forward_headers: Vec<String>,
    client: Client,
}

impl HttpInvocationTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self, TransportError> {
        let endpoint = Url::parse(&settings.endpoint).map_err(|e| {
            TransportError::Other(format!("invalid endpoint '{}': {e}", settings.endpoint))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build http client: {e}")))?;

        Ok(Self {
            endpoint,
            forward_headers: settings
                .forward_headers
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            client,
        })
    }

    /// `{endpoint}/2015-03-31/functions/{function}/invocations`
    pub fn invocation_url(&self, function: &str) -> Result<Url, TransportError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Other(format!("endpoint '{}' cannot be a base", self.endpoint)))?
            .pop_if_empty()
            .extend([API_VERSION, "functions", function, "invocations"]);
        Ok(url)
    }
}

#[async_trait]
impl InvocationTransport for HttpInvocationTransport {
    #[instrument(skip(self, request), fields(function = %request.function_name))]
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResult, TransportError> {
        let url = self.invocation_url(&request.function_name)?;
        debug!(url = %url, "invoking function");

        let mut builder = self
            .client
            .post(url)
            .header(INVOCATION_TYPE_HEADER, "RequestResponse");
        for name in &self.forward_headers {
            if let Some(value) = request.headers.get(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(context) = &request.client_context {
            builder = builder.header(CLIENT_CONTEXT_HEADER, context.as_str());
        }
        if let Some(payload) = request.payload {
            builder = builder.body(payload);
        }

        let network = |e: reqwest::Error| TransportError::Network {
            function: request.function_name.clone(),
            message: e.to_string(),
        };
        let response = builder.send().await.map_err(network)?;

        let status = response.status().as_u16();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_string(), v.to_string());
            }
        }
        let payload = response.bytes().await.map_err(network)?;

        // Failures of the service itself (unknown function, throttling, ...)
        // carry no function error marker.
        if !(200..300).contains(&status) && !headers.contains_key(FUNCTION_ERROR_HEADER) {
            return Err(TransportError::Service {
                function: request.function_name.clone(),
                status,
                message: String::from_utf8_lossy(&payload).into_owned(),
            });
        }

        Ok(InvokeResult {
            status_code: status,
            function_error: headers.get(FUNCTION_ERROR_HEADER).cloned(),
            request_id: headers.get(REQUEST_ID_HEADER).cloned().unwrap_or_default(),
            headers,
            payload,
        })
    }
}
