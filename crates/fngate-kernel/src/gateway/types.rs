//! Core data types for the gateway kernel contract.
//!
//! These types are shared by every layer of the gateway and carry no runtime
//! dependencies beyond `bytes`, `serde_json` and `std`.

use bytes::Bytes;
use std::collections::HashMap;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP primitives
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP method, covering the standard verbs used in REST and proxy scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Case-insensitive parse from a string slice.
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }

    /// Return the standard uppercase string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response
// ─────────────────────────────────────────────────────────────────────────────

/// An inbound request flowing through the gateway.
///
/// All fields are owned so the struct can be moved across task boundaries.
/// The body is a [`Bytes`] handle: peeking at it or handing it to the
/// extractor never consumes it.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// Unique identifier for correlating this request across logs.
    pub id: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Request path without the query string, e.g. `/lambda/hello`.
    pub path: String,
    /// Raw (still percent-encoded) query string, without the leading `?`.
    pub query: Option<String>,
    /// HTTP headers (header names are lowercased).
    pub headers: HashMap<String, String>,
    /// Raw body bytes.
    pub body: Bytes,
}

impl GatewayRequest {
    /// Construct a minimal request with the given id, method and path.
    ///
    /// A `?` in `path` is split off into [`query`](Self::query).
    pub fn new(id: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        let path = path.into();
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };
        Self {
            id: id.into(),
            method,
            path,
            query,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Builder helper: attach a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_lowercase(), value.into());
        self
    }

    /// Builder helper: set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder helper: set the raw query string.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// The declared `content-type` header, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    /// `true` when the body holds no bytes. Looks at the first byte only.
    pub fn has_empty_body(&self) -> bool {
        self.body.first().is_none()
    }
}

/// A response produced by a function (or a fallback) and returned through the
/// gateway.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// HTTP status code (100–599).
    pub status: u16,
    /// Reason phrase or function error message.
    pub status_text: String,
    /// Response headers. An owned copy; never shared with the transport.
    pub headers: HashMap<String, String>,
    /// Body bytes.
    pub body: Bytes,
    /// Identifier of the function (or fallback route) that produced the response.
    pub function_id: String,
    /// Round-trip latency in milliseconds (gateway → function → gateway).
    pub latency_ms: u64,
}

impl GatewayResponse {
    /// Construct a minimal response.
    pub fn new(status: u16, function_id: impl Into<String>) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: HashMap::new(),
            body: Bytes::new(),
            function_id: function_id.into(),
            latency_ms: 0,
        }
    }

    /// Builder helper: attach a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_lowercase(), value.into());
        self
    }

    /// Builder helper: set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder helper: set the status text.
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// `true` for 4xx and 5xx statuses.
    pub fn is_error(&self) -> bool {
        (400..600).contains(&self.status)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request context
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable context that flows through the filter chain for a single request.
///
/// The routing host sets [`route_key`](Self::route_key) to the service id it
/// resolved. A routing stage that serves the request stores the response,
/// sets [`handled`](Self::handled) and clears the route key so no default
/// routing runs afterwards.
#[derive(Debug, Clone)]
pub struct GatewayContext {
    /// The inbound request.
    pub request: GatewayRequest,
    /// Service id / function identifier chosen by the routing host.
    pub route_key: Option<String>,
    /// Set once a routing stage has written the response.
    pub handled: bool,
    /// The response written by the routing stage.
    pub response: Option<GatewayResponse>,
    /// Free-form attributes written and read by filters.
    pub attributes: HashMap<String, serde_json::Value>,
}

impl GatewayContext {
    /// Create a fresh context from an inbound request.
    pub fn new(request: GatewayRequest) -> Self {
        Self {
            request,
            route_key: None,
            handled: false,
            response: None,
            attributes: HashMap::new(),
        }
    }

    /// Builder helper: set the route key.
    pub fn with_route_key(mut self, key: impl Into<String>) -> Self {
        self.route_key = Some(key.into());
        self
    }

    /// Convenience: read a typed attribute, returning `None` if absent or
    /// if deserialization fails.
    pub fn get_attr<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Convenience: write a serializable attribute.
    pub fn set_attr<T: serde::Serialize>(&mut self, key: impl Into<String>, val: &T) {
        if let Ok(v) = serde_json::to_value(val) {
            self.attributes.insert(key.into(), v);
        }
    }
}
