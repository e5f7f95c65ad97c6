//! Client context envelope sent alongside each invocation.
//!
//! The envelope is wrapped under [`CLIENT_CONTEXT_KEY`], rendered as JSON and
//! base64-encoded. The encoded form may not exceed [`MAX_ENCODED_LEN`] bytes;
//! an oversized envelope is refused, never truncated.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use fngate_kernel::gateway::GatewayRequest;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level key wrapping the envelope.
pub const CLIENT_CONTEXT_KEY: &str = "x-amz-Client-Context";
/// Largest accepted encoded envelope, in bytes.
pub const MAX_ENCODED_LEN: usize = 3583;
/// Environment key carrying the comma-joined active profiles.
pub const ACTIVE_PROFILES_KEY: &str = "profiles.active";
/// Environment key carrying the locale tag.
pub const LOCALE_KEY: &str = "locale";

const FALLBACK_LOCALE: &str = "en_US";

#[derive(Debug, Error)]
pub enum ClientContextError {
    #[error("failed to render client context: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("encoded client context is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("client context is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("client context is missing the 'x-amz-Client-Context' key")]
    MissingEnvelope,
}

/// Three flat string maps forwarded to the function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientContext {
    pub client: BTreeMap<String, String>,
    pub custom: BTreeMap<String, String>,
    pub environment: BTreeMap<String, String>,
}

impl ClientContext {
    pub fn with_client(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.client.insert(key.into(), value.into());
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    pub fn with_environment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Wrap, render and base64-encode the envelope.
    pub fn encode(&self) -> Result<String, ClientContextError> {
        let wrapped = BTreeMap::from([(CLIENT_CONTEXT_KEY, self)]);
        let json = serde_json::to_vec(&wrapped)?;
        let encoded = STANDARD.encode(json);
        if encoded.len() > MAX_ENCODED_LEN {
            return Err(ClientContextError::TooLarge {
                size: encoded.len(),
                limit: MAX_ENCODED_LEN,
            });
        }
        Ok(encoded)
    }

    /// Reverse of [`encode`](Self::encode).
    pub fn decode(encoded: &str) -> Result<Self, ClientContextError> {
        let json = STANDARD.decode(encoded)?;
        let mut wrapped: BTreeMap<String, ClientContext> = serde_json::from_slice(&json)?;
        wrapped
            .remove(CLIENT_CONTEXT_KEY)
            .ok_or(ClientContextError::MissingEnvelope)
    }
}

/// Builds the envelope for one request.
pub trait ClientContextFactory: Send + Sync {
    fn create(&self, request: &GatewayRequest) -> ClientContext;
}

/// Fills `environment` with the active profiles and the locale; leaves
/// `client` and `custom` empty.
#[derive(Debug, Clone)]
pub struct DefaultClientContextFactory {
    active_profiles: Vec<String>,
    locale: String,
}

impl DefaultClientContextFactory {
    pub fn new(active_profiles: Vec<String>, locale: impl Into<String>) -> Self {
        Self {
            active_profiles,
            locale: locale.into(),
        }
    }

    /// Use `locale` when given, else the process locale.
    pub fn with_profiles(active_profiles: Vec<String>, locale: Option<String>) -> Self {
        Self::new(active_profiles, locale.unwrap_or_else(system_locale))
    }
}

impl Default for DefaultClientContextFactory {
    fn default() -> Self {
        Self::with_profiles(Vec::new(), None)
    }
}

impl ClientContextFactory for DefaultClientContextFactory {
    fn create(&self, _request: &GatewayRequest) -> ClientContext {
        ClientContext::default()
            .with_environment(ACTIVE_PROFILES_KEY, self.active_profiles.join(","))
            .with_environment(LOCALE_KEY, self.locale.clone())
    }
}

/// Locale tag from `LC_ALL` or `LANG`, e.g. `ko_KR.UTF-8` → `ko_KR`.
fn system_locale() -> String {
    ["LC_ALL", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|value| value.split(['.', '@']).next().unwrap_or_default().to_string())
        .find(|tag| !tag.is_empty() && tag != "C" && tag != "POSIX")
        .unwrap_or_else(|| FALLBACK_LOCALE.to_string())
}
