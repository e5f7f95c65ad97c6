//! Gateway settings.
//!
//! Loaded from a TOML, JSON or YAML file (format picked by extension) with
//! `${VAR}` substitution, then overridden by `FNGATE__*` environment
//! variables, e.g. `FNGATE__SERVER__PORT=8080`.
//!
//! ```toml
//! target_prefix = "arn:aws:lambda:"
//!
//! [server]
//! port = 8080
//!
//! [client_context]
//! active_profiles = ["prod"]
//!
//! [isolation.default]
//! strategy = "semaphore"
//! timeout_ms = 2000
//!
//! [isolation.commands."arn:aws:lambda:us-east-1:123:function:slow"]
//! strategy = "thread-pool"
//! timeout_ms = 10000
//! max_concurrent = 4
//!
//! [[routes]]
//! path_prefix = "/hello"
//! route_key = "arn:aws:lambda:us-east-1:123:function:hello"
//! ```

use std::path::Path;

use fngate_kernel::config::{self, ConfigError, ConfigResult};
use fngate_kernel::gateway::{DEFAULT_TARGET_PREFIX, GatewayError, TargetPattern};
use fngate_resilience::{CircuitBreakerSettings, ExecutorSettings, IsolationSettings};
use serde::{Deserialize, Serialize};

use crate::transport::TransportSettings;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "FNGATE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientContextSettings {
    /// Deployment profiles reported to functions.
    pub active_profiles: Vec<String>,
    /// Locale tag; the process locale when unset.
    pub locale: Option<String>,
}

/// Maps a request path prefix to a route key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSettings {
    pub path_prefix: String,
    pub route_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub server: ServerSettings,
    pub target_prefix: String,
    pub client_context: ClientContextSettings,
    pub isolation: IsolationSettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub transport: TransportSettings,
    pub routes: Vec<RouteSettings>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            target_prefix: DEFAULT_TARGET_PREFIX.to_string(),
            client_context: ClientContextSettings::default(),
            isolation: IsolationSettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            transport: TransportSettings::default(),
            routes: Vec::new(),
        }
    }
}

impl GatewaySettings {
    /// Load from `path` (or defaults when `None`) plus environment overrides.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => {
                let path = path.to_str().ok_or_else(|| {
                    ConfigError::Parse(format!("non UTF-8 config path: {}", path.display()))
                })?;
                config::load_with_env(path, ENV_PREFIX)
            }
            None => config::load_from_env(ENV_PREFIX),
        }
    }

    pub fn target_pattern(&self) -> Result<TargetPattern, GatewayError> {
        TargetPattern::new(self.target_prefix.clone())
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            isolation: self.isolation.clone(),
            circuit_breaker: self.circuit_breaker.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        self.target_pattern()?;
        self.executor_settings().validate()
    }

    /// Route key of the longest matching path prefix.
    pub fn route_key(&self, path: &str) -> Option<&str> {
        self.routes
            .iter()
            .filter(|route| matches_prefix(path, &route.path_prefix))
            .max_by_key(|route| route.path_prefix.len())
            .map(|route| route.route_key.as_str())
    }
}

/// `/hello` matches `/hello` and `/hello/x`, not `/helloworld`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fngate_resilience::IsolationStrategy;
    use std::io::Write;
    use std::time::Duration;

    const SAMPLE: &str = r#"
target_prefix = "arn:aws:lambda:"

[server]
port = 8080

[client_context]
active_profiles = ["prod", "aws"]
locale = "ko_KR"

[isolation.default]
timeout_ms = 2000

[isolation.commands."arn:aws:lambda:us-east-1:123:function:slow"]
strategy = "thread-pool"
timeout_ms = 10000
max_concurrent = 4

[circuit_breaker.default]
request_volume_threshold = 5

[transport]
endpoint = "http://lambda.local:9001"

[[routes]]
path_prefix = "/hello"
route_key = "arn:aws:lambda:us-east-1:123:function:hello"

[[routes]]
path_prefix = "/hello/slow"
route_key = "arn:aws:lambda:us-east-1:123:function:slow"
"#;

    fn write_toml(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_every_section_from_toml() {
        let file = write_toml(SAMPLE);
        let settings = GatewaySettings::load(Some(file.path())).unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.client_context.active_profiles, vec!["prod", "aws"]);
        assert_eq!(settings.client_context.locale.as_deref(), Some("ko_KR"));
        assert_eq!(settings.circuit_breaker.default.request_volume_threshold, 5);
        assert_eq!(settings.transport.endpoint, "http://lambda.local:9001");
        assert_eq!(settings.routes.len(), 2);
        settings.validate().unwrap();

        let slow = settings
            .isolation
            .resolve("arn:aws:lambda:us-east-1:123:function:slow")
            .unwrap();
        assert_eq!(slow.strategy, IsolationStrategy::ThreadPool);
        assert_eq!(slow.timeout, Duration::from_millis(10_000));
        assert_eq!(slow.max_concurrent, 4);

        let other = settings.isolation.resolve("arn:aws:lambda:x").unwrap();
        assert_eq!(other.timeout, Duration::from_millis(2_000));
    }

    #[test]
    fn longest_prefix_wins() {
        let file = write_toml(SAMPLE);
        let settings = GatewaySettings::load(Some(file.path())).unwrap();

        assert_eq!(
            settings.route_key("/hello/slow/run"),
            Some("arn:aws:lambda:us-east-1:123:function:slow")
        );
        assert_eq!(
            settings.route_key("/hello"),
            Some("arn:aws:lambda:us-east-1:123:function:hello")
        );
        assert_eq!(settings.route_key("/helloworld"), None);
        assert_eq!(settings.route_key("/other"), None);
    }

    #[test]
    fn mixed_case_function_overrides_survive_loading() {
        let file = write_toml(
            r#"
[isolation.commands."arn:aws:lambda:us-east-1:123:function:MyFunc"]
timeout_ms = 9000

[circuit_breaker.commands."arn:aws:lambda:us-east-1:123:function:MyFunc"]
request_volume_threshold = 7
"#,
        );
        let settings = GatewaySettings::load(Some(file.path())).unwrap();
        let key = "arn:aws:lambda:us-east-1:123:function:MyFunc";

        let policy = settings.isolation.resolve(key).unwrap();
        assert_eq!(policy.timeout, Duration::from_millis(9_000));
        let breaker = settings.circuit_breaker.get_effective_config(key);
        assert_eq!(breaker.request_volume_threshold, 7);
    }

    #[test]
    fn defaults_are_complete() {
        let settings = GatewaySettings::default();
        assert_eq!(settings.target_prefix, DEFAULT_TARGET_PREFIX);
        assert_eq!(settings.server.bind_address(), "0.0.0.0:3000");
        settings.validate().unwrap();
    }

    #[test]
    fn empty_target_prefix_is_invalid() {
        let settings = GatewaySettings {
            target_prefix: String::new(),
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(GatewayError::EmptyTargetPrefix));
    }
}
