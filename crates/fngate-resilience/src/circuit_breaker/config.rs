//! Circuit Breaker Configuration
//!
//! Per-group and global circuit breaker configuration. Durations are kept in
//! milliseconds so they read naturally in TOML/YAML files.

use fngate_kernel::gateway::GatewayError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for one circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Whether the circuit breaker is enabled
    pub enabled: bool,
    /// Minimum number of calls in the rolling window before the error
    /// percentage is considered
    pub request_volume_threshold: u32,
    /// Failure percentage (1-100) at or above which the circuit opens
    pub error_threshold_percentage: u32,
    /// How long the circuit stays open before a trial call is allowed
    pub sleep_window_ms: u64,
    /// Length of the rolling statistics window
    pub rolling_window_ms: u64,
    /// Number of buckets the rolling window is divided into
    pub window_buckets: u32,
    /// Maximum concurrent trial calls while half-open
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_volume_threshold: 20,
            error_threshold_percentage: 50,
            sleep_window_ms: 5_000,
            rolling_window_ms: 10_000,
            window_buckets: 10,
            half_open_max_requests: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Set the request volume threshold
    pub fn with_request_volume_threshold(mut self, threshold: u32) -> Self {
        self.request_volume_threshold = threshold;
        self
    }

    /// Set the error threshold percentage
    pub fn with_error_threshold_percentage(mut self, percentage: u32) -> Self {
        self.error_threshold_percentage = percentage;
        self
    }

    /// Set the sleep window
    pub fn with_sleep_window(mut self, window: Duration) -> Self {
        self.sleep_window_ms = window.as_millis() as u64;
        self
    }

    /// Set the rolling window
    pub fn with_rolling_window(mut self, window: Duration) -> Self {
        self.rolling_window_ms = window.as_millis() as u64;
        self
    }

    /// Set the half-open max requests
    pub fn with_half_open_max_requests(mut self, max: u32) -> Self {
        self.half_open_max_requests = max;
        self
    }

    /// Create a disabled configuration (no circuit breaking)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn sleep_window(&self) -> Duration {
        Duration::from_millis(self.sleep_window_ms)
    }

    pub fn rolling_window(&self) -> Duration {
        Duration::from_millis(self.rolling_window_ms)
    }

    /// Check the threshold percentage is usable.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.error_threshold_percentage == 0 || self.error_threshold_percentage > 100 {
            return Err(GatewayError::InvalidErrorThreshold(
                self.error_threshold_percentage,
            ));
        }
        Ok(())
    }
}

/// Global circuit breaker configuration: a default plus per-command overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Configuration used by every group without an override
    pub default: CircuitBreakerConfig,
    /// Per-command (function identifier) configurations
    pub commands: HashMap<String, CircuitBreakerConfig>,
}

impl CircuitBreakerSettings {
    /// Set the default configuration
    pub fn with_default_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.default = config;
        self
    }

    /// Add a command-specific configuration
    pub fn with_command_config(
        mut self,
        command_key: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Self {
        self.commands.insert(command_key.into(), config);
        self
    }

    /// Get the effective configuration for a command (override or default)
    ///
    /// Keys loaded from files arrive lowercased, so a miss on the exact key
    /// retries ignoring ASCII case.
    pub fn get_effective_config(&self, command_key: &str) -> CircuitBreakerConfig {
        self.commands
            .get(command_key)
            .or_else(|| {
                self.commands
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(command_key))
                    .map(|(_, config)| config)
            })
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    /// Validate the default and every override.
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.default.validate()?;
        self.commands.values().try_for_each(CircuitBreakerConfig::validate)
    }
}
