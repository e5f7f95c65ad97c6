//! Isolation policies and their layered resolution.
//!
//! A policy is resolved once per command key (function identifier) when its
//! isolation group is created: the command override wins field by field,
//! then the global default, then the built-in default.

use fngate_kernel::gateway::GatewayError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Timeout used when neither the command nor the global layer sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);
/// Concurrent in-flight calls allowed by the semaphore strategy by default.
pub const DEFAULT_MAX_SEMAPHORES: u32 = 100;
/// Worker threads per group for the thread-pool strategy by default.
pub const DEFAULT_THREAD_POOL_SIZE: u32 = 10;

/// How concurrent calls of one isolation group are bounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationStrategy {
    /// Counting semaphore; calls run on the caller's runtime.
    #[default]
    Semaphore,
    /// Dedicated worker threads per group.
    ThreadPool,
}

impl IsolationStrategy {
    fn default_max_concurrent(self) -> u32 {
        match self {
            IsolationStrategy::Semaphore => DEFAULT_MAX_SEMAPHORES,
            IsolationStrategy::ThreadPool => DEFAULT_THREAD_POOL_SIZE,
        }
    }
}

/// Fully resolved, immutable policy of one isolation group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationPolicy {
    pub strategy: IsolationStrategy,
    pub timeout: Duration,
    pub max_concurrent: u32,
}

/// One configuration layer; unset fields fall through to the next layer.
///
/// A `timeout_ms` of zero counts as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationPolicyOverride {
    pub strategy: Option<IsolationStrategy>,
    pub timeout_ms: Option<u64>,
    pub max_concurrent: Option<u32>,
}

impl IsolationPolicyOverride {
    pub fn with_strategy(mut self, strategy: IsolationStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_max_concurrent(mut self, max: u32) -> Self {
        self.max_concurrent = Some(max);
        self
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Global default layer plus per-command overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationSettings {
    pub default: IsolationPolicyOverride,
    pub commands: HashMap<String, IsolationPolicyOverride>,
}

impl IsolationSettings {
    pub fn with_default(mut self, layer: IsolationPolicyOverride) -> Self {
        self.default = layer;
        self
    }

    pub fn with_command(
        mut self,
        command_key: impl Into<String>,
        layer: IsolationPolicyOverride,
    ) -> Self {
        self.commands.insert(command_key.into(), layer);
        self
    }

    /// Resolve the effective policy for `command_key`.
    pub fn resolve(&self, command_key: &str) -> Result<IsolationPolicy, GatewayError> {
        let command = self.command(command_key);

        let strategy = command
            .and_then(|c| c.strategy)
            .or(self.default.strategy)
            .unwrap_or_default();
        let timeout = command
            .and_then(IsolationPolicyOverride::timeout)
            .or_else(|| self.default.timeout())
            .unwrap_or(DEFAULT_TIMEOUT);
        let max_concurrent = command
            .and_then(|c| c.max_concurrent)
            .or(self.default.max_concurrent)
            .unwrap_or_else(|| strategy.default_max_concurrent());

        if max_concurrent == 0 {
            return Err(GatewayError::InvalidConcurrency(command_key.to_string()));
        }

        Ok(IsolationPolicy {
            strategy,
            timeout,
            max_concurrent,
        })
    }

    /// Override layer of `command_key`.
    ///
    /// Exact match first, then ASCII case-insensitive: the config loader
    /// lowercases table keys, while function names keep their case.
    fn command(&self, command_key: &str) -> Option<&IsolationPolicyOverride> {
        self.commands.get(command_key).or_else(|| {
            self.commands
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(command_key))
                .map(|(_, layer)| layer)
        })
    }

    /// Check every layer resolves to a usable policy.
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.resolve("")?;
        self.commands
            .keys()
            .try_for_each(|key| self.resolve(key).map(|_| ()))
    }
}
