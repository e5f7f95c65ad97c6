//! Function target identifiers.
//!
//! A route key is only dispatched to a function when it carries a recognized
//! prefix. [`TargetPattern`] holds that prefix; [`FunctionTarget`] is an
//! identifier that has already passed the check.

use super::error::GatewayError;
use std::fmt;

/// Prefix of AWS Lambda function ARNs.
pub const DEFAULT_TARGET_PREFIX: &str = "arn:aws:lambda:";

/// Recognized prefix for function identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPattern {
    prefix: String,
}

impl TargetPattern {
    /// Build a pattern; an empty prefix is rejected.
    pub fn new(prefix: impl Into<String>) -> Result<Self, GatewayError> {
        let prefix = prefix.into();
        if prefix.trim().is_empty() {
            return Err(GatewayError::EmptyTargetPrefix);
        }
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `true` when `candidate` carries the recognized prefix.
    pub fn matches(&self, candidate: &str) -> bool {
        candidate.starts_with(&self.prefix)
    }

    /// Validate `candidate` into a [`FunctionTarget`].
    pub fn parse(&self, candidate: &str) -> Result<FunctionTarget, GatewayError> {
        if self.matches(candidate) {
            Ok(FunctionTarget(candidate.to_string()))
        } else {
            Err(GatewayError::InvalidTarget(
                candidate.to_string(),
                self.prefix.clone(),
            ))
        }
    }
}

impl Default for TargetPattern {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_TARGET_PREFIX.to_string(),
        }
    }
}

/// A validated function identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionTarget(String);

impl FunctionTarget {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FunctionTarget {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
