//! Diagnostic Error Types
//!
//! Errors returned by the library surface. Failures of individual check
//! steps never show up here; those become `CheckResult`s.

use crate::client::ClientError;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, DiagnosticError>;

/// Diagnostic error types
///
/// Represents programming or configuration mistakes that prevent a run
/// from starting at all.
#[derive(Debug, Error)]
pub enum DiagnosticError {
    /// Runner built without any step
    #[error("Diagnostic runner has no steps")]
    EmptyStepList,

    /// A selector named a step the runner does not declare
    #[error("Unknown diagnostic step: {0}")]
    UnknownStep(String),

    /// Two steps share the same name
    #[error("Duplicate diagnostic step: {0}")]
    DuplicateStep(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Remote client could not be constructed
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// I/O error while reading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid YAML
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DiagnosticError {
    /// Create an UnknownStep error
    pub fn unknown_step(name: impl Into<String>) -> Self {
        Self::UnknownStep(name.into())
    }

    /// Create a DuplicateStep error
    pub fn duplicate_step(name: impl Into<String>) -> Self {
        Self::DuplicateStep(name.into())
    }

    /// Create a Config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Check if this error comes from configuration
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Io(_) | Self::Yaml(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_step_error() {
        let err = DiagnosticError::unknown_step("rpc:missing");
        assert!(matches!(err, DiagnosticError::UnknownStep(_)));
        assert_eq!(err.to_string(), "Unknown diagnostic step: rpc:missing");
    }

    #[test]
    fn test_duplicate_step_error() {
        let err = DiagnosticError::duplicate_step("connection");
        assert_eq!(err.to_string(), "Duplicate diagnostic step: connection");
    }

    #[test]
    fn test_config_error() {
        let err = DiagnosticError::config("supabase_url is empty");
        assert!(err.is_config_error());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: supabase_url is empty"
        );
    }

    #[test]
    fn test_empty_step_list_is_not_config_error() {
        assert!(!DiagnosticError::EmptyStepList.is_config_error());
    }
}
