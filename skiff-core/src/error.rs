//! Error types for SKIFF.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.
//! Each error kind maps to a stable CLI exit code via [`SkiffError::exit_code`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for SKIFF operations.
pub type Result<T> = std::result::Result<T, SkiffError>;

/// Main error type for SKIFF.
#[derive(Error, Debug)]
pub enum SkiffError {
    // Manifest errors
    #[error("Invalid manifest: {reason}")]
    Validation { reason: String },

    #[error(
        "Undefined variable ${{{var}}} referenced by service '{service}' (key '{key}') \
         is not present in the environment source"
    )]
    UndefinedVariable { service: String, key: String, var: String },

    #[error("Manifest schema error: {reason}")]
    Schema { reason: String },

    #[error("File read error: {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Dependency graph errors
    #[error("Dependency cycle detected: {}", members.join(" -> "))]
    Cycle { members: Vec<String> },

    #[error(
        "Missing dependency: service '{service}' depends on '{dependency}' which does not exist"
    )]
    MissingDependency { service: String, dependency: String },

    // Lifecycle errors
    #[error("Failed to start service '{service}': {reason}")]
    Start { service: String, reason: String },

    #[error("Service '{service}' did not become ready within {waited_secs}s")]
    ReadinessTimeout { service: String, waited_secs: u64 },

    #[error("Stack not found: {stack}")]
    StackNotFound { stack: String },

    #[error("Stack already deployed: {stack} (run `skiff down {stack}` first)")]
    StackAlreadyDeployed { stack: String },

    #[error("{operation} interrupted before completion")]
    Interrupted { operation: String },

    // Runtime errors
    #[error("Container runtime unavailable: {reason}")]
    RuntimeUnavailable { reason: String },

    #[error("Runtime command `{command}` failed: {reason}")]
    EngineCommand { command: String, reason: String },

    // Resource errors
    #[error("Volume not found: {volume}")]
    VolumeNotFound { volume: String },

    #[error("Network not found: {network}")]
    NetworkNotFound { network: String },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database migration failed: {reason}")]
    MigrationFailed { reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SkiffError {
    /// Stable exit code for this error kind.
    ///
    /// The CLI maps orchestration failures to fixed codes so callers can
    /// script against them: 2 validation, 3 schema, 4 dependency graph,
    /// 5 start, 6 readiness timeout, 1 everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            SkiffError::Validation { .. }
            | SkiffError::UndefinedVariable { .. }
            | SkiffError::FileRead { .. } => 2,
            SkiffError::Schema { .. } => 3,
            SkiffError::Cycle { .. } | SkiffError::MissingDependency { .. } => 4,
            SkiffError::Start { .. } => 5,
            SkiffError::ReadinessTimeout { .. } => 6,
            _ => 1,
        }
    }

    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_stable() {
        assert_eq!(SkiffError::Validation { reason: "x".into() }.exit_code(), 2);
        assert_eq!(
            SkiffError::UndefinedVariable {
                service: "db".into(),
                key: "POSTGRES_USER".into(),
                var: "POSTES_USER".into(),
            }
            .exit_code(),
            2
        );
        assert_eq!(SkiffError::Schema { reason: "x".into() }.exit_code(), 3);
        assert_eq!(SkiffError::Cycle { members: vec!["a".into(), "a".into()] }.exit_code(), 4);
        assert_eq!(
            SkiffError::Start { service: "db".into(), reason: "boom".into() }.exit_code(),
            5
        );
        assert_eq!(
            SkiffError::ReadinessTimeout { service: "db".into(), waited_secs: 60 }.exit_code(),
            6
        );
        assert_eq!(SkiffError::Internal("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_cycle_display_names_members() {
        let err = SkiffError::Cycle {
            members: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "Dependency cycle detected: a -> b -> a");
    }
}
