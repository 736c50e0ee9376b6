//! Error types for configuration and code generation

use specgen_core::{EntityPath, SpecError};
use thiserror::Error;

/// A generator configuration that cannot be built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown target '{0}', expected one of: go, rust, typescript")]
    UnknownTarget(String),

    #[error("unknown json mode '{0}', expected one of: strict, nonstrict")]
    UnknownJsonMode(String),

    #[error("unknown server flavor '{0}'")]
    UnknownServer(String),

    #[error("server flavor '{server}' is not supported for target '{target}'")]
    UnsupportedServer { target: String, server: String },

    #[error("unknown output family '{0}', expected one of: models, client, service, scaffold")]
    UnknownOutput(String),

    #[error("invalid root module '{0}'")]
    InvalidRootModule(String),
}

#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("invalid specification: {0}")]
    Spec(#[from] SpecError),

    /// A reference a validated specification should never produce.
    #[error("{path}: cannot resolve {reason}")]
    Resolution { path: EntityPath, reason: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("two artifacts share the path '{0}'")]
    DuplicateArtifact(String),

    #[error("format error: {0}")]
    Fmt(#[from] std::fmt::Error),
}

impl CodegenError {
    pub fn resolution(path: EntityPath, reason: impl Into<String>) -> Self {
        CodegenError::Resolution {
            path,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::UnsupportedServer {
            target: "rust".to_string(),
            server: "chi".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "server flavor 'chi' is not supported for target 'rust'"
        );
        let err: CodegenError = err.into();
        assert!(err.to_string().starts_with("invalid configuration:"));
    }

    #[test]
    fn test_resolution_error_display() {
        let err = CodegenError::resolution(
            EntityPath::root().child("version", "v1").child("model", "Pet"),
            "unbound model reference 'Owner'",
        );
        assert_eq!(
            err.to_string(),
            "version.v1.model.Pet: cannot resolve unbound model reference 'Owner'"
        );
    }
}
