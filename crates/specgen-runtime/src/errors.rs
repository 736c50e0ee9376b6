//! Contract violation types for specgen-runtime.
//!
//! Every violation carries the JSON path of the offending value so that
//! errors inside nested payloads can be located.

use std::fmt;

use thiserror::Error;

/// One broken rule of a serialization contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// A required object field is absent or explicitly `null`.
    #[error("required field missing: {0}")]
    RequiredField(String),

    #[error("Unknown enum value: {0}")]
    UnknownEnumValue(String),

    /// A wrapper or discriminated union with zero or several items set.
    #[error("union case is not set")]
    UnionCase,

    #[error("discriminator field {0} not found")]
    MissingDiscriminator(String),

    #[error("unexpected union discriminator value: {0}")]
    UnknownDiscriminatorValue(String),

    /// The payload has the wrong JSON shape for its declared type.
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A model reference with no contract; unreachable for a validated specification.
    #[error("no contract for model '{0}'")]
    UnknownModel(String),
}

/// A contract error together with where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractViolation {
    /// JSON path of the value, e.g. `pets[0].color`; empty for the root.
    pub path: String,
    pub error: ContractError,
}

impl ContractViolation {
    pub fn new(path: impl Into<String>, error: ContractError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(f, "{}: {}", self.path, self.error)
        }
    }
}

impl std::error::Error for ContractViolation {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Name of a JSON value's kind, as used in [`ContractError::Mismatch`].
pub(crate) fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_display() {
        let violation = ContractViolation::new(
            "pets[1]",
            ContractError::RequiredField("name".to_string()),
        );
        assert_eq!(violation.to_string(), "pets[1]: required field missing: name");

        let root = ContractViolation::new("", ContractError::UnionCase);
        assert_eq!(root.to_string(), "union case is not set");
    }

    #[test]
    fn test_kind_of() {
        assert_eq!(kind_of(&serde_json::json!(null)), "null");
        assert_eq!(kind_of(&serde_json::json!([1])), "array");
        assert_eq!(kind_of(&serde_json::json!({"a": 1})), "object");
    }
}
