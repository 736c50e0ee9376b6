use std::fmt;

use thiserror::Error;

/// Dotted location of an entity inside a specification,
/// e.g. `version.v2.model.Person.field.age`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityPath {
    segments: Vec<(&'static str, String)>,
}

impl EntityPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// A new path one level deeper.
    pub fn child(&self, kind: &'static str, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push((kind, name.into()));
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<spec>");
        }
        for (i, (kind, name)) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}.{}", kind, name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecErrorReason {
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("'{name}' is reserved and cannot be used as a {kind} name")]
    ReservedName { kind: &'static str, name: String },

    #[error("name must not be empty")]
    EmptyName,

    #[error("nullable type cannot wrap another nullable type: '{0}'")]
    DoubleNullable(String),

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("type '{0}' is only allowed as a response type")]
    MisplacedEmpty(String),

    #[error("discriminator '{0}' collides with a reserved serialization key")]
    ReservedDiscriminator(String),

    #[error("discriminator '{discriminator}' collides with field of item model '{model}'")]
    DiscriminatorCollision {
        discriminator: String,
        model: String,
    },

    #[error("item '{item}' cannot carry a discriminator: {detail}")]
    UntaggableItem { item: String, detail: String },

    #[error("{0} must declare at least one item")]
    NoItems(&'static str),

    #[error("duplicate enum literal '{0}'")]
    DuplicateEnumValue(String),

    #[error("operation must declare at least one response")]
    NoResponses,

    #[error("duplicate response status '{0}'")]
    DuplicateStatus(String),

    #[error("unknown response status '{0}'")]
    UnknownStatus(String),

    #[error("url parameter '{0}' is not used in the url template")]
    UnusedUrlParam(String),

    #[error("url template placeholder '{0}' has no matching url parameter")]
    UndeclaredUrlParam(String),

    #[error("request body cannot be nullable")]
    NullableBody,
}

/// The first invariant violation found while constructing a specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {reason}")]
pub struct SpecError {
    pub path: EntityPath,
    pub reason: SpecErrorReason,
}

impl SpecError {
    pub fn new(path: EntityPath, reason: SpecErrorReason) -> Self {
        Self { path, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_path_display() {
        let path = EntityPath::root()
            .child("version", "v2")
            .child("model", "Person")
            .child("field", "age");
        assert_eq!(path.to_string(), "version.v2.model.Person.field.age");
        assert_eq!(EntityPath::root().to_string(), "<spec>");
    }

    #[test]
    fn test_spec_error_display() {
        let err = SpecError::new(
            EntityPath::root().child("version", "v1").child("model", "Pet"),
            SpecErrorReason::UnknownModel("Owner".to_string()),
        );
        assert_eq!(err.to_string(), "version.v1.model.Pet: unknown model 'Owner'");
    }
}
