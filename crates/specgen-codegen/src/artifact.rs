//! Generated artifacts and the ordered set that collects them

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::CodegenError;

/// First line of every generated (not scaffolded) artifact.
pub const GENERATED_HEADER: &str = "Code generated by specgen. DO NOT EDIT.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Always overwritten.
    Generated,
    /// Written only when absent at the destination.
    Scaffolded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Path relative to the output root, `/` separated.
    pub path: String,
    pub content: String,
    pub kind: ArtifactKind,
}

impl Artifact {
    pub fn generated(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            kind: ArtifactKind::Generated,
        }
    }

    pub fn scaffolded(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            kind: ArtifactKind::Scaffolded,
        }
    }
}

/// Artifacts in emission order, unique by path.
#[derive(Debug, Default)]
pub struct ArtifactSet {
    artifacts: IndexMap<String, Artifact>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact; a second artifact at the same path is an error.
    pub fn push(&mut self, artifact: Artifact) -> Result<(), CodegenError> {
        if self.artifacts.contains_key(&artifact.path) {
            return Err(CodegenError::DuplicateArtifact(artifact.path));
        }
        debug!("emitted {:?} artifact {}", artifact.kind, artifact.path);
        self.artifacts.insert(artifact.path.clone(), artifact);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Artifact> {
        self.artifacts.get(path)
    }

    /// Paths in emission order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<Artifact> {
        self.artifacts.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_path_rejected() {
        let mut set = ArtifactSet::new();
        set.push(Artifact::generated("v1/models/models.go", "a")).unwrap();
        set.push(Artifact::scaffolded("services/v1/pets.go", "b")).unwrap();
        let err = set
            .push(Artifact::generated("v1/models/models.go", "c"))
            .unwrap_err();
        assert!(matches!(err, CodegenError::DuplicateArtifact(path) if path == "v1/models/models.go"));

        let paths: Vec<String> = set.into_vec().into_iter().map(|a| a.path).collect();
        assert_eq!(paths, vec!["v1/models/models.go", "services/v1/pets.go"]);
    }
}
