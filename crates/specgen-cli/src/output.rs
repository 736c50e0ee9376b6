//! Writing generated artifacts to disk

use anyhow::{Context, Result};
use specgen_codegen::{Artifact, ArtifactKind};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a write pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    /// Scaffolded files left alone because they already exist.
    pub skipped: usize,
}

/// Destination of an artifact below `out_dir`.
pub fn destination(out_dir: &Path, artifact: &Artifact) -> PathBuf {
    artifact
        .path
        .split('/')
        .fold(out_dir.to_path_buf(), |dest, segment| dest.join(segment))
}

/// Write every artifact under `out_dir`.
///
/// Generated artifacts are always overwritten. Scaffolded artifacts are
/// written only when nothing exists at their destination yet.
pub fn write_artifacts(artifacts: &[Artifact], out_dir: &Path) -> Result<WriteSummary> {
    let mut summary = WriteSummary::default();
    for artifact in artifacts {
        let dest = destination(out_dir, artifact);
        if artifact.kind == ArtifactKind::Scaffolded && dest.exists() {
            warn!("Keeping existing scaffold {:?}", dest);
            summary.skipped += 1;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        fs::write(&dest, &artifact.content)
            .with_context(|| format!("Failed to write output: {:?}", dest))?;
        debug!("Wrote {:?}", dest);
        summary.written += 1;
    }
    info!(
        "Wrote {} file(s) to {:?}, kept {} existing scaffold(s)",
        summary.written, out_dir, summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_splits_segments() {
        let artifact = Artifact::generated("v1/models/models.go", "");
        assert_eq!(
            destination(Path::new("out"), &artifact),
            Path::new("out").join("v1").join("models").join("models.go")
        );
    }
}
