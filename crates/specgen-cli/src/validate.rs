//! Validation of specification documents without generating code

use anyhow::Result;
use specgen_core::Spec;
use std::path::Path;
use tracing::info;

/// Counts reported by `specgen check`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecSummary {
    pub versions: usize,
    pub models: usize,
    pub apis: usize,
    pub operations: usize,
}

impl SpecSummary {
    pub fn of(spec: &Spec) -> Self {
        let mut summary = SpecSummary {
            versions: spec.versions().len(),
            models: spec.errors().models.len(),
            ..Default::default()
        };
        for version in spec.versions() {
            summary.models += version.models.len();
            summary.apis += version.apis.len();
            summary.operations += version.apis.iter().map(|a| a.operations.len()).sum::<usize>();
        }
        summary
    }
}

/// Load and validate the specification at `path`.
pub fn run_check(path: &Path) -> Result<SpecSummary> {
    info!("Validating specification at {:?}", path);
    let spec = crate::load_spec(path)?;
    let summary = SpecSummary::of(&spec);
    info!(
        "✓ {} version(s), {} model(s), {} api(s), {} operation(s)",
        summary.versions, summary.models, summary.apis, summary.operations
    );
    Ok(summary)
}
