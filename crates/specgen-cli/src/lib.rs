//! Library interface for specgen CLI components

pub mod output;
pub mod validate;

use anyhow::{Context, Result};
use specgen_core::{Spec, SpecBuilder};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read a JSON specification document and build the validated IR.
pub fn load_spec(path: &Path) -> Result<Spec> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read specification: {:?}", path))?;
    let builder: SpecBuilder = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse specification JSON: {:?}", path))?;
    debug!("Parsed {} version(s) from {:?}", builder.versions.len(), path);
    builder
        .build()
        .with_context(|| format!("Invalid specification: {:?}", path))
}
