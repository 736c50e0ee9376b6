//! Emission coordinator: one walk over a validated specification producing
//! the complete, ordered artifact set for one target.

use specgen_core::module_registry::Role;
use specgen_core::spec::Spec;
use specgen_core::types::ModelScope;
use tracing::{debug, info, instrument};

use crate::artifact::{Artifact, ArtifactSet};
use crate::backend::{backend_for, EmitContext};
use crate::config::GeneratorConfig;
use crate::error::CodegenError;

/// Generate every artifact `config` asks for.
///
/// Artifacts come back in emission order: global helpers, shared errors,
/// then each version in declaration order (models, then per api responses
/// and clients, then service routing, then scaffolds), then spec-wide
/// indexes. The first error aborts the run; no partial set is returned.
#[instrument(skip_all, fields(target = %config.target()))]
pub fn generate(spec: &Spec, config: &GeneratorConfig) -> Result<Vec<Artifact>, CodegenError> {
    let backend = backend_for(config.target());
    let cx = EmitContext::new(spec, config, backend.table());
    let outputs = config.outputs();
    let mut out = ArtifactSet::new();

    info!(
        "generating {} code for {} version(s) under '{}'",
        config.target(),
        spec.versions().len(),
        config.root_module()
    );

    if outputs.needs_models() {
        backend.helpers(&cx, &mut out)?;
        let error_models = &spec.errors().models;
        let module = cx.module(&Role::ErrorModels, None);
        backend.models(&cx, &ModelScope::Errors, error_models, &module, &mut out)?;
    }
    if outputs.needs_responses() {
        backend.errors(&cx, &mut out)?;
    }

    for version in spec.versions() {
        debug!(
            "version '{}': {} model(s), {} api(s)",
            version.name,
            version.models.len(),
            version.apis.len()
        );
        if outputs.needs_models() {
            let scope = ModelScope::Version(version.name.clone());
            let module = cx.module(&Role::Models, Some(&version.name));
            backend.models(&cx, &scope, &version.models, &module, &mut out)?;
        }
        for api in &version.apis {
            if outputs.needs_responses() {
                backend.responses(&cx, version, api, &mut out)?;
            }
            if outputs.client {
                backend.client(&cx, version, api, &mut out)?;
            }
        }
        if outputs.needs_service() {
            backend.service(&cx, version, &mut out)?;
        }
        if outputs.scaffold {
            for api in &version.apis {
                backend.scaffold(&cx, version, api, &mut out)?;
            }
        }
    }

    backend.finish(&cx, &mut out)?;
    info!("generated {} artifact(s)", out.len());
    Ok(out.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputSet, Target};
    use specgen_core::spec::{Field, NamedModel, Version};
    use specgen_core::TypeDef;

    fn spec() -> Spec {
        Spec::builder()
            .version(Version::new("v1").with_model(NamedModel::object(
                "Pet",
                vec![Field::new("name", TypeDef::parse("string").unwrap())],
            )))
            .build()
            .unwrap()
    }

    #[test]
    fn test_models_only() {
        let config = GeneratorConfig::builder(Target::Go, "github.com/acme/pets")
            .outputs("models".parse::<OutputSet>().unwrap())
            .build()
            .unwrap();
        let artifacts = generate(&spec(), &config).unwrap();
        let paths: Vec<&str> = artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["enums/helpers.go", "empty/empty.go", "v1/models/models.go"]
        );
    }

    #[test]
    fn test_nothing_requested() {
        let config = GeneratorConfig::builder(Target::Go, "acme")
            .outputs(OutputSet::none())
            .build()
            .unwrap();
        assert!(generate(&spec(), &config).unwrap().is_empty());
    }
}
