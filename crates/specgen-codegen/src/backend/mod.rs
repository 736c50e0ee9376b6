//! Per-target emission backends.
//!
//! The set of backends is closed: [`backend_for`] maps each [`Target`] to
//! one implementation of [`Backend`]. Backends only render text. Walking the
//! specification, choosing which families to emit, and collecting the
//! artifacts is the coordinator's job (see [`crate::emitter`]).

pub mod go;
pub mod rust;
pub mod typescript;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use specgen_core::contract::{ContractSet, SerializationContract};
use specgen_core::module_registry::{Module, ModuleRegistry, Role};
use specgen_core::naming::Name;
use specgen_core::spec::{Api, NamedModel, NamedOperation, Param, Response, Spec, Version};
use specgen_core::types::{ModelScope, Primitive, TypeDef};
use specgen_core::EntityPath;

use crate::artifact::ArtifactSet;
use crate::config::{GeneratorConfig, Target};
use crate::error::CodegenError;
use crate::import_tracker::ImportTracker;
use crate::resolver::{TargetTable, TypeResolver};

/// Everything a backend needs while emitting one specification.
#[derive(Debug)]
pub struct EmitContext<'a> {
    pub spec: &'a Spec,
    pub config: &'a GeneratorConfig,
    pub resolver: TypeResolver,
    pub contracts: ContractSet,
}

impl<'a> EmitContext<'a> {
    pub fn new(spec: &'a Spec, config: &'a GeneratorConfig, table: TargetTable) -> Self {
        let registry = Arc::new(ModuleRegistry::new(config.root_module()));
        Self {
            spec,
            config,
            resolver: TypeResolver::new(table, registry),
            contracts: ContractSet::from_spec(spec),
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        self.resolver.registry()
    }

    pub fn module(&self, role: &Role, version: Option<&Name>) -> Arc<Module> {
        self.resolver.registry().module_for(role, version)
    }

    pub fn tracker(&self, current: &Arc<Module>) -> ImportTracker<'_> {
        ImportTracker::new(&self.resolver, Arc::clone(current))
    }

    /// Contract of a model declared in `scope`.
    pub fn contract(
        &self,
        scope: &ModelScope,
        model: &NamedModel,
    ) -> Result<&SerializationContract, CodegenError> {
        self.contracts
            .find(scope, model.name.source())
            .ok_or_else(|| {
                CodegenError::resolution(
                    EntityPath::root().child("model", model.name.source()),
                    "serialization contract",
                )
            })
    }
}

/// One target language's emission capability.
pub trait Backend {
    fn target(&self) -> Target;

    /// The target's primitive and composition table.
    fn table(&self) -> TargetTable;

    /// Global helpers: enum decoding, the `empty` type.
    fn helpers(&self, cx: &EmitContext<'_>, out: &mut ArtifactSet) -> Result<(), CodegenError>;

    /// Models of one scope (a version or the shared error models).
    fn models(
        &self,
        cx: &EmitContext<'_>,
        scope: &ModelScope,
        models: &[NamedModel],
        module: &Arc<Module>,
        out: &mut ArtifactSet,
    ) -> Result<(), CodegenError>;

    /// Typed error responses shared by clients and services.
    fn errors(&self, cx: &EmitContext<'_>, out: &mut ArtifactSet) -> Result<(), CodegenError>;

    /// Multi-response sum types of one api.
    fn responses(
        &self,
        cx: &EmitContext<'_>,
        version: &Version,
        api: &Api,
        out: &mut ArtifactSet,
    ) -> Result<(), CodegenError>;

    fn client(
        &self,
        cx: &EmitContext<'_>,
        version: &Version,
        api: &Api,
        out: &mut ArtifactSet,
    ) -> Result<(), CodegenError>;

    /// Service interfaces and routing of one version.
    fn service(
        &self,
        cx: &EmitContext<'_>,
        version: &Version,
        out: &mut ArtifactSet,
    ) -> Result<(), CodegenError>;

    /// Scaffolded implementation of one api.
    fn scaffold(
        &self,
        cx: &EmitContext<'_>,
        version: &Version,
        api: &Api,
        out: &mut ArtifactSet,
    ) -> Result<(), CodegenError>;

    /// Spec-wide artifacts emitted last (root routing, module indexes).
    fn finish(&self, _cx: &EmitContext<'_>, _out: &mut ArtifactSet) -> Result<(), CodegenError> {
        Ok(())
    }
}

pub fn backend_for(target: Target) -> Box<dyn Backend> {
    match target {
        Target::Go => Box::new(go::GoBackend),
        Target::Rust => Box::new(rust::RustBackend),
        Target::TypeScript => Box::new(typescript::TypeScriptBackend),
    }
}

/// Name of the sum type of a multi-response operation.
pub fn response_type_name(operation: &NamedOperation) -> String {
    format!("{}Response", operation.name.pascal_case())
}

/// Url, query and header parameters in declaration order.
pub fn operation_params(operation: &NamedOperation) -> impl Iterator<Item = &Param> {
    operation
        .endpoint
        .url_params
        .iter()
        .chain(operation.query.iter())
        .chain(operation.headers.iter())
}

/// Body type of a response, `empty` when it declares none.
pub fn response_body(response: &Response) -> TypeDef {
    response
        .body
        .clone()
        .unwrap_or_else(|| TypeDef::primitive(Primitive::Empty))
}

/// Responses of an operation with their HTTP codes.
pub fn responses_with_codes(
    operation: &NamedOperation,
) -> impl Iterator<Item = (&Response, u16)> + '_ {
    operation
        .responses
        .iter()
        .filter_map(|r| r.status_code().map(|code| (r, code)))
}

/// `url` with every `{param}` placeholder rewritten by `rename`.
pub fn rewrite_url(url: &str, rename: impl Fn(&str) -> String) -> String {
    let mut result = String::with_capacity(url.len());
    let mut rest = url;
    while let Some(start) = rest.find('{') {
        result.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                result.push_str(&rename(&after[..end]));
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

/// Url of an operation as mounted by the routing of `version`.
pub fn versioned_url(version: &Version, operation: &NamedOperation) -> String {
    let version = version.name.flat_case();
    if version.is_empty() {
        operation.endpoint.url.clone()
    } else {
        format!("/{}{}", version, operation.endpoint.url)
    }
}

/// Children of one output directory, for index files.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DirEntries {
    pub dirs: BTreeSet<String>,
    /// File stems, extension removed.
    pub files: BTreeSet<String>,
}

/// Every directory holding a `.<extension>` artifact (and all of its
/// ancestors, the output root being `""`) with its children. Files named
/// `index_stem` are left out.
pub fn directory_index<'p>(
    paths: impl IntoIterator<Item = &'p str>,
    extension: &str,
    index_stem: &str,
) -> BTreeMap<String, DirEntries> {
    let suffix = format!(".{}", extension);
    let mut tree: BTreeMap<String, DirEntries> = BTreeMap::new();
    for path in paths {
        let Some(stem_path) = path.strip_suffix(&suffix) else {
            continue;
        };
        let mut parts: Vec<&str> = stem_path.split('/').collect();
        let Some(stem) = parts.pop() else {
            continue;
        };
        if stem != index_stem {
            tree.entry(parts.join("/")).or_default().files.insert(stem.to_string());
        }
        while let Some(child) = parts.pop() {
            tree.entry(parts.join("/"))
                .or_default()
                .dirs
                .insert(child.to_string());
        }
    }
    tree
}

/// `file` inside `dir`, `dir` being `""` for the output root.
pub fn join_path(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", dir, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_index() {
        let tree = directory_index(
            [
                "v1/models/models.rs",
                "v1/pets/client.rs",
                "v1/pets/service.rs",
                "routing.rs",
                "v1/pets/mod.rs",
                "README.md",
            ],
            "rs",
            "mod",
        );
        let dirs: Vec<&str> = tree.keys().map(String::as_str).collect();
        assert_eq!(dirs, vec!["", "v1", "v1/models", "v1/pets"]);
        assert_eq!(tree[""].files.iter().collect::<Vec<_>>(), vec!["routing"]);
        assert_eq!(tree["v1"].dirs.iter().collect::<Vec<_>>(), vec!["models", "pets"]);
        assert_eq!(
            tree["v1/pets"].files.iter().collect::<Vec<_>>(),
            vec!["client", "service"]
        );
    }

    #[test]
    fn test_rewrite_url() {
        assert_eq!(
            rewrite_url("/owners/{owner_id}/pets/{id}", |p| format!(":{}", p)),
            "/owners/:owner_id/pets/:id"
        );
        assert_eq!(rewrite_url("/pets", |p| p.to_string()), "/pets");
        assert_eq!(rewrite_url("/broken/{id", |p| p.to_string()), "/broken/{id");
    }
}
