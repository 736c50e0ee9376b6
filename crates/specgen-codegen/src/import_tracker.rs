//! Per-artifact import tracking.
//!
//! An artifact is rendered in two passes. The [`ImportTracker`] first
//! collects everything the artifact's types and helpers reference; it then
//! aggregates them into an [`ImportScope`], which the resolver consults to
//! qualify names with the local import names the aggregation assigned.

use std::sync::Arc;

use specgen_core::import_calculator::{aggregate_imports, local_name_of, ImportDirective, ImportTarget};
use specgen_core::module_registry::{Module, Role};
use specgen_core::naming::Name;
use specgen_core::types::TypeDef;
use tracing::trace;

use crate::error::CodegenError;
use crate::resolver::TypeResolver;

/// Collects the imports of one artifact.
#[derive(Debug)]
pub struct ImportTracker<'a> {
    resolver: &'a TypeResolver,
    current: Arc<Module>,
    referenced: Vec<ImportTarget>,
}

impl<'a> ImportTracker<'a> {
    /// Start tracking for an artifact that lives in `current`
    pub fn new(resolver: &'a TypeResolver, current: Arc<Module>) -> Self {
        Self {
            resolver,
            current,
            referenced: Vec::new(),
        }
    }

    /// Record everything `ty` needs.
    pub fn add_type(&mut self, ty: &TypeDef) -> Result<(), CodegenError> {
        let scope = ImportScope::bare(Arc::clone(&self.current));
        let resolved = self.resolver.resolve(ty, &scope)?;
        self.referenced.extend(resolved.references);
        Ok(())
    }

    pub fn add_types<'t>(
        &mut self,
        types: impl IntoIterator<Item = &'t TypeDef>,
    ) -> Result<(), CodegenError> {
        for ty in types {
            self.add_type(ty)?;
        }
        Ok(())
    }

    pub fn add_library(&mut self, path: &str) {
        self.referenced.push(ImportTarget::library(path));
    }

    /// Record a generated module by role.
    pub fn add_module(&mut self, role: &Role, version: Option<&Name>) -> Arc<Module> {
        let module = self.resolver.registry().module_for(role, version);
        self.referenced.push(ImportTarget::Module(Arc::clone(&module)));
        module
    }

    /// Aggregate into the final import block.
    pub fn finish(self) -> ImportScope {
        let directives = aggregate_imports(self.referenced, &self.current);
        trace!("{} import(s) for {}", directives.len(), self.current);
        ImportScope {
            current: self.current,
            directives,
        }
    }
}

/// The aggregated imports of one artifact.
#[derive(Debug, Clone)]
pub struct ImportScope {
    current: Arc<Module>,
    directives: Vec<ImportDirective>,
}

impl ImportScope {
    /// A scope with no imports; every reference uses its default alias.
    pub fn bare(current: Arc<Module>) -> Self {
        Self {
            current,
            directives: Vec::new(),
        }
    }

    pub fn current(&self) -> &Module {
        &self.current
    }

    pub fn directives(&self) -> &[ImportDirective] {
        &self.directives
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn local_name(&self, module: &Module) -> Option<&str> {
        local_name_of(&self.directives, module)
    }

    pub fn library_name(&self, path: &str) -> Option<&str> {
        self.directives.iter().find_map(|d| match &d.target {
            ImportTarget::Library(p) if p == path => Some(d.local_name()),
            _ => None,
        })
    }
}
