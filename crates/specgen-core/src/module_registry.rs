//! Module registry: assigns a namespace to every generated artifact.
//!
//! Layout under the root module:
//!
//! ```text
//! <root>                      spec-wide routing
//! <root>/enums                enum helpers
//! <root>/empty                the `empty` unit type
//! <root>/errors               shared error responses
//! <root>/errors/models        shared error models
//! <root>/<version>/models     version models
//! <root>/<version>/routing    version routing
//! <root>/<version>/<api>      client and service interface of one api
//! <root>/services/<version>   scaffolded service implementations
//! ```
//!
//! Versions are placed under their flat-case name, apis under their snake-case
//! name. Reserved version and api names (see [`crate::spec`]) keep this
//! mapping collision-free.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::naming::Name;

/// What a module holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Root,
    Enums,
    Empty,
    Errors,
    ErrorModels,
    Models,
    Routing,
    /// Client and service interface of the named api.
    Api(Name),
    Services,
}

impl Role {
    /// Roles whose module does not depend on the version.
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            Role::Root | Role::Enums | Role::Empty | Role::Errors | Role::ErrorModels
        )
    }
}

/// A namespace path: the root module followed by zero or more segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Module {
    root: String,
    segments: Vec<String>,
}

impl Module {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    /// A new module one level below this one.
    pub fn submodule(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self {
            root: self.root.clone(),
            segments,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Segments below the root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Default local name for this module in an import, i.e. its last segment.
    pub fn alias(&self) -> &str {
        match self.segments.last() {
            Some(segment) => segment.as_str(),
            None => self
                .root
                .rsplit(|c: char| c == '/' || c == ':' || c == '.')
                .find(|s| !s.is_empty())
                .unwrap_or(self.root.as_str()),
        }
    }

    /// The segment above the last one, used to disambiguate colliding aliases.
    pub fn parent_alias(&self) -> Option<&str> {
        let len = self.segments.len();
        if len >= 2 {
            Some(self.segments[len - 2].as_str())
        } else {
            None
        }
    }

    /// Directory of the module relative to the output root.
    pub fn dir(&self) -> String {
        self.segments.join("/")
    }

    /// Path of `file` inside this module, relative to the output root.
    pub fn file(&self, file: &str) -> String {
        if self.segments.is_empty() {
            file.to_string()
        } else {
            format!("{}/{}", self.dir(), file)
        }
    }

    /// Fully qualified name with `separator` between root and segments.
    pub fn qualified(&self, separator: &str) -> String {
        let mut parts = vec![self.root.as_str()];
        parts.extend(self.segments.iter().map(String::as_str));
        parts.join(separator)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified("/"))
    }
}

type ModuleKey = (Role, Option<String>);

/// Memoizing `(role, version) -> Module` mapping for one generation run.
///
/// Each key is computed once; later lookups return the same `Arc`, so callers
/// can compare modules by identity as well as by value.
#[derive(Debug)]
pub struct ModuleRegistry {
    root: Module,
    modules: RwLock<HashMap<ModuleKey, Arc<Module>>>,
}

impl ModuleRegistry {
    /// Create a registry rooted at `root_module`
    pub fn new(root_module: impl Into<String>) -> Self {
        Self {
            root: Module::new(root_module),
            modules: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Module {
        &self.root
    }

    /// The module for `role` in `version`.
    ///
    /// Global roles ignore `version`. Versioned roles with no version land
    /// directly under the root.
    pub fn module_for(&self, role: &Role, version: Option<&Name>) -> Arc<Module> {
        let version = if role.is_global() {
            None
        } else {
            version.map(Name::flat_case).filter(|v| !v.is_empty())
        };
        let key = (role.clone(), version);

        if let Some(module) = self
            .modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(module);
        }

        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        let module = modules
            .entry(key)
            .or_insert_with_key(|(role, version)| {
                let module = Arc::new(self.layout(role, version.as_deref()));
                trace!("registered module {} for {:?}", module, role);
                module
            });
        Arc::clone(module)
    }

    fn layout(&self, role: &Role, version: Option<&str>) -> Module {
        let version_module = match version {
            Some(version) => self.root.submodule(version),
            None => self.root.clone(),
        };
        match role {
            Role::Root => self.root.clone(),
            Role::Enums => self.root.submodule("enums"),
            Role::Empty => self.root.submodule("empty"),
            Role::Errors => self.root.submodule("errors"),
            Role::ErrorModels => self.root.submodule("errors").submodule("models"),
            Role::Models => version_module.submodule("models"),
            Role::Routing => version_module.submodule("routing"),
            Role::Api(api) => version_module.submodule(api.snake_case()),
            Role::Services => match version {
                Some(version) => self.root.submodule("services").submodule(version),
                None => self.root.submodule("services"),
            },
        }
    }

    /// Number of distinct modules handed out so far.
    pub fn len(&self) -> usize {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str) -> Name {
        Name::new(name)
    }

    #[test]
    fn test_layout() {
        let registry = ModuleRegistry::new("github.com/acme/pets");
        let v2 = v("v2");
        let cases = [
            (Role::Root, "github.com/acme/pets"),
            (Role::Enums, "github.com/acme/pets/enums"),
            (Role::Empty, "github.com/acme/pets/empty"),
            (Role::Errors, "github.com/acme/pets/errors"),
            (Role::ErrorModels, "github.com/acme/pets/errors/models"),
            (Role::Models, "github.com/acme/pets/v2/models"),
            (Role::Routing, "github.com/acme/pets/v2/routing"),
            (Role::Api(v("petStore")), "github.com/acme/pets/v2/pet_store"),
            (Role::Services, "github.com/acme/pets/services/v2"),
        ];
        for (role, expected) in cases {
            assert_eq!(registry.module_for(&role, Some(&v2)).to_string(), expected);
        }
    }

    #[test]
    fn test_unversioned_models_live_under_root() {
        let registry = ModuleRegistry::new("acme");
        assert_eq!(registry.module_for(&Role::Models, None).dir(), "models");
        assert_eq!(registry.module_for(&Role::Models, Some(&v(""))).dir(), "models");
    }

    #[test]
    fn test_memoized_identity() {
        let registry = ModuleRegistry::new("acme");
        let a = registry.module_for(&Role::Models, Some(&v("v1")));
        let b = registry.module_for(&Role::Models, Some(&v("V1")));
        assert!(Arc::ptr_eq(&a, &b));

        let e1 = registry.module_for(&Role::Enums, Some(&v("v1")));
        let e2 = registry.module_for(&Role::Enums, None);
        assert!(Arc::ptr_eq(&e1, &e2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_distinct_inputs_distinct_modules() {
        let registry = ModuleRegistry::new("acme");
        let v1 = v("v1");
        let mut seen = std::collections::HashSet::new();
        for role in [
            Role::Root,
            Role::Enums,
            Role::Empty,
            Role::Errors,
            Role::ErrorModels,
            Role::Models,
            Role::Routing,
            Role::Api(v("pets")),
            Role::Services,
        ] {
            assert!(seen.insert(registry.module_for(&role, Some(&v1)).to_string()));
        }
    }

    #[test]
    fn test_alias_and_files() {
        let module = Module::new("github.com/acme/pets").submodule("v2").submodule("models");
        assert_eq!(module.alias(), "models");
        assert_eq!(module.parent_alias(), Some("v2"));
        assert_eq!(module.file("models.go"), "v2/models/models.go");
        assert_eq!(module.qualified("::"), "github.com/acme/pets::v2::models");

        let root = Module::new("github.com/acme/pets");
        assert_eq!(root.alias(), "pets");
        assert_eq!(root.parent_alias(), None);
        assert_eq!(root.file("spec_routing.go"), "spec_routing.go");
    }
}
