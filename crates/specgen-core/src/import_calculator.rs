//! Import aggregation for one generated artifact.
//!
//! Collects the modules and libraries an artifact refers to, drops
//! self-references and duplicates, and gives every import a local name that
//! is unique within the artifact. Output order is first-reference order, so
//! repeated runs over the same input produce the same import block.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::module_registry::Module;

/// Something an artifact can import.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImportTarget {
    /// A module produced by this generation run.
    Module(Arc<Module>),
    /// An external library path, e.g. `github.com/google/uuid`.
    Library(String),
}

impl ImportTarget {
    pub fn library(path: impl Into<String>) -> Self {
        ImportTarget::Library(path.into())
    }

    /// The local name the target gets when no alias is assigned.
    pub fn default_alias(&self) -> &str {
        match self {
            ImportTarget::Module(module) => module.alias(),
            ImportTarget::Library(path) => path
                .rsplit(|c: char| c == '/' || c == ':')
                .find(|s| !s.is_empty())
                .unwrap_or(path.as_str()),
        }
    }

    fn parent_alias(&self) -> Option<&str> {
        match self {
            ImportTarget::Module(module) => module.parent_alias(),
            ImportTarget::Library(path) => {
                let mut parts = path.rsplit('/').filter(|s| !s.is_empty());
                parts.next();
                parts.next()
            }
        }
    }
}

impl fmt::Display for ImportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportTarget::Module(module) => write!(f, "{}", module),
            ImportTarget::Library(path) => f.write_str(path),
        }
    }
}

impl From<Arc<Module>> for ImportTarget {
    fn from(module: Arc<Module>) -> Self {
        ImportTarget::Module(module)
    }
}

/// One entry of an artifact's import block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirective {
    pub target: ImportTarget,
    /// Set only when the default alias collided with an earlier import.
    pub alias: Option<String>,
}

impl ImportDirective {
    /// The name the artifact uses to refer to the import.
    pub fn local_name(&self) -> &str {
        self.alias
            .as_deref()
            .unwrap_or_else(|| self.target.default_alias())
    }
}

/// Aggregate the imports of an artifact that lives in `current`.
///
/// `referenced` is in first-reference order. Self-references and exact
/// duplicates are removed. When two distinct targets share a default alias,
/// the first keeps it and each later one is renamed to its parent segment
/// joined with the alias (`v1models`), then numbered if that is taken too.
pub fn aggregate_imports<I>(referenced: I, current: &Module) -> Vec<ImportDirective>
where
    I: IntoIterator<Item = ImportTarget>,
{
    let unique: IndexSet<ImportTarget> = referenced
        .into_iter()
        .filter(|target| match target {
            ImportTarget::Module(module) => module.as_ref() != current,
            ImportTarget::Library(_) => true,
        })
        .collect();

    let mut taken: HashSet<String> = HashSet::new();
    let mut directives = Vec::with_capacity(unique.len());
    for target in unique {
        let default = target.default_alias().to_string();
        let alias = if taken.insert(default.clone()) {
            None
        } else {
            let base = match target.parent_alias() {
                Some(parent) => format!("{}{}", parent, default),
                None => default.clone(),
            };
            let mut candidate = base.clone();
            let mut counter = 2;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{}{}", base, counter);
                counter += 1;
            }
            Some(candidate)
        };
        directives.push(ImportDirective { target, alias });
    }
    directives
}

/// Local name under which `module` is imported, if it is.
pub fn local_name_of<'a>(directives: &'a [ImportDirective], module: &Module) -> Option<&'a str> {
    directives.iter().find_map(|directive| match &directive.target {
        ImportTarget::Module(m) if m.as_ref() == module => Some(directive.local_name()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_registry::{ModuleRegistry, Role};
    use crate::naming::Name;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn names(directives: &[ImportDirective]) -> Vec<String> {
        directives
            .iter()
            .map(|d| format!("{} {}", d.local_name(), d.target))
            .collect()
    }

    #[test]
    fn test_drops_self_and_duplicates() {
        let registry = ModuleRegistry::new("acme");
        let v1 = Name::new("v1");
        let models = registry.module_for(&Role::Models, Some(&v1));
        let enums = registry.module_for(&Role::Enums, None);
        let imports = aggregate_imports(
            vec![
                ImportTarget::from(Arc::clone(&models)),
                ImportTarget::from(Arc::clone(&enums)),
                ImportTarget::library("encoding/json"),
                ImportTarget::from(Arc::clone(&enums)),
                ImportTarget::library("encoding/json"),
            ],
            &models,
        );
        assert_eq!(names(&imports), vec!["enums acme/enums", "json encoding/json"]);
    }

    #[test]
    fn test_alias_collision_renames_later_module() {
        let registry = ModuleRegistry::new("acme");
        let v1 = Name::new("v1");
        let v2 = Name::new("v2");
        let routing = registry.module_for(&Role::Routing, Some(&v1));
        let referenced = vec![
            ImportTarget::from(registry.module_for(&Role::Models, Some(&v1))),
            ImportTarget::from(registry.module_for(&Role::ErrorModels, None)),
            ImportTarget::from(registry.module_for(&Role::Models, Some(&v2))),
        ];

        let first = aggregate_imports(referenced.clone(), &routing);
        assert_eq!(
            names(&first),
            vec![
                "models acme/v1/models",
                "errorsmodels acme/errors/models",
                "v2models acme/v2/models",
            ]
        );
        assert!(first[0].alias.is_none());

        let second = aggregate_imports(referenced, &routing);
        assert_eq!(first, second);
    }

    #[test]
    fn test_numbered_fallback() {
        let current = Module::new("acme");
        let imports = aggregate_imports(
            vec![
                ImportTarget::library("github.com/a/uuid"),
                ImportTarget::library("github.com/b/uuid"),
                ImportTarget::library("github.com/b/uuid/../b/uuid"),
                ImportTarget::library("x/buuid"),
            ],
            &current,
        );
        let locals: Vec<&str> = imports.iter().map(|d| d.local_name()).collect();
        assert_eq!(locals, vec!["uuid", "buuid", "buuid2", "xbuuid"]);
    }

    #[test]
    fn test_local_name_lookup() {
        let registry = ModuleRegistry::new("acme");
        let v1 = Name::new("v1");
        let v2 = Name::new("v2");
        let m1 = registry.module_for(&Role::Models, Some(&v1));
        let m2 = registry.module_for(&Role::Models, Some(&v2));
        let imports = aggregate_imports(
            vec![ImportTarget::from(Arc::clone(&m1)), ImportTarget::from(Arc::clone(&m2))],
            registry.root(),
        );
        assert_eq!(local_name_of(&imports, &m1), Some("models"));
        assert_eq!(local_name_of(&imports, &m2), Some("v2models"));
        assert_eq!(local_name_of(&imports, registry.root()), None);
    }

    proptest! {
        #[test]
        fn aggregation_is_stable_and_unique(versions in prop::collection::vec("v[0-9]", 1..8)) {
            let registry = ModuleRegistry::new("acme");
            let referenced: Vec<ImportTarget> = versions
                .iter()
                .map(|v| ImportTarget::from(registry.module_for(&Role::Models, Some(&Name::new(v.as_str())))))
                .collect();
            let first = aggregate_imports(referenced.clone(), registry.root());
            let second = aggregate_imports(referenced, registry.root());
            prop_assert_eq!(&first, &second);

            let locals: HashSet<&str> = first.iter().map(|d| d.local_name()).collect();
            prop_assert_eq!(locals.len(), first.len());
        }
    }
}
