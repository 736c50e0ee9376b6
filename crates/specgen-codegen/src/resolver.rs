//! Type resolution: specification type expressions to target type expressions.
//!
//! All per-language knowledge lives in a [`TargetTable`]: one mapping per
//! primitive keyword, one nullable policy, the array and map wrappers and the
//! qualifier separator. [`TypeResolver`] walks a [`TypeDef`] with a single
//! fold and consults the table; it never branches on the target language.

use std::sync::Arc;

use indexmap::IndexMap;
use specgen_core::import_calculator::ImportTarget;
use specgen_core::module_registry::{Module, ModuleRegistry, Role};
use specgen_core::types::{ModelRef, ModelScope, Primitive, TypeDef, TypeFolder};
use specgen_core::EntityPath;
use tracing::trace;

use crate::error::CodegenError;
use crate::import_tracker::ImportScope;

/// Where the target spelling of a primitive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveSource {
    /// Language keyword or fully qualified path; needs no import.
    Builtin,
    /// Type exported by an external library, qualified by its import name.
    Library(String),
    /// Type exported by a generated global module.
    Module(Role),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveMapping {
    pub name: String,
    pub source: PrimitiveSource,
}

impl PrimitiveMapping {
    pub fn builtin(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source: PrimitiveSource::Builtin,
        }
    }

    pub fn library(library: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            source: PrimitiveSource::Library(library.to_string()),
        }
    }

    pub fn module(role: Role, name: &str) -> Self {
        Self {
            name: name.to_string(),
            source: PrimitiveSource::Module(role),
        }
    }
}

/// `prefix + inner + suffix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrapper {
    pub prefix: String,
    pub suffix: String,
}

impl Wrapper {
    pub fn new(prefix: &str, suffix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    pub fn wrap(&self, inner: &str) -> String {
        format!("{}{}{}", self.prefix, inner, self.suffix)
    }
}

/// How `Nullable(child)` is expressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NullablePolicy {
    /// Pointer-to-value for plain children; arrays and maps are already
    /// nil-able and stay unchanged.
    PointerForPlain(String),
    /// The language's own optional construct around any child.
    Native(Wrapper),
}

/// Immutable per-target type table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTable {
    primitives: IndexMap<Primitive, PrimitiveMapping>,
    pub nullable: NullablePolicy,
    pub array: Wrapper,
    pub map: Wrapper,
    /// Separator between an import name and a member, `.` or `::`.
    pub qualifier: String,
}

impl TargetTable {
    /// Build a table; `primitives` must cover every keyword.
    pub fn new(
        primitives: impl IntoIterator<Item = (Primitive, PrimitiveMapping)>,
        nullable: NullablePolicy,
        array: Wrapper,
        map: Wrapper,
        qualifier: &str,
    ) -> Self {
        Self {
            primitives: primitives.into_iter().collect(),
            nullable,
            array,
            map,
            qualifier: qualifier.to_string(),
        }
    }

    pub fn primitive(&self, primitive: Primitive) -> Option<&PrimitiveMapping> {
        self.primitives.get(&primitive)
    }

    /// Keywords without a mapping, in keyword order.
    pub fn missing_primitives(&self) -> Vec<Primitive> {
        Primitive::ALL
            .into_iter()
            .filter(|p| !self.primitives.contains_key(p))
            .collect()
    }

    pub fn qualify(&self, import: &str, member: &str) -> String {
        format!("{}{}{}", import, self.qualifier, member)
    }
}

/// A resolved type expression and what it needs imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    pub expression: String,
    pub references: Vec<ImportTarget>,
}

/// Resolves types for one target within one generation run.
#[derive(Debug, Clone)]
pub struct TypeResolver {
    table: TargetTable,
    registry: Arc<ModuleRegistry>,
}

impl TypeResolver {
    pub fn new(table: TargetTable, registry: Arc<ModuleRegistry>) -> Self {
        Self { table, registry }
    }

    pub fn table(&self) -> &TargetTable {
        &self.table
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Module that declares a bound model.
    pub fn model_module(&self, model: &ModelRef) -> Result<Arc<Module>, CodegenError> {
        match &model.scope {
            Some(ModelScope::Version(version)) => {
                Ok(self.registry.module_for(&Role::Models, Some(version)))
            }
            Some(ModelScope::Errors) => Ok(self.registry.module_for(&Role::ErrorModels, None)),
            None => Err(CodegenError::resolution(
                EntityPath::root().child("model", model.name.source()),
                format!("unbound model reference '{}'", model.name),
            )),
        }
    }

    /// Resolve `ty` for an artifact whose imports are `scope`.
    pub fn resolve(&self, ty: &TypeDef, scope: &ImportScope) -> Result<ResolvedType, CodegenError> {
        let mut folder = Resolve {
            resolver: self,
            scope,
            references: Vec::new(),
        };
        let expression = ty.fold(&mut folder)?;
        trace!("resolved {} -> {}", ty, expression);
        Ok(ResolvedType {
            expression,
            references: folder.references,
        })
    }

    /// Shorthand for the expression alone.
    pub fn expr(&self, ty: &TypeDef, scope: &ImportScope) -> Result<String, CodegenError> {
        Ok(self.resolve(ty, scope)?.expression)
    }

    /// Type name of a model as seen from `scope`.
    pub fn model_name(&self, model: &ModelRef, scope: &ImportScope) -> Result<String, CodegenError> {
        let module = self.model_module(model)?;
        Ok(self.member(&module, &model.name.pascal_case(), scope))
    }

    /// `member` of `module`, qualified unless `scope` is that module.
    pub fn member(&self, module: &Module, member: &str, scope: &ImportScope) -> String {
        if module == scope.current() {
            member.to_string()
        } else {
            let import = scope.local_name(module).unwrap_or_else(|| module.alias());
            self.table.qualify(import, member)
        }
    }

    fn primitive_target(&self, mapping: &PrimitiveMapping) -> Option<ImportTarget> {
        match &mapping.source {
            PrimitiveSource::Builtin => None,
            PrimitiveSource::Library(path) => Some(ImportTarget::Library(path.clone())),
            PrimitiveSource::Module(role) => {
                Some(ImportTarget::Module(self.registry.module_for(role, None)))
            }
        }
    }
}

struct Resolve<'a> {
    resolver: &'a TypeResolver,
    scope: &'a ImportScope,
    references: Vec<ImportTarget>,
}

impl Resolve<'_> {
    fn record(&mut self, target: ImportTarget) {
        let is_current = matches!(&target, ImportTarget::Module(m) if m.as_ref() == self.scope.current());
        if !is_current && !self.references.contains(&target) {
            self.references.push(target);
        }
    }
}

impl TypeFolder for Resolve<'_> {
    type Output = String;
    type Error = CodegenError;

    fn primitive(&mut self, primitive: Primitive) -> Result<String, CodegenError> {
        let resolver = self.resolver;
        let mapping = resolver.table.primitive(primitive).ok_or_else(|| {
            CodegenError::resolution(
                EntityPath::root(),
                format!("primitive '{}' has no mapping in the target table", primitive),
            )
        })?;
        let expression = match &mapping.source {
            PrimitiveSource::Builtin => mapping.name.clone(),
            PrimitiveSource::Library(path) => {
                let import = match self.scope.library_name(path) {
                    Some(name) => name.to_string(),
                    None => ImportTarget::Library(path.clone()).default_alias().to_string(),
                };
                resolver.table.qualify(&import, &mapping.name)
            }
            PrimitiveSource::Module(role) => {
                let module = resolver.registry.module_for(role, None);
                resolver.member(&module, &mapping.name, self.scope)
            }
        };
        if let Some(target) = resolver.primitive_target(mapping) {
            self.record(target);
        }
        Ok(expression)
    }

    fn model(&mut self, model: &ModelRef) -> Result<String, CodegenError> {
        let module = self.resolver.model_module(model)?;
        let expression = self
            .resolver
            .member(&module, &model.name.pascal_case(), self.scope);
        self.record(ImportTarget::Module(module));
        Ok(expression)
    }

    fn nullable(&mut self, child: &TypeDef, inner: String) -> Result<String, CodegenError> {
        Ok(match &self.resolver.table.nullable {
            NullablePolicy::PointerForPlain(pointer) => match child {
                TypeDef::Plain(_) => format!("{}{}", pointer, inner),
                _ => inner,
            },
            NullablePolicy::Native(wrapper) => wrapper.wrap(&inner),
        })
    }

    fn array(&mut self, _child: &TypeDef, inner: String) -> Result<String, CodegenError> {
        Ok(self.resolver.table.array.wrap(&inner))
    }

    fn map(&mut self, _child: &TypeDef, inner: String) -> Result<String, CodegenError> {
        Ok(self.resolver.table.map.wrap(&inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{go, rust, typescript};
    use crate::import_tracker::ImportTracker;
    use proptest::prelude::*;
    use specgen_core::naming::Name;

    fn bound(expr: &str, version: &str) -> TypeDef {
        let ty = TypeDef::parse(expr).unwrap();
        struct Bind(ModelScope);
        impl TypeFolder for Bind {
            type Output = TypeDef;
            type Error = ();
            fn primitive(&mut self, p: Primitive) -> Result<TypeDef, ()> {
                Ok(TypeDef::primitive(p))
            }
            fn model(&mut self, m: &ModelRef) -> Result<TypeDef, ()> {
                Ok(TypeDef::Plain(specgen_core::types::PlainType::Model(ModelRef {
                    name: m.name.clone(),
                    scope: Some(self.0.clone()),
                })))
            }
            fn nullable(&mut self, _: &TypeDef, i: TypeDef) -> Result<TypeDef, ()> {
                Ok(TypeDef::nullable(i))
            }
            fn array(&mut self, _: &TypeDef, i: TypeDef) -> Result<TypeDef, ()> {
                Ok(TypeDef::array(i))
            }
            fn map(&mut self, _: &TypeDef, i: TypeDef) -> Result<TypeDef, ()> {
                Ok(TypeDef::map(i))
            }
        }
        ty.fold(&mut Bind(ModelScope::Version(Name::new(version))))
            .unwrap()
    }

    fn resolver(table: TargetTable) -> TypeResolver {
        TypeResolver::new(table, Arc::new(ModuleRegistry::new("acme")))
    }

    fn resolve_in(resolver: &TypeResolver, ty: &TypeDef, role: Role) -> String {
        let current = resolver.registry().module_for(&role, Some(&Name::new("v1")));
        let mut tracker = ImportTracker::new(resolver, current);
        tracker.add_type(ty).unwrap();
        let scope = tracker.finish();
        resolver.expr(ty, &scope).unwrap()
    }

    #[test]
    fn test_go_expressions() {
        let r = resolver(go::table());
        let in_api = |e: &str| resolve_in(&r, &bound(e, "v1"), Role::Api(Name::new("pets")));
        assert_eq!(in_api("int32"), "int");
        assert_eq!(in_api("int64?"), "*int64");
        assert_eq!(in_api("string[]?"), "[]string");
        assert_eq!(in_api("Pet"), "models.Pet");
        assert_eq!(in_api("Pet?"), "*models.Pet");
        assert_eq!(in_api("Pet{}"), "map[string]models.Pet");
        assert_eq!(in_api("uuid"), "uuid.UUID");
        assert_eq!(in_api("date"), "civil.Date");
        assert_eq!(in_api("empty"), "empty.Type");

        let in_models = resolve_in(&r, &bound("Pet[]", "v1"), Role::Models);
        assert_eq!(in_models, "[]Pet");
    }

    #[test]
    fn test_rust_expressions() {
        let r = resolver(rust::table());
        let in_api = |e: &str| resolve_in(&r, &bound(e, "v1"), Role::Api(Name::new("pets")));
        assert_eq!(in_api("int32?"), "Option<i32>");
        assert_eq!(in_api("string[]?"), "Option<Vec<String>>");
        assert_eq!(in_api("Pet{}"), "std::collections::BTreeMap<String, models::Pet>");
        assert_eq!(in_api("decimal"), "rust_decimal::Decimal");
    }

    #[test]
    fn test_typescript_expressions() {
        let r = resolver(typescript::table());
        let in_api = |e: &str| resolve_in(&r, &bound(e, "v1"), Role::Api(Name::new("pets")));
        assert_eq!(in_api("int64?"), "number | null");
        assert_eq!(in_api("string?[]"), "Array<string | null>");
        assert_eq!(in_api("Pet{}"), "Record<string, models.Pet>");
    }

    #[test]
    fn test_records_referenced_modules() {
        let r = resolver(go::table());
        let scope = ImportScope::bare(r.registry().module_for(&Role::Routing, Some(&Name::new("v1"))));
        let resolved = r.resolve(&bound("Pet{}?", "v1"), &scope).unwrap();
        assert_eq!(resolved.references.len(), 1);
        assert_eq!(resolved.references[0].to_string(), "acme/v1/models");
    }

    #[test]
    fn test_colliding_models_use_assigned_alias() {
        let r = resolver(go::table());
        let current = r.registry().module_for(&Role::Routing, Some(&Name::new("v2")));
        let v1_pet = bound("Pet", "v1");
        let v2_pet = bound("Pet", "v2");
        let mut tracker = ImportTracker::new(&r, current);
        tracker.add_type(&v1_pet).unwrap();
        tracker.add_type(&v2_pet).unwrap();
        let scope = tracker.finish();
        assert_eq!(r.expr(&v1_pet, &scope).unwrap(), "models.Pet");
        assert_eq!(r.expr(&v2_pet, &scope).unwrap(), "v2models.Pet");
    }

    #[test]
    fn test_unbound_reference_is_a_resolution_error() {
        let r = resolver(go::table());
        let scope = ImportScope::bare(Arc::new(Module::new("acme")));
        let err = r.resolve(&TypeDef::parse("Ghost").unwrap(), &scope).unwrap_err();
        assert!(matches!(err, CodegenError::Resolution { .. }));
    }

    #[test]
    fn test_tables_are_complete() {
        for table in [go::table(), rust::table(), typescript::table()] {
            assert!(table.missing_primitives().is_empty());
        }
    }

    fn type_expr() -> impl Strategy<Value = String> {
        let leaf = prop::sample::select(vec![
            "int32", "int64", "float", "double", "decimal", "boolean", "string", "uuid", "date",
            "datetime", "json", "Pet",
        ])
        .prop_map(str::to_string);
        leaf.prop_recursive(4, 16, 1, |inner| {
            prop_oneof![
                inner.clone().prop_map(|t| format!("{}[]", t)),
                inner.clone().prop_map(|t| format!("{}{{}}", t)),
                inner.prop_map(|t| if t.ends_with('?') { t } else { format!("{}?", t) }),
            ]
        })
    }

    proptest! {
        #[test]
        fn resolution_is_total(expr in type_expr()) {
            let ty = bound(&expr, "v1");
            for table in [go::table(), rust::table(), typescript::table()] {
                let r = resolver(table);
                let scope = ImportScope::bare(r.registry().module_for(&Role::Routing, Some(&Name::new("v1"))));
                let resolved = r.resolve(&ty, &scope);
                prop_assert!(resolved.is_ok());
                let expression = resolved.unwrap().expression;
                prop_assert!(!expression.is_empty());
                prop_assert_eq!(expression.matches('<').count(), expression.matches('>').count());
            }
        }
    }
}
