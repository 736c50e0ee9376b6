//! Serialization contracts: what generated marshal/unmarshal code must enforce.
//!
//! A contract is data, not code. Every backend renders the same contract
//! into its own language, and `specgen-runtime` interprets it directly over
//! JSON values, so the rules below are stated once:
//!
//! * objects reject a missing or `null` required field, on encode and decode
//! * enums decode only their declared literals, never coercing or defaulting
//! * wrapper unions require exactly one item to be set, on encode and decode
//! * discriminated unions inject the item tag on encode, and on decode read
//!   the tag first and reject a missing or undeclared one

use indexmap::IndexMap;
use tracing::trace;

use crate::naming::Name;
use crate::spec::{ModelKind, NamedModel, Spec};
use crate::types::{ModelRef, ModelScope, TypeDef};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldContract {
    /// Wire key, the field's source name.
    pub key: String,
    pub ty: TypeDef,
    /// Must be present and non-null.
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionCase {
    /// Wire tag (the item's source name), used both as the wrapper key and
    /// as the discriminator value.
    pub tag: String,
    pub ty: TypeDef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnionEncoding {
    /// `{"<tag>": <value>}` with exactly one slot set.
    Wrapper,
    /// The item's own object with `field: "<tag>"` injected.
    Discriminated { field: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SerializationContract {
    Object {
        model: Name,
        fields: Vec<FieldContract>,
    },
    Enum {
        model: Name,
        literals: Vec<String>,
    },
    OneOf {
        model: Name,
        cases: Vec<UnionCase>,
        encoding: UnionEncoding,
    },
}

impl SerializationContract {
    pub fn model(&self) -> &Name {
        match self {
            SerializationContract::Object { model, .. }
            | SerializationContract::Enum { model, .. }
            | SerializationContract::OneOf { model, .. } => model,
        }
    }

    /// Keys checked after encoding and before returning a decoded object.
    pub fn required_fields(&self) -> Vec<&str> {
        match self {
            SerializationContract::Object { fields, .. } => fields
                .iter()
                .filter(|f| f.required)
                .map(|f| f.key.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// True if generated code for this model carries runtime checks at all.
    pub fn has_checks(&self) -> bool {
        match self {
            SerializationContract::Object { fields, .. } => fields.iter().any(|f| f.required),
            SerializationContract::Enum { .. } | SerializationContract::OneOf { .. } => true,
        }
    }

    pub fn case(&self, tag: &str) -> Option<&UnionCase> {
        match self {
            SerializationContract::OneOf { cases, .. } => cases.iter().find(|c| c.tag == tag),
            _ => None,
        }
    }
}

/// Derive the contract of one model.
pub fn synthesize(model: &NamedModel) -> SerializationContract {
    trace!("synthesizing contract for {}", model.name);
    match &model.kind {
        ModelKind::Object { fields } => SerializationContract::Object {
            model: model.name.clone(),
            fields: fields
                .iter()
                .map(|field| FieldContract {
                    key: field.name.source().to_string(),
                    ty: field.ty.clone(),
                    required: field.is_required(),
                })
                .collect(),
        },
        ModelKind::Enum { items } => SerializationContract::Enum {
            model: model.name.clone(),
            literals: items.iter().map(|item| item.value.clone()).collect(),
        },
        ModelKind::OneOf {
            items,
            discriminator,
        } => SerializationContract::OneOf {
            model: model.name.clone(),
            cases: items
                .iter()
                .map(|item| UnionCase {
                    tag: item.name.source().to_string(),
                    ty: item.ty.clone(),
                })
                .collect(),
            encoding: match discriminator {
                Some(field) => UnionEncoding::Discriminated {
                    field: field.clone(),
                },
                None => UnionEncoding::Wrapper,
            },
        },
    }
}

/// Contracts of every model in a specification, in declaration order
/// (error models first).
#[derive(Debug, Clone, Default)]
pub struct ContractSet {
    contracts: IndexMap<(ModelScope, Name), SerializationContract>,
}

impl ContractSet {
    pub fn from_spec(spec: &Spec) -> Self {
        let mut contracts = IndexMap::new();
        for model in &spec.errors().models {
            contracts.insert((ModelScope::Errors, model.name.clone()), synthesize(model));
        }
        for version in spec.versions() {
            for model in &version.models {
                contracts.insert(
                    (ModelScope::Version(version.name.clone()), model.name.clone()),
                    synthesize(model),
                );
            }
        }
        Self { contracts }
    }

    /// Contract of a bound model reference.
    pub fn get(&self, model: &ModelRef) -> Option<&SerializationContract> {
        let scope = model.scope.clone()?;
        self.contracts.get(&(scope, model.name.clone()))
    }

    /// Contract of a model by scope and source name.
    pub fn find(&self, scope: &ModelScope, name: &str) -> Option<&SerializationContract> {
        self.contracts.get(&(scope.clone(), Name::new(name)))
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SerializationContract> {
        self.contracts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EnumItem, Field, Version};
    use pretty_assertions::assert_eq;

    fn ty(expr: &str) -> TypeDef {
        TypeDef::parse(expr).unwrap()
    }

    #[test]
    fn test_object_requiredness() {
        let person = NamedModel::object(
            "Person",
            vec![
                Field::new("name", ty("string")),
                Field::new("age", ty("int32?")),
                Field::new("tags", ty("string[]")),
            ],
        );
        let contract = synthesize(&person);
        assert_eq!(contract.required_fields(), vec!["name", "tags"]);
        assert!(contract.has_checks());
    }

    #[test]
    fn test_object_without_required_fields_has_no_checks() {
        let contract = synthesize(&NamedModel::object(
            "Patch",
            vec![Field::new("name", ty("string?"))],
        ));
        assert!(!contract.has_checks());
    }

    #[test]
    fn test_enum_domain() {
        let color = NamedModel::enumeration(
            "Color",
            vec![EnumItem::new("RED", "red"), EnumItem::new("GREEN", "green")],
        );
        assert_eq!(
            synthesize(&color),
            SerializationContract::Enum {
                model: Name::new("Color"),
                literals: vec!["red".to_string(), "green".to_string()],
            }
        );
    }

    #[test]
    fn test_union_encodings() {
        let items = vec![Field::new("circle", ty("Circle")), Field::new("square", ty("Square"))];
        let wrapper = synthesize(&NamedModel::one_of("Shape", items.clone(), None));
        let SerializationContract::OneOf { encoding, cases, .. } = &wrapper else {
            panic!("expected union");
        };
        assert_eq!(*encoding, UnionEncoding::Wrapper);
        assert_eq!(cases[1].tag, "square");

        let tagged = synthesize(&NamedModel::one_of("Shape", items, Some("kind")));
        let SerializationContract::OneOf { encoding, .. } = &tagged else {
            panic!("expected union");
        };
        assert_eq!(
            *encoding,
            UnionEncoding::Discriminated {
                field: "kind".to_string()
            }
        );
        assert!(tagged.case("circle").is_some());
        assert!(tagged.case("triangle").is_none());
    }

    #[test]
    fn test_contract_set_follows_bound_references() {
        let spec = Spec::builder()
            .error_model(NamedModel::object("Message", vec![Field::new("text", ty("string"))]))
            .version(Version::new("v1").with_model(NamedModel::object(
                "Person",
                vec![Field::new("error", ty("Message?"))],
            )))
            .build()
            .unwrap();
        let contracts = ContractSet::from_spec(&spec);
        assert_eq!(contracts.len(), 2);

        let person = contracts
            .find(&ModelScope::Version(Name::new("v1")), "Person")
            .unwrap();
        let SerializationContract::Object { fields, .. } = person else {
            panic!("expected object");
        };
        let message = fields[0].ty.referenced_models()[0];
        assert_eq!(contracts.get(message).unwrap().model().source(), "Message");
    }
}
