//! Runtime behavior of object, enum and union contracts.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use specgen_core::spec::{EnumItem, Field, NamedModel, Version};
use specgen_core::types::ModelScope;
use specgen_core::{ContractSet, Name, Spec, TypeDef};
use specgen_runtime::{ContractChecker, ContractError};

fn ty(expr: &str) -> TypeDef {
    TypeDef::parse(expr).unwrap()
}

fn shapes(version: &str, discriminator: Option<&str>) -> Version {
    Version::new(version)
        .with_model(NamedModel::object("Circle", vec![Field::new("radius", ty("double"))]))
        .with_model(NamedModel::object("Square", vec![Field::new("side", ty("double"))]))
        .with_model(NamedModel::one_of(
            "Shape",
            vec![
                Field::new("circle", ty("Circle")),
                Field::new("square", ty("Square")),
            ],
            discriminator,
        ))
}

fn spec() -> Spec {
    let v1 = shapes("v1", None)
        .with_model(NamedModel::object(
            "Person",
            vec![
                Field::new("name", ty("string")),
                Field::new("age", ty("int32?")),
            ],
        ))
        .with_model(NamedModel::enumeration(
            "Color",
            vec![EnumItem::new("RED", "red"), EnumItem::new("GREEN", "green")],
        ))
        .with_model(NamedModel::object(
            "Team",
            vec![
                Field::new("members", ty("Person[]")),
                Field::new("colors", ty("Color{}")),
            ],
        ));
    Spec::builder()
        .version(v1)
        .version(shapes("v2", Some("kind")))
        .build()
        .unwrap()
}

fn v1() -> ModelScope {
    ModelScope::Version(Name::new("v1"))
}

fn v2() -> ModelScope {
    ModelScope::Version(Name::new("v2"))
}

#[test]
fn test_object_requiredness() {
    let spec = spec();
    let contracts = ContractSet::from_spec(&spec);
    let checker = ContractChecker::new(&contracts);

    let encoded = checker
        .encode_model(&v1(), "Person", &json!({"name": "Ann"}))
        .unwrap();
    assert_eq!(encoded, json!({"name": "Ann"}));

    let err = checker
        .encode_model(&v1(), "Person", &json!({"age": 5}))
        .unwrap_err();
    assert_eq!(err.error, ContractError::RequiredField("name".to_string()));

    let err = checker
        .decode_model(&v1(), "Person", &json!({"name": null, "age": 5}))
        .unwrap_err();
    assert_eq!(err.error, ContractError::RequiredField("name".to_string()));
}

#[test]
fn test_optional_fields_are_omitted_when_null() {
    let spec = spec();
    let contracts = ContractSet::from_spec(&spec);
    let checker = ContractChecker::new(&contracts);
    let decoded = checker
        .decode_model(&v1(), "Person", &json!({"name": "Ann", "age": null}))
        .unwrap();
    assert_eq!(decoded, json!({"name": "Ann"}));
}

#[test]
fn test_non_strict_skips_required_fields_only() {
    let spec = spec();
    let contracts = ContractSet::from_spec(&spec);
    let checker = ContractChecker::new(&contracts).without_required_checks();

    assert_eq!(
        checker.encode_model(&v1(), "Person", &json!({"age": 5})).unwrap(),
        json!({"age": 5})
    );
    let err = checker
        .decode_model(&v1(), "Color", &json!("blue"))
        .unwrap_err();
    assert_eq!(err.error, ContractError::UnknownEnumValue("blue".to_string()));
}

#[test]
fn test_enum_domain() {
    let spec = spec();
    let contracts = ContractSet::from_spec(&spec);
    let checker = ContractChecker::new(&contracts);

    assert_eq!(
        checker.decode_model(&v1(), "Color", &json!("red")).unwrap(),
        json!("red")
    );
    let err = checker
        .decode_model(&v1(), "Color", &json!("blue"))
        .unwrap_err();
    assert_eq!(err.error, ContractError::UnknownEnumValue("blue".to_string()));
    let err = checker
        .decode_model(&v1(), "Color", &json!("RED"))
        .unwrap_err();
    assert_eq!(err.error, ContractError::UnknownEnumValue("RED".to_string()));
}

#[test]
fn test_wrapper_union_exactly_one_case() {
    let spec = spec();
    let contracts = ContractSet::from_spec(&spec);
    let checker = ContractChecker::new(&contracts);

    let both = json!({"circle": {"radius": 1.0}, "square": {"side": 2.0}});
    let err = checker.encode_model(&v1(), "Shape", &both).unwrap_err();
    assert_eq!(err.error, ContractError::UnionCase);

    let neither = json!({"circle": null});
    let err = checker.encode_model(&v1(), "Shape", &neither).unwrap_err();
    assert_eq!(err.error, ContractError::UnionCase);

    let circle = json!({"circle": {"radius": 1.5}});
    let wire = checker.encode_model(&v1(), "Shape", &circle).unwrap();
    assert_eq!(wire, circle);
    assert_eq!(checker.decode_model(&v1(), "Shape", &wire).unwrap(), circle);

    let err = checker.decode_model(&v1(), "Shape", &both).unwrap_err();
    assert_eq!(err.error, ContractError::UnionCase);
}

#[test]
fn test_discriminated_union() {
    let spec = spec();
    let contracts = ContractSet::from_spec(&spec);
    let checker = ContractChecker::new(&contracts);

    let circle = json!({"circle": {"radius": 1.5}});
    let wire = checker.encode_model(&v2(), "Shape", &circle).unwrap();
    assert_eq!(wire, json!({"kind": "circle", "radius": 1.5}));
    assert_eq!(checker.decode_model(&v2(), "Shape", &wire).unwrap(), circle);

    let err = checker
        .decode_model(&v2(), "Shape", &json!({"kind": "triangle", "side": 1.0}))
        .unwrap_err();
    assert_eq!(
        err.error,
        ContractError::UnknownDiscriminatorValue("triangle".to_string())
    );

    let err = checker
        .decode_model(&v2(), "Shape", &json!({"radius": 1.0}))
        .unwrap_err();
    assert_eq!(err.error, ContractError::MissingDiscriminator("kind".to_string()));

    let err = checker
        .encode_model(&v2(), "Shape", &json!({}))
        .unwrap_err();
    assert_eq!(err.error, ContractError::UnionCase);
}

#[test]
fn test_nested_violations_carry_a_path() {
    let spec = spec();
    let contracts = ContractSet::from_spec(&spec);
    let checker = ContractChecker::new(&contracts);

    let team = json!({
        "members": [{"name": "Ann"}, {"age": 3}],
        "colors": {"home": "red"}
    });
    let err = checker.decode_model(&v1(), "Team", &team).unwrap_err();
    assert_eq!(err.path, "members[1]");
    assert_eq!(err.to_string(), "members[1]: required field missing: name");

    let team = json!({"members": [], "colors": {"away": "blue"}});
    let err = checker.decode_model(&v1(), "Team", &team).unwrap_err();
    assert_eq!(err.path, "colors.away");
}

#[test]
fn test_typed_entry_points() {
    let spec = spec();
    let contracts = ContractSet::from_spec(&spec);
    let checker = ContractChecker::new(&contracts);
    let Some(people) = spec
        .version("v1")
        .and_then(|v| v.models.iter().find(|m| m.name.source() == "Team"))
        .map(|team| team.types()[0].clone())
    else {
        panic!("Team model missing");
    };
    assert_eq!(
        checker
            .decode(&people, &json!([{"name": "Ann", "age": 30}]))
            .unwrap(),
        json!([{"name": "Ann", "age": 30}])
    );
}

proptest! {
    #[test]
    fn prop_person_round_trips(name in "[a-zA-Z ]{0,16}", age in proptest::option::of(0i32..150)) {
        let spec = spec();
        let contracts = ContractSet::from_spec(&spec);
        let checker = ContractChecker::new(&contracts);
        let person = match age {
            Some(age) => json!({"name": name, "age": age}),
            None => json!({"name": name}),
        };
        let wire = checker.encode_model(&v1(), "Person", &person).unwrap();
        prop_assert_eq!(checker.decode_model(&v1(), "Person", &wire).unwrap(), person);
    }
}
