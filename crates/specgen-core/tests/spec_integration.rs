//! End-to-end checks of the IR over a JSON specification document

use specgen_core::contract::{SerializationContract, UnionEncoding};
use specgen_core::module_registry::{ModuleRegistry, Role};
use specgen_core::types::ModelScope;
use specgen_core::{aggregate_imports, ContractSet, ImportTarget, Name, SpecBuilder, SpecErrorReason};

const PETSTORE: &str = r#"{
    "errors": {
        "models": [
            {"name": "Message", "kind": "object", "fields": [{"name": "message", "type": "string"}]}
        ],
        "responses": [
            {"status": "bad_request", "type": "Message"},
            {"status": "internal_server_error", "type": "Message"}
        ]
    },
    "versions": [
        {
            "name": "v1",
            "models": [
                {"name": "Color", "kind": "enum", "items": [
                    {"name": "red", "value": "RED"},
                    {"name": "green", "value": "GREEN"}
                ]},
                {"name": "Pet", "kind": "object", "fields": [
                    {"name": "id", "type": "uuid"},
                    {"name": "name", "type": "string"},
                    {"name": "color", "type": "Color?"},
                    {"name": "tags", "type": "string[]"}
                ]},
                {"name": "Circle", "kind": "object", "fields": [{"name": "radius", "type": "double"}]},
                {"name": "Square", "kind": "object", "fields": [{"name": "side", "type": "double"}]},
                {"name": "Shape", "kind": "one_of", "discriminator": "kind", "items": [
                    {"name": "circle", "type": "Circle"},
                    {"name": "square", "type": "Square"}
                ]}
            ],
            "apis": [
                {"name": "pets", "operations": [
                    {
                        "name": "getPet",
                        "endpoint": {"method": "GET", "url": "/pets/{id}", "url_params": [{"name": "id", "type": "uuid"}]},
                        "responses": [{"status": "ok", "type": "Pet"}, {"status": "not_found", "type": "empty"}]
                    },
                    {
                        "name": "createPet",
                        "endpoint": {"method": "POST", "url": "/pets"},
                        "headers": [{"name": "Request-Id", "type": "string?"}],
                        "body": "Pet",
                        "responses": [{"status": "ok", "type": "Pet"}]
                    }
                ]}
            ]
        },
        {
            "name": "v2",
            "models": [
                {"name": "Pet", "kind": "object", "fields": [{"name": "name", "type": "string"}]}
            ]
        }
    ]
}"#;

fn petstore() -> SpecBuilder {
    serde_json::from_str(PETSTORE).expect("petstore document parses")
}

#[test]
fn test_petstore_builds() {
    let spec = petstore().build().expect("petstore is valid");
    assert_eq!(spec.versions().len(), 2);
    assert_eq!(spec.errors().responses.len(), 2);

    let contracts = ContractSet::from_spec(&spec);
    assert_eq!(contracts.len(), 7);

    let shape = contracts
        .find(&ModelScope::Version(Name::new("v1")), "Shape")
        .unwrap();
    assert!(matches!(
        shape,
        SerializationContract::OneOf {
            encoding: UnionEncoding::Discriminated { .. },
            ..
        }
    ));
}

#[test]
fn test_duplicate_model_rejected_before_anything_else() {
    let mut builder = petstore();
    let duplicate = builder.versions[0].models[1].clone();
    builder.versions[0].models.push(duplicate);

    let err = builder.build().unwrap_err();
    assert_eq!(err.path.to_string(), "version.v1.model.Pet");
    assert!(matches!(err.reason, SpecErrorReason::DuplicateName { kind: "model", .. }));
}

#[test]
fn test_version_models_resolve_to_their_own_module() {
    let spec = petstore().build().unwrap();
    let registry = ModuleRegistry::new("github.com/acme/pets");

    let v1 = &spec.versions()[0];
    let api_module = registry.module_for(&Role::Api(v1.apis[0].name.clone()), Some(&v1.name));

    let mut referenced = Vec::new();
    for operation in &v1.apis[0].operations {
        for ty in operation.types() {
            for model in ty.referenced_models() {
                let role = match &model.scope {
                    Some(ModelScope::Errors) => Role::ErrorModels,
                    _ => Role::Models,
                };
                referenced.push(ImportTarget::from(registry.module_for(&role, Some(&v1.name))));
            }
        }
    }
    let imports = aggregate_imports(referenced, &api_module);
    let paths: Vec<String> = imports.iter().map(|i| i.target.to_string()).collect();
    assert_eq!(paths, vec!["github.com/acme/pets/v1/models"]);
}
