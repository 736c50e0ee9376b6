//! The specification IR and its constructor-time validation.
//!
//! A [`SpecBuilder`] is the raw, unvalidated document as produced by an
//! external parser (it deserializes from JSON). [`SpecBuilder::build`] runs
//! every invariant check and binds every model reference to its declaring
//! scope, returning an immutable [`Spec`]. The first violation aborts
//! construction, so no partially validated IR ever reaches resolution or
//! emission.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EntityPath, SpecError, SpecErrorReason};
use crate::naming::Name;
use crate::types::{ModelRef, ModelScope, PlainType, Primitive, TypeDef, TypeFolder};

/// Module names owned by global artifacts; no version may take them.
pub const RESERVED_VERSION_NAMES: [&str; 4] = ["enums", "empty", "errors", "services"];

/// Module names owned by per-version artifacts; no API may take them.
pub const RESERVED_API_NAMES: [&str; 2] = ["models", "routing"];

/// Keys that serialization layers of the supported targets claim for
/// themselves; a discriminator cannot use them.
pub const RESERVED_SERIALIZATION_KEYS: [&str; 5] = ["$type", "@type", "__typename", "$ref", "_links"];

/// Known response status tags and their HTTP codes.
pub const STATUS_CODES: [(&str, u16); 12] = [
    ("ok", 200),
    ("created", 201),
    ("accepted", 202),
    ("no_content", 204),
    ("bad_request", 400),
    ("unauthorized", 401),
    ("forbidden", 403),
    ("not_found", 404),
    ("conflict", 409),
    ("unprocessable_entity", 422),
    ("internal_server_error", 500),
    ("service_unavailable", 503),
];

/// HTTP code for a status tag.
pub fn status_code(tag: &str) -> Option<u16> {
    STATUS_CODES
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, code)| *code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: Name,
    #[serde(rename = "type")]
    pub ty: TypeDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<Name>, ty: TypeDef) -> Self {
        Self {
            name: name.into(),
            ty,
            description: None,
        }
    }

    /// Present and non-null on the wire.
    pub fn is_required(&self) -> bool {
        self.ty.is_required()
    }
}

/// A union member; the name doubles as the discriminator tag.
pub type OneOfItem = Field;

/// A parameter of an operation (url, query or header).
pub type Param = Field;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumItem {
    pub name: Name,
    pub value: String,
}

impl EnumItem {
    pub fn new(name: impl Into<Name>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    Object {
        fields: Vec<Field>,
    },
    OneOf {
        items: Vec<OneOfItem>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        discriminator: Option<String>,
    },
    Enum {
        items: Vec<EnumItem>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedModel {
    pub name: Name,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: ModelKind,
}

impl NamedModel {
    pub fn object(name: impl Into<Name>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind: ModelKind::Object { fields },
        }
    }

    pub fn one_of(
        name: impl Into<Name>,
        items: Vec<OneOfItem>,
        discriminator: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind: ModelKind::OneOf {
                items,
                discriminator: discriminator.map(str::to_string),
            },
        }
    }

    pub fn enumeration(name: impl Into<Name>, items: Vec<EnumItem>) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind: ModelKind::Enum { items },
        }
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, ModelKind::Enum { .. })
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, ModelKind::Object { .. })
    }

    /// Every type expression declared directly by this model.
    pub fn types(&self) -> Vec<&TypeDef> {
        match &self.kind {
            ModelKind::Object { fields } => fields.iter().map(|f| &f.ty).collect(),
            ModelKind::OneOf { items, .. } => items.iter().map(|i| &i.ty).collect(),
            ModelKind::Enum { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Name,
    /// `None` is an empty body.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub body: Option<TypeDef>,
}

impl Response {
    pub fn new(status: impl Into<Name>, body: Option<TypeDef>) -> Self {
        Self {
            status: status.into(),
            body,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        status_code(self.status.source())
    }

    pub fn is_empty(&self) -> bool {
        self.body.as_ref().map_or(true, TypeDef::is_empty_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: HttpMethod,
    /// Url template with `{param}` placeholders.
    pub url: String,
    #[serde(default)]
    pub url_params: Vec<Param>,
}

impl Endpoint {
    /// Placeholder names in template order.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.url.as_str();
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) => {
                    names.push(&after[..end]);
                    rest = &after[end + 1..];
                }
                None => break,
            }
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedOperation {
    pub name: Name,
    pub endpoint: Endpoint,
    #[serde(default)]
    pub query: Vec<Param>,
    #[serde(default)]
    pub headers: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<TypeDef>,
    pub responses: Vec<Response>,
}

impl NamedOperation {
    pub fn has_multiple_responses(&self) -> bool {
        self.responses.len() > 1
    }

    /// Every type expression the operation mentions, in declaration order.
    pub fn types(&self) -> Vec<&TypeDef> {
        let mut types: Vec<&TypeDef> = Vec::new();
        types.extend(self.endpoint.url_params.iter().map(|p| &p.ty));
        types.extend(self.query.iter().map(|p| &p.ty));
        types.extend(self.headers.iter().map(|p| &p.ty));
        types.extend(self.body.iter());
        types.extend(self.responses.iter().filter_map(|r| r.body.as_ref()));
        types
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Api {
    pub name: Name,
    pub operations: Vec<NamedOperation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub name: Name,
    #[serde(default)]
    pub apis: Vec<Api>,
    #[serde(default)]
    pub models: Vec<NamedModel>,
}

impl Version {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            apis: Vec::new(),
            models: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: NamedModel) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_api(mut self, api: Api) -> Self {
        self.apis.push(api);
        self
    }
}

/// Error response models shared by every version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorModelSet {
    #[serde(default)]
    pub models: Vec<NamedModel>,
    #[serde(default)]
    pub responses: Vec<Response>,
}

/// Unvalidated specification document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecBuilder {
    #[serde(default)]
    pub versions: Vec<Version>,
    #[serde(default)]
    pub errors: ErrorModelSet,
}

/// A validated, immutable specification.
#[derive(Debug, Clone, PartialEq)]
pub struct Spec {
    versions: Vec<Version>,
    errors: ErrorModelSet,
}

impl Spec {
    pub fn builder() -> SpecBuilder {
        SpecBuilder::default()
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn errors(&self) -> &ErrorModelSet {
        &self.errors
    }

    pub fn version(&self, name: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.name.source() == name)
    }

    /// Look up a model by its bound reference.
    pub fn model(&self, model: &ModelRef) -> Option<&NamedModel> {
        let models = match model.scope.as_ref()? {
            ModelScope::Version(version) => &self.version(version.source())?.models,
            ModelScope::Errors => &self.errors.models,
        };
        models.iter().find(|m| m.name == model.name)
    }
}

impl SpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: Version) -> Self {
        self.versions.push(version);
        self
    }

    pub fn error_model(mut self, model: NamedModel) -> Self {
        self.errors.models.push(model);
        self
    }

    pub fn error_response(mut self, response: Response) -> Self {
        self.errors.responses.push(response);
        self
    }

    /// Validate every invariant and bind model references.
    pub fn build(self) -> Result<Spec, SpecError> {
        let SpecBuilder {
            mut versions,
            mut errors,
        } = self;

        let errors_path = EntityPath::root().child("errors", "shared");
        let error_table = declare_models(&errors.models, &errors_path)?;
        {
            let scope = Scopes {
                local: None,
                errors: &error_table,
            };
            for model in &mut errors.models {
                let path = errors_path.child("model", model.name.source());
                validate_model(model, &scope, &path)?;
            }
            for response in &mut errors.responses {
                let path = errors_path.child("response", response.status.source());
                validate_response(response, &scope, &path)?;
            }
            check_unique(
                errors.responses.iter().map(|r| r.status.source().to_string()),
                &errors_path,
                |name| SpecErrorReason::DuplicateStatus(name),
            )?;
        }

        let mut seen_versions = HashSet::new();
        for version in &mut versions {
            let path = EntityPath::root().child("version", version.name.source());
            let flat = version.name.flat_case();
            if flat.is_empty() {
                return Err(SpecError::new(path, SpecErrorReason::EmptyName));
            }
            if RESERVED_VERSION_NAMES.contains(&flat.as_str()) {
                return Err(SpecError::new(
                    path,
                    SpecErrorReason::ReservedName {
                        kind: "version",
                        name: version.name.source().to_string(),
                    },
                ));
            }
            if !seen_versions.insert(flat) {
                return Err(SpecError::new(
                    EntityPath::root(),
                    SpecErrorReason::DuplicateName {
                        kind: "version",
                        name: version.name.source().to_string(),
                    },
                ));
            }
            validate_version(version, &error_table, &path)?;
        }

        debug!(
            "validated specification: {} version(s), {} error model(s)",
            versions.len(),
            errors.models.len()
        );
        Ok(Spec { versions, errors })
    }
}

/// Declared model kinds of one scope, keyed by source name.
type ModelTable = HashMap<String, ModelShape>;

#[derive(Debug, Clone)]
struct ModelShape {
    scope: ModelScope,
    object_fields: Option<Vec<String>>,
}

struct Scopes<'a> {
    local: Option<&'a ModelTable>,
    errors: &'a ModelTable,
}

impl Scopes<'_> {
    fn lookup(&self, name: &str) -> Option<&ModelShape> {
        self.local
            .and_then(|local| local.get(name))
            .or_else(|| self.errors.get(name))
    }
}

fn declare_models(models: &[NamedModel], path: &EntityPath) -> Result<ModelTable, SpecError> {
    declare_models_in(models, path, ModelScope::Errors)
}

fn declare_models_in(
    models: &[NamedModel],
    path: &EntityPath,
    scope: ModelScope,
) -> Result<ModelTable, SpecError> {
    let mut table = ModelTable::new();
    let mut identifiers = HashSet::new();
    for model in models {
        let model_path = path.child("model", model.name.source());
        let identifier = model.name.pascal_case();
        if identifier.is_empty() {
            return Err(SpecError::new(model_path, SpecErrorReason::EmptyName));
        }
        if !identifiers.insert(identifier) {
            return Err(SpecError::new(
                model_path,
                SpecErrorReason::DuplicateName {
                    kind: "model",
                    name: model.name.source().to_string(),
                },
            ));
        }
        let object_fields = match &model.kind {
            ModelKind::Object { fields } => Some(
                fields
                    .iter()
                    .map(|f| f.name.source().to_string())
                    .collect(),
            ),
            _ => None,
        };
        table.insert(
            model.name.source().to_string(),
            ModelShape {
                scope: scope.clone(),
                object_fields,
            },
        );
    }
    Ok(table)
}

fn check_unique<I, F>(names: I, path: &EntityPath, reason: F) -> Result<(), SpecError>
where
    I: IntoIterator<Item = String>,
    F: Fn(String) -> SpecErrorReason,
{
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.clone()) {
            return Err(SpecError::new(path.clone(), reason(name)));
        }
    }
    Ok(())
}

fn duplicate(kind: &'static str) -> impl Fn(String) -> SpecErrorReason {
    move |name| SpecErrorReason::DuplicateName { kind, name }
}

fn validate_version(
    version: &mut Version,
    error_table: &ModelTable,
    path: &EntityPath,
) -> Result<(), SpecError> {
    let local = declare_models_in(
        &version.models,
        path,
        ModelScope::Version(version.name.clone()),
    )?;
    let scope = Scopes {
        local: Some(&local),
        errors: error_table,
    };

    for model in &mut version.models {
        let model_path = path.child("model", model.name.source());
        validate_model(model, &scope, &model_path)?;
    }

    let mut api_names = HashSet::new();
    for api in &mut version.apis {
        let api_path = path.child("api", api.name.source());
        let module_name = api.name.snake_case();
        if module_name.is_empty() {
            return Err(SpecError::new(api_path, SpecErrorReason::EmptyName));
        }
        if RESERVED_API_NAMES.contains(&module_name.as_str()) {
            return Err(SpecError::new(
                api_path,
                SpecErrorReason::ReservedName {
                    kind: "api",
                    name: api.name.source().to_string(),
                },
            ));
        }
        if !api_names.insert(module_name) {
            return Err(SpecError::new(
                api_path,
                SpecErrorReason::DuplicateName {
                    kind: "api",
                    name: api.name.source().to_string(),
                },
            ));
        }
        check_unique(
            api.operations.iter().map(|o| o.name.pascal_case()),
            &api_path,
            duplicate("operation"),
        )?;
        for operation in &mut api.operations {
            let op_path = api_path.child("operation", operation.name.source());
            validate_operation(operation, &scope, &op_path)?;
        }
    }
    Ok(())
}

fn validate_model(
    model: &mut NamedModel,
    scope: &Scopes<'_>,
    path: &EntityPath,
) -> Result<(), SpecError> {
    match &mut model.kind {
        ModelKind::Object { fields } => {
            check_unique(
                fields.iter().map(|f| f.name.snake_case()),
                path,
                duplicate("field"),
            )?;
            for field in fields {
                let field_path = path.child("field", field.name.source());
                field.ty = bind(&field.ty, scope, &field_path, false)?;
            }
        }
        ModelKind::OneOf {
            items,
            discriminator,
        } => {
            if items.is_empty() {
                return Err(SpecError::new(path.clone(), SpecErrorReason::NoItems("oneOf")));
            }
            check_unique(
                items.iter().map(|i| i.name.snake_case()),
                path,
                duplicate("item"),
            )?;
            for item in items.iter_mut() {
                let item_path = path.child("item", item.name.source());
                item.ty = bind(&item.ty, scope, &item_path, false)?;
            }
            if let Some(discriminator) = discriminator {
                validate_discriminator(discriminator, items, scope, path)?;
            }
        }
        ModelKind::Enum { items } => {
            if items.is_empty() {
                return Err(SpecError::new(path.clone(), SpecErrorReason::NoItems("enum")));
            }
            check_unique(
                items.iter().map(|i| i.name.pascal_case()),
                path,
                duplicate("item"),
            )?;
            check_unique(
                items.iter().map(|i| i.value.clone()),
                path,
                SpecErrorReason::DuplicateEnumValue,
            )?;
        }
    }
    Ok(())
}

fn validate_discriminator(
    discriminator: &str,
    items: &[OneOfItem],
    scope: &Scopes<'_>,
    path: &EntityPath,
) -> Result<(), SpecError> {
    if discriminator.is_empty() {
        return Err(SpecError::new(path.clone(), SpecErrorReason::EmptyName));
    }
    if RESERVED_SERIALIZATION_KEYS.contains(&discriminator) {
        return Err(SpecError::new(
            path.clone(),
            SpecErrorReason::ReservedDiscriminator(discriminator.to_string()),
        ));
    }
    for item in items {
        let item_path = path.child("item", item.name.source());
        let untaggable = |detail: &str| {
            SpecError::new(
                item_path.clone(),
                SpecErrorReason::UntaggableItem {
                    item: item.name.source().to_string(),
                    detail: detail.to_string(),
                },
            )
        };
        let model = item
            .ty
            .as_model()
            .ok_or_else(|| untaggable("only plain object model references can be tagged"))?;
        let shape = scope
            .lookup(model.name.source())
            .ok_or_else(|| untaggable("model is not declared"))?;
        let fields = shape
            .object_fields
            .as_ref()
            .ok_or_else(|| untaggable("only object models can be tagged"))?;
        if fields.iter().any(|f| f == discriminator) {
            return Err(SpecError::new(
                item_path,
                SpecErrorReason::DiscriminatorCollision {
                    discriminator: discriminator.to_string(),
                    model: model.name.source().to_string(),
                },
            ));
        }
    }
    Ok(())
}

fn validate_response(
    response: &mut Response,
    scope: &Scopes<'_>,
    path: &EntityPath,
) -> Result<(), SpecError> {
    if status_code(response.status.source()).is_none() {
        return Err(SpecError::new(
            path.clone(),
            SpecErrorReason::UnknownStatus(response.status.source().to_string()),
        ));
    }
    if let Some(body) = &response.body {
        response.body = Some(bind(body, scope, path, true)?);
    }
    Ok(())
}

fn validate_operation(
    operation: &mut NamedOperation,
    scope: &Scopes<'_>,
    path: &EntityPath,
) -> Result<(), SpecError> {
    if operation.responses.is_empty() {
        return Err(SpecError::new(path.clone(), SpecErrorReason::NoResponses));
    }
    check_unique(
        operation
            .responses
            .iter()
            .map(|r| r.status.source().to_string()),
        path,
        SpecErrorReason::DuplicateStatus,
    )?;
    for response in &mut operation.responses {
        let response_path = path.child("response", response.status.source());
        validate_response(response, scope, &response_path)?;
    }

    let placeholders: Vec<String> = operation
        .endpoint
        .placeholders()
        .into_iter()
        .map(str::to_string)
        .collect();
    for param in &operation.endpoint.url_params {
        if !placeholders.iter().any(|p| p == param.name.source()) {
            return Err(SpecError::new(
                path.child("param", param.name.source()),
                SpecErrorReason::UnusedUrlParam(param.name.source().to_string()),
            ));
        }
    }
    for placeholder in &placeholders {
        if !operation
            .endpoint
            .url_params
            .iter()
            .any(|p| p.name.source() == placeholder)
        {
            return Err(SpecError::new(
                path.clone(),
                SpecErrorReason::UndeclaredUrlParam(placeholder.clone()),
            ));
        }
    }

    for (kind, params) in [
        ("param", &mut operation.endpoint.url_params),
        ("query", &mut operation.query),
        ("header", &mut operation.headers),
    ] {
        check_unique(
            params.iter().map(|p| p.name.source().to_string()),
            path,
            duplicate(kind),
        )?;
        for param in params.iter_mut() {
            let param_path = path.child(kind, param.name.source());
            param.ty = bind(&param.ty, scope, &param_path, false)?;
        }
    }

    if let Some(body) = &operation.body {
        let body_path = path.child("body", "request");
        if body.is_nullable() {
            return Err(SpecError::new(body_path, SpecErrorReason::NullableBody));
        }
        operation.body = Some(bind(body, scope, &body_path, false)?);
    }
    Ok(())
}

/// Check the shape of `ty` and bind its model references to their scope.
fn bind(
    ty: &TypeDef,
    scope: &Scopes<'_>,
    path: &EntityPath,
    allow_empty: bool,
) -> Result<TypeDef, SpecError> {
    if allow_empty && ty.is_empty_type() {
        return Ok(ty.clone());
    }
    ty.fold(&mut Binder { scope, path, root: ty })
}

struct Binder<'a, 'b> {
    scope: &'a Scopes<'b>,
    path: &'a EntityPath,
    root: &'a TypeDef,
}

impl TypeFolder for Binder<'_, '_> {
    type Output = TypeDef;
    type Error = SpecError;

    fn primitive(&mut self, primitive: Primitive) -> Result<TypeDef, SpecError> {
        if primitive == Primitive::Empty {
            return Err(SpecError::new(
                self.path.clone(),
                SpecErrorReason::MisplacedEmpty(self.root.to_string()),
            ));
        }
        Ok(TypeDef::primitive(primitive))
    }

    fn model(&mut self, model: &ModelRef) -> Result<TypeDef, SpecError> {
        let shape = self.scope.lookup(model.name.source()).ok_or_else(|| {
            SpecError::new(
                self.path.clone(),
                SpecErrorReason::UnknownModel(model.name.source().to_string()),
            )
        })?;
        Ok(TypeDef::Plain(PlainType::Model(ModelRef {
            name: model.name.clone(),
            scope: Some(shape.scope.clone()),
        })))
    }

    fn nullable(&mut self, child: &TypeDef, inner: TypeDef) -> Result<TypeDef, SpecError> {
        if child.is_nullable() {
            return Err(SpecError::new(
                self.path.clone(),
                SpecErrorReason::DoubleNullable(self.root.to_string()),
            ));
        }
        Ok(TypeDef::nullable(inner))
    }

    fn array(&mut self, _child: &TypeDef, inner: TypeDef) -> Result<TypeDef, SpecError> {
        Ok(TypeDef::array(inner))
    }

    fn map(&mut self, _child: &TypeDef, inner: TypeDef) -> Result<TypeDef, SpecError> {
        Ok(TypeDef::map(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ty(expr: &str) -> TypeDef {
        TypeDef::parse(expr).unwrap()
    }

    fn ok_response() -> Response {
        Response::new("ok", Some(ty("empty")))
    }

    fn person() -> NamedModel {
        NamedModel::object(
            "Person",
            vec![Field::new("name", ty("string")), Field::new("age", ty("int32?"))],
        )
    }

    fn reason(result: Result<Spec, SpecError>) -> SpecErrorReason {
        result.unwrap_err().reason
    }

    #[test]
    fn test_builds_and_binds_references() {
        let spec = Spec::builder()
            .error_model(NamedModel::object("Message", vec![Field::new("text", ty("string"))]))
            .version(
                Version::new("v1")
                    .with_model(person())
                    .with_model(NamedModel::object(
                        "Team",
                        vec![
                            Field::new("members", ty("Person[]")),
                            Field::new("last_error", ty("Message?")),
                        ],
                    )),
            )
            .build()
            .unwrap();

        let team = &spec.versions()[0].models[1];
        let ModelKind::Object { fields } = &team.kind else {
            panic!("expected object");
        };
        let members = fields[0].ty.referenced_models()[0];
        assert_eq!(
            members.scope,
            Some(ModelScope::Version(Name::new("v1")))
        );
        let last_error = fields[1].ty.referenced_models()[0];
        assert_eq!(last_error.scope, Some(ModelScope::Errors));
        assert!(spec.model(members).is_some());
    }

    #[test]
    fn test_rejects_duplicate_models() {
        let result = Spec::builder()
            .version(Version::new("v1").with_model(person()).with_model(person()))
            .build();
        let err = result.unwrap_err();
        assert_eq!(err.path.to_string(), "version.v1.model.Person");
        assert_eq!(
            err.reason,
            SpecErrorReason::DuplicateName {
                kind: "model",
                name: "Person".to_string()
            }
        );
    }

    #[test]
    fn test_same_model_name_in_different_versions_is_fine() {
        let result = Spec::builder()
            .version(Version::new("v1").with_model(person()))
            .version(Version::new("v2").with_model(person()))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_rejects_duplicate_and_reserved_versions() {
        let result = Spec::builder()
            .version(Version::new("v1"))
            .version(Version::new("V1"))
            .build();
        assert!(matches!(reason(result), SpecErrorReason::DuplicateName { kind: "version", .. }));

        let result = Spec::builder().version(Version::new("errors")).build();
        assert!(matches!(reason(result), SpecErrorReason::ReservedName { kind: "version", .. }));
    }

    #[test]
    fn test_rejects_dangling_reference() {
        let result = Spec::builder()
            .version(Version::new("v2").with_model(NamedModel::object(
                "Person",
                vec![Field::new("pet", ty("Pet?"))],
            )))
            .build();
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "version.v2.model.Person.field.pet: unknown model 'Pet'");
    }

    #[test]
    fn test_version_models_are_not_visible_to_other_versions() {
        let result = Spec::builder()
            .version(Version::new("v1").with_model(person()))
            .version(Version::new("v2").with_model(NamedModel::object(
                "Team",
                vec![Field::new("lead", ty("Person"))],
            )))
            .build();
        assert_eq!(reason(result), SpecErrorReason::UnknownModel("Person".to_string()));
    }

    #[test]
    fn test_rejects_double_nullable_built_programmatically() {
        let double = TypeDef::nullable(TypeDef::nullable(ty("int32")));
        let result = Spec::builder()
            .version(Version::new("v1").with_model(NamedModel::object(
                "Person",
                vec![Field::new("age", double)],
            )))
            .build();
        assert_eq!(reason(result), SpecErrorReason::DoubleNullable("int32??".to_string()));
    }

    #[test]
    fn test_rejects_duplicate_fields() {
        let result = Spec::builder()
            .version(Version::new("v1").with_model(NamedModel::object(
                "Person",
                vec![Field::new("userId", ty("string")), Field::new("user_id", ty("string"))],
            )))
            .build();
        assert!(matches!(reason(result), SpecErrorReason::DuplicateName { kind: "field", .. }));
    }

    #[test]
    fn test_enum_rules() {
        let result = Spec::builder()
            .version(Version::new("v1").with_model(NamedModel::enumeration("Color", vec![])))
            .build();
        assert_eq!(reason(result), SpecErrorReason::NoItems("enum"));

        let result = Spec::builder()
            .version(Version::new("v1").with_model(NamedModel::enumeration(
                "Color",
                vec![EnumItem::new("red", "red"), EnumItem::new("crimson", "red")],
            )))
            .build();
        assert_eq!(reason(result), SpecErrorReason::DuplicateEnumValue("red".to_string()));

        let result = Spec::builder()
            .version(Version::new("v1").with_model(NamedModel::enumeration(
                "Color",
                vec![EnumItem::new("red", "red"), EnumItem::new("Red", "RED")],
            )))
            .build();
        assert!(matches!(reason(result), SpecErrorReason::DuplicateName { kind: "item", .. }));
    }

    fn shapes(discriminator: Option<&str>, square_fields: Vec<Field>) -> SpecBuilder {
        Spec::builder().version(
            Version::new("v1")
                .with_model(NamedModel::object("Circle", vec![Field::new("radius", ty("double"))]))
                .with_model(NamedModel::object("Square", square_fields))
                .with_model(NamedModel::one_of(
                    "Shape",
                    vec![Field::new("circle", ty("Circle")), Field::new("square", ty("Square"))],
                    discriminator,
                )),
        )
    }

    #[test]
    fn test_discriminator_rules() {
        let side = vec![Field::new("side", ty("double"))];
        assert!(shapes(Some("kind"), side.clone()).build().is_ok());
        assert!(shapes(None, side.clone()).build().is_ok());

        assert_eq!(
            reason(shapes(Some("$type"), side).build()),
            SpecErrorReason::ReservedDiscriminator("$type".to_string())
        );

        let colliding = vec![Field::new("kind", ty("string"))];
        let err = shapes(Some("kind"), colliding).build().unwrap_err();
        assert_eq!(err.path.to_string(), "version.v1.model.Shape.item.square");
        assert!(matches!(err.reason, SpecErrorReason::DiscriminatorCollision { .. }));
    }

    #[test]
    fn test_discriminated_items_must_be_objects() {
        let result = Spec::builder()
            .version(Version::new("v1").with_model(NamedModel::one_of(
                "Value",
                vec![Field::new("text", ty("string")), Field::new("number", ty("int32"))],
                Some("kind"),
            )))
            .build();
        assert!(matches!(reason(result), SpecErrorReason::UntaggableItem { .. }));

        let wrapper = Spec::builder()
            .version(Version::new("v1").with_model(NamedModel::one_of(
                "Value",
                vec![Field::new("text", ty("string")), Field::new("number", ty("int32"))],
                None,
            )))
            .build();
        assert!(wrapper.is_ok());
    }

    fn operation(url: &str, params: Vec<Param>, responses: Vec<Response>) -> NamedOperation {
        NamedOperation {
            name: Name::new("getPet"),
            endpoint: Endpoint {
                method: HttpMethod::Get,
                url: url.to_string(),
                url_params: params,
            },
            query: vec![],
            headers: vec![],
            body: None,
            responses,
        }
    }

    fn with_operation(op: NamedOperation) -> SpecBuilder {
        Spec::builder().version(Version::new("v1").with_api(Api {
            name: Name::new("pets"),
            operations: vec![op],
        }))
    }

    #[test]
    fn test_operation_rules() {
        let id = vec![Field::new("id", ty("int64"))];
        assert!(with_operation(operation("/pets/{id}", id.clone(), vec![ok_response()]))
            .build()
            .is_ok());

        assert_eq!(
            reason(with_operation(operation("/pets/{id}", id.clone(), vec![])).build()),
            SpecErrorReason::NoResponses
        );
        assert_eq!(
            reason(
                with_operation(operation(
                    "/pets/{id}",
                    id.clone(),
                    vec![ok_response(), ok_response()]
                ))
                .build()
            ),
            SpecErrorReason::DuplicateStatus("ok".to_string())
        );
        assert_eq!(
            reason(
                with_operation(operation(
                    "/pets/{id}",
                    id.clone(),
                    vec![Response::new("teapot", None)]
                ))
                .build()
            ),
            SpecErrorReason::UnknownStatus("teapot".to_string())
        );
        assert_eq!(
            reason(with_operation(operation("/pets", id, vec![ok_response()])).build()),
            SpecErrorReason::UnusedUrlParam("id".to_string())
        );
        assert_eq!(
            reason(with_operation(operation("/pets/{id}", vec![], vec![ok_response()])).build()),
            SpecErrorReason::UndeclaredUrlParam("id".to_string())
        );
    }

    #[test]
    fn test_empty_only_in_responses() {
        let result = Spec::builder()
            .version(Version::new("v1").with_model(NamedModel::object(
                "Nothing",
                vec![Field::new("value", ty("empty"))],
            )))
            .build();
        assert_eq!(reason(result), SpecErrorReason::MisplacedEmpty("empty".to_string()));
    }

    #[test]
    fn test_reserved_api_name() {
        let result = Spec::builder()
            .version(Version::new("v1").with_api(Api {
                name: Name::new("models"),
                operations: vec![],
            }))
            .build();
        assert!(matches!(reason(result), SpecErrorReason::ReservedName { kind: "api", .. }));
    }

    #[test]
    fn test_placeholders() {
        let endpoint = Endpoint {
            method: HttpMethod::Get,
            url: "/owners/{owner_id}/pets/{pet_id}".to_string(),
            url_params: vec![],
        };
        assert_eq!(endpoint.placeholders(), vec!["owner_id", "pet_id"]);
    }

    #[test]
    fn test_document_deserializes() {
        let json = r#"{
            "versions": [{
                "name": "v1",
                "models": [
                    {"name": "Color", "kind": "enum", "items": [{"name": "red", "value": "RED"}]},
                    {"name": "Pet", "kind": "object", "fields": [
                        {"name": "name", "type": "string"},
                        {"name": "color", "type": "Color?"}
                    ]}
                ],
                "apis": [{"name": "pets", "operations": [{
                    "name": "getPet",
                    "endpoint": {"method": "GET", "url": "/pets/{id}", "url_params": [{"name": "id", "type": "int64"}]},
                    "responses": [{"status": "ok", "type": "Pet"}, {"status": "not_found"}]
                }]}]
            }]
        }"#;
        let builder: SpecBuilder = serde_json::from_str(json).unwrap();
        let spec = builder.build().unwrap();
        assert_eq!(spec.versions()[0].models.len(), 2);
        assert!(spec.versions()[0].apis[0].operations[0].has_multiple_responses());
    }
}
