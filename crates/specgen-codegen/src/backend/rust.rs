//! Rust backend: serde models, `reqwest` clients and `axum` routing.
//!
//! Every module directory gets one file per artifact family and a generated
//! `mod.rs` index (written in [`Backend::finish`]) that declares the family
//! files and re-exports their items, so `models::Pet` and `pets::Client`
//! resolve the same way no matter which family declared them.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use specgen_core::contract::{FieldContract, SerializationContract, UnionEncoding};
use specgen_core::module_registry::{Module, Role};
use specgen_core::naming::{to_pascal_case, to_snake_case};
use specgen_core::spec::{Api, ModelKind, NamedModel, NamedOperation, Param, Version};
use specgen_core::types::{ModelScope, PlainType, Primitive, TypeDef};
use specgen_core::ImportTarget;

use super::{
    directory_index, join_path, operation_params, response_body, response_type_name,
    responses_with_codes, rewrite_url, versioned_url, Backend, EmitContext,
};
use crate::artifact::{Artifact, ArtifactSet, GENERATED_HEADER};
use crate::config::Target;
use crate::error::CodegenError;
use crate::import_tracker::{ImportScope, ImportTracker};
use crate::resolver::{NullablePolicy, PrimitiveMapping, TargetTable, Wrapper};
use crate::writer::CodeWriter;

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv",
    "try", "typeof", "unsized", "virtual", "yield",
];

/// Locals of generated function bodies a parameter must not shadow.
const LOCALS: &[&str] = &[
    "url", "request", "resp", "service", "path", "query", "headers", "body", "result", "value",
    "header", "required", "optional", "message", "param_value",
];

pub struct RustBackend;

pub fn table() -> TargetTable {
    TargetTable::new(
        [
            (Primitive::Int32, PrimitiveMapping::builtin("i32")),
            (Primitive::Int64, PrimitiveMapping::builtin("i64")),
            (Primitive::Float, PrimitiveMapping::builtin("f32")),
            (Primitive::Double, PrimitiveMapping::builtin("f64")),
            (Primitive::Decimal, PrimitiveMapping::builtin("rust_decimal::Decimal")),
            (Primitive::Boolean, PrimitiveMapping::builtin("bool")),
            (Primitive::String, PrimitiveMapping::builtin("String")),
            (Primitive::Uuid, PrimitiveMapping::builtin("uuid::Uuid")),
            (Primitive::Date, PrimitiveMapping::builtin("chrono::NaiveDate")),
            (Primitive::DateTime, PrimitiveMapping::builtin("chrono::NaiveDateTime")),
            (Primitive::Json, PrimitiveMapping::builtin("serde_json::Value")),
            (Primitive::Empty, PrimitiveMapping::module(Role::Empty, "Empty")),
        ],
        NullablePolicy::Native(Wrapper::new("Option<", ">")),
        Wrapper::new("Vec<", ">"),
        Wrapper::new("std::collections::BTreeMap<String, ", ">"),
        "::",
    )
}

/// Field, parameter and function identifier.
fn ident(name: &str) -> String {
    let snake = to_snake_case(name);
    if matches!(snake.as_str(), "self" | "super" | "crate") || LOCALS.contains(&snake.as_str()) {
        format!("{}_", snake)
    } else if KEYWORDS.contains(&snake.as_str()) {
        format!("r#{}", snake)
    } else {
        snake
    }
}

/// Rust path of a module: the root module's segments joined by `::`.
fn module_path(module: &Module) -> String {
    let mut parts: Vec<&str> = module
        .root()
        .split(|c: char| c == '/' || c == ':' || c == '.')
        .filter(|s| !s.is_empty())
        .collect();
    parts.extend(module.segments().iter().map(String::as_str));
    parts.join("::")
}

fn source(scope: &ImportScope, uses: &[&str], body: &str, generated: bool) -> String {
    let mut out = String::new();
    if generated {
        out.push_str("// ");
        out.push_str(GENERATED_HEADER);
        out.push_str("\n\n");
    }
    let mut lines: Vec<String> = uses.iter().map(|u| format!("use {};", u)).collect();
    for directive in scope.directives() {
        if let ImportTarget::Module(module) = &directive.target {
            match &directive.alias {
                Some(alias) => lines.push(format!("use {} as {};", module_path(module), alias)),
                None => lines.push(format!("use {};", module_path(module))),
            }
        }
    }
    if !lines.is_empty() {
        out.push_str(&lines.join("\n"));
        out.push_str("\n\n");
    }
    out.push_str(body);
    out
}

/// A required field typed as raw JSON, where serde alone would accept `null`.
fn is_required_json(field: &FieldContract) -> bool {
    field.required && matches!(field.ty, TypeDef::Plain(PlainType::Primitive(Primitive::Json)))
}

const PRESENT_JSON: &str = "fn serialize_present_json<S>(value: &serde_json::Value, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if value.is_null() {
        return Err(serde::ser::Error::custom(\"required field doesn't have value\"));
    }
    value.serialize(serializer)
}

fn deserialize_present_json<'de, D>(deserializer: D) -> Result<serde_json::Value, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Err(serde::de::Error::custom(\"required field doesn't have value\")),
        value => Ok(value),
    }
}
";

/// Status constant of `axum::http::StatusCode` for a status tag.
fn status_const(response: &specgen_core::spec::Response) -> String {
    format!("StatusCode::{}", response.status.upper_case())
}

/// Return type of a client or service method, without the `Result`.
fn success_type(
    cx: &EmitContext<'_>,
    operation: &NamedOperation,
    api_module: &Module,
    scope: &ImportScope,
) -> Result<String, CodegenError> {
    if operation.has_multiple_responses() {
        return Ok(cx
            .resolver
            .member(api_module, &response_type_name(operation), scope));
    }
    match operation.responses.first() {
        Some(response) if !response.is_empty() => {
            cx.resolver.expr(&response_body(response), scope)
        }
        _ => Ok("()".to_string()),
    }
}

fn arguments(
    cx: &EmitContext<'_>,
    operation: &NamedOperation,
    scope: &ImportScope,
) -> Result<Vec<String>, CodegenError> {
    let mut args = Vec::new();
    for param in operation_params(operation) {
        args.push(format!(
            "{}: {}",
            ident(param.name.source()),
            cx.resolver.expr(&param.ty, scope)?
        ));
    }
    if let Some(body) = &operation.body {
        args.push(format!("body: {}", cx.resolver.expr(body, scope)?));
    }
    Ok(args)
}

fn operation_types(operation: &NamedOperation) -> Vec<TypeDef> {
    let mut types: Vec<TypeDef> = operation_params(operation).map(|p| p.ty.clone()).collect();
    types.extend(operation.body.iter().cloned());
    types.extend(
        operation
            .responses
            .iter()
            .filter(|r| !r.is_empty())
            .map(response_body),
    );
    types
}

fn add_operation_types(tracker: &mut ImportTracker<'_>, api: &Api) -> Result<(), CodegenError> {
    for operation in &api.operations {
        tracker.add_types(&operation_types(operation))?;
    }
    Ok(())
}

impl RustBackend {
    fn object(
        &self,
        cx: &EmitContext<'_>,
        w: &mut CodeWriter,
        model: &NamedModel,
        contract: &SerializationContract,
        scope: &ImportScope,
    ) -> Result<(), CodegenError> {
        let SerializationContract::Object { fields, .. } = contract else {
            return Ok(());
        };
        writeln!(w, "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]")?;
        writeln!(w, "pub struct {} {{", model.name.pascal_case())?;
        w.indent();
        let strict = cx.config.json_mode().checks_required();
        for field in fields {
            if strict && is_required_json(field) {
                writeln!(
                    w,
                    "#[serde(rename = \"{}\", serialize_with = \"serialize_present_json\", deserialize_with = \"deserialize_present_json\")]",
                    field.key
                )?;
            } else if field.required {
                writeln!(w, "#[serde(rename = \"{}\")]", field.key)?;
            } else {
                writeln!(
                    w,
                    "#[serde(rename = \"{}\", default, skip_serializing_if = \"Option::is_none\")]",
                    field.key
                )?;
            }
            writeln!(
                w,
                "pub {}: {},",
                ident(&field.key),
                cx.resolver.expr(&field.ty, scope)?
            )?;
        }
        w.dedent();
        writeln!(w, "}}")?;
        Ok(())
    }

    fn enumeration(&self, w: &mut CodeWriter, model: &NamedModel) -> Result<(), CodegenError> {
        let ModelKind::Enum { items } = &model.kind else {
            return Ok(());
        };
        let name = model.name.pascal_case();
        writeln!(w, "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]")?;
        writeln!(w, "pub enum {} {{", name)?;
        w.indent();
        for item in items {
            writeln!(w, "#[serde(rename = \"{}\")]", item.value)?;
            writeln!(w, "{},", item.name.pascal_case())?;
        }
        w.dedent();
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(w, "impl {} {{", name)?;
        w.indent();
        let variants: Vec<String> = items
            .iter()
            .map(|i| format!("{}::{}", name, i.name.pascal_case()))
            .collect();
        writeln!(
            w,
            "pub const ALL: [{}; {}] = [{}];",
            name,
            items.len(),
            variants.join(", ")
        )?;
        writeln!(w)?;
        writeln!(w, "pub fn as_str(&self) -> &'static str {{")?;
        w.indent();
        writeln!(w, "match self {{")?;
        for (item, variant) in items.iter().zip(&variants) {
            writeln!(w, "    {} => \"{}\",", variant, item.value)?;
        }
        writeln!(w, "}}")?;
        w.dedent();
        writeln!(w, "}}")?;
        w.dedent();
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(w, "impl std::fmt::Display for {} {{", name)?;
        writeln!(w, "    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {{")?;
        writeln!(w, "        f.write_str(self.as_str())")?;
        writeln!(w, "    }}")?;
        writeln!(w, "}}")?;
        Ok(())
    }

    fn union(
        &self,
        cx: &EmitContext<'_>,
        w: &mut CodeWriter,
        model: &NamedModel,
        contract: &SerializationContract,
        scope: &ImportScope,
    ) -> Result<(), CodegenError> {
        let SerializationContract::OneOf {
            cases, encoding, ..
        } = contract
        else {
            return Ok(());
        };
        writeln!(w, "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]")?;
        if let UnionEncoding::Discriminated { field } = encoding {
            writeln!(w, "#[serde(tag = \"{}\")]", field)?;
        }
        writeln!(w, "pub enum {} {{", model.name.pascal_case())?;
        w.indent();
        for case in cases {
            writeln!(w, "#[serde(rename = \"{}\")]", case.tag)?;
            writeln!(
                w,
                "{}({}),",
                to_pascal_case(&case.tag),
                cx.resolver.expr(&case.ty, scope)?
            )?;
        }
        w.dedent();
        writeln!(w, "}}")?;
        Ok(())
    }

    fn client_method(
        &self,
        cx: &EmitContext<'_>,
        w: &mut CodeWriter,
        version: &Version,
        operation: &NamedOperation,
        api_module: &Module,
        scope: &ImportScope,
        errors_module: &Module,
    ) -> Result<(), CodegenError> {
        let api_error = cx.resolver.member(errors_module, "ApiError", scope);
        let handle = cx.resolver.member(errors_module, "handle_response", scope);
        let success = success_type(cx, operation, api_module, scope)?;
        let mut params = vec!["&self".to_string()];
        params.extend(arguments(cx, operation, scope)?);
        writeln!(
            w,
            "pub async fn {}({}) -> Result<{}, {}> {{",
            ident(operation.name.source()),
            params.join(", "),
            success,
            api_error
        )?;
        w.indent();

        let url = versioned_url(version, operation);
        if operation.endpoint.url_params.is_empty() {
            writeln!(w, "let url = format!(\"{{}}{}\", self.base_url);", url)?;
        } else {
            let template = rewrite_url(&url, |_| "{}".to_string());
            let values: Vec<String> = operation
                .endpoint
                .url_params
                .iter()
                .map(|p| format!("param_value(&{})", ident(p.name.source())))
                .collect();
            writeln!(
                w,
                "let url = format!(\"{{}}{}\", self.base_url, {});",
                template,
                values.join(", ")
            )?;
        }
        writeln!(
            w,
            "let mut request = self.http.request(reqwest::Method::{}, &url);",
            operation.endpoint.method.as_str()
        )?;
        for param in &operation.query {
            self.attach(w, param, |name, value| {
                format!("request = request.query(&[(\"{}\", {})]);", name, value)
            })?;
        }
        for param in &operation.headers {
            self.attach(w, param, |name, value| {
                format!("request = request.header(\"{}\", {});", name, value)
            })?;
        }
        if operation.body.is_some() {
            writeln!(w, "request = request.json(&body);")?;
        }
        writeln!(w, "let resp = request.send().await?;")?;
        writeln!(w, "match resp.status().as_u16() {{")?;
        w.indent();
        for (response, code) in responses_with_codes(operation) {
            let value = if response.is_empty() {
                None
            } else {
                Some(format!(
                    "resp.json::<{}>().await?",
                    cx.resolver.expr(&response_body(response), scope)?
                ))
            };
            let arm = match (operation.has_multiple_responses(), value) {
                (true, Some(value)) => format!(
                    "Ok({}::{}({}))",
                    success,
                    response.status.pascal_case(),
                    value
                ),
                (true, None) => format!("Ok({}::{})", success, response.status.pascal_case()),
                (false, Some(value)) => format!("Ok({})", value),
                (false, None) => "Ok(())".to_string(),
            };
            writeln!(w, "{} => {},", code, arm)?;
        }
        writeln!(w, "_ => Err({}(resp).await),", handle)?;
        w.dedent();
        writeln!(w, "}}")?;
        w.dedent();
        writeln!(w, "}}")?;
        Ok(())
    }

    fn attach(
        &self,
        w: &mut CodeWriter,
        param: &Param,
        render: impl Fn(&str, &str) -> String,
    ) -> Result<(), CodegenError> {
        let var = ident(param.name.source());
        if param.ty.is_nullable() {
            writeln!(w, "if let Some(value) = &{} {{", var)?;
            writeln!(w, "    {}", render(param.name.source(), "param_value(value)"))?;
            writeln!(w, "}}")?;
        } else {
            writeln!(
                w,
                "{}",
                render(param.name.source(), &format!("param_value(&{})", var))
            )?;
        }
        Ok(())
    }

    fn handler(
        &self,
        cx: &EmitContext<'_>,
        w: &mut CodeWriter,
        operation: &NamedOperation,
        api_module: &Module,
        scope: &ImportScope,
    ) -> Result<(), CodegenError> {
        let service = cx.resolver.member(api_module, "Service", scope);
        let mut extractors = vec!["State(service): State<Arc<S>>".to_string()];
        if !operation.endpoint.url_params.is_empty() {
            extractors.push("Path(path): Path<HashMap<String, String>>".to_string());
        }
        if !operation.query.is_empty() {
            extractors.push("Query(query): Query<HashMap<String, String>>".to_string());
        }
        if !operation.headers.is_empty() {
            extractors.push("headers: HeaderMap".to_string());
        }
        if let Some(body) = &operation.body {
            extractors.push(format!("Json(body): Json<{}>", cx.resolver.expr(body, scope)?));
        }
        writeln!(
            w,
            "async fn {}<S: {}>({}) -> Result<Response, Response> {{",
            ident(operation.name.source()),
            service,
            extractors.join(", ")
        )?;
        w.indent();
        let mut args = Vec::new();
        let sources = operation
            .endpoint
            .url_params
            .iter()
            .map(|p| (p, format!("path.get(\"{}\").map(String::as_str)", p.name.source())))
            .chain(
                operation
                    .query
                    .iter()
                    .map(|p| (p, format!("query.get(\"{}\").map(String::as_str)", p.name.source()))),
            )
            .chain(
                operation
                    .headers
                    .iter()
                    .map(|p| (p, format!("header(&headers, \"{}\")", p.name.source()))),
            );
        for (param, raw) in sources {
            let var = ident(param.name.source());
            match &param.ty {
                TypeDef::Nullable(child) => writeln!(
                    w,
                    "let {}: Option<{}> = optional({})?;",
                    var,
                    cx.resolver.expr(child, scope)?,
                    raw
                )?,
                ty => writeln!(
                    w,
                    "let {}: {} = required({}, \"{}\")?;",
                    var,
                    cx.resolver.expr(ty, scope)?,
                    raw,
                    param.name.source()
                )?,
            }
            args.push(var);
        }
        if operation.body.is_some() {
            args.push("body".to_string());
        }
        writeln!(
            w,
            "match service.{}({}).await {{",
            ident(operation.name.source()),
            args.join(", ")
        )?;
        w.indent();
        if operation.has_multiple_responses() {
            let response_type = cx
                .resolver
                .member(api_module, &response_type_name(operation), scope);
            for response in &operation.responses {
                let variant = format!("{}::{}", response_type, response.status.pascal_case());
                if response.is_empty() {
                    writeln!(
                        w,
                        "Ok({}) => Ok({}.into_response()),",
                        variant,
                        status_const(response)
                    )?;
                } else {
                    writeln!(
                        w,
                        "Ok({}(result)) => Ok(({}, Json(result)).into_response()),",
                        variant,
                        status_const(response)
                    )?;
                }
            }
        } else if let Some(response) = operation.responses.first() {
            if response.is_empty() {
                writeln!(w, "Ok(()) => Ok({}.into_response()),", status_const(response))?;
            } else {
                writeln!(
                    w,
                    "Ok(result) => Ok(({}, Json(result)).into_response()),",
                    status_const(response)
                )?;
            }
        }
        writeln!(
            w,
            "Err(err) => Err(message(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())),"
        )?;
        w.dedent();
        writeln!(w, "}}")?;
        w.dedent();
        writeln!(w, "}}")?;
        Ok(())
    }
}

const ROUTING_HELPERS: &str = "fn parse_param<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(raw).or_else(|_| serde_json::from_value(serde_json::Value::String(raw.to_string())))
}

fn required<T: DeserializeOwned>(raw: Option<&str>, name: &str) -> Result<T, Response> {
    match raw {
        Some(raw) => parse_param(raw).map_err(|err| message(StatusCode::BAD_REQUEST, &err.to_string())),
        None => Err(message(StatusCode::BAD_REQUEST, &format!(\"missing parameter {}\", name))),
    }
}

fn optional<T: DeserializeOwned>(raw: Option<&str>) -> Result<Option<T>, Response> {
    match raw {
        Some(raw) => parse_param(raw)
            .map(Some)
            .map_err(|err| message(StatusCode::BAD_REQUEST, &err.to_string())),
        None => Ok(None),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn message(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ \"message\": message }))).into_response()
}
";

impl Backend for RustBackend {
    fn target(&self) -> Target {
        Target::Rust
    }

    fn table(&self) -> TargetTable {
        table()
    }

    fn helpers(&self, cx: &EmitContext<'_>, out: &mut ArtifactSet) -> Result<(), CodegenError> {
        let empty = cx.module(&Role::Empty, None);
        let body = "/// The body of a response that carries none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty;
";
        out.push(Artifact::generated(
            empty.file("types.rs"),
            source(
                &ImportScope::bare(Arc::clone(&empty)),
                &["serde::{Deserialize, Serialize}"],
                body,
                true,
            ),
        ))
    }

    fn models(
        &self,
        cx: &EmitContext<'_>,
        scope_of_models: &ModelScope,
        models: &[NamedModel],
        module: &Arc<Module>,
        out: &mut ArtifactSet,
    ) -> Result<(), CodegenError> {
        if models.is_empty() {
            return Ok(());
        }
        let mut tracker = cx.tracker(module);
        for model in models {
            tracker.add_types(model.types())?;
        }
        let scope = tracker.finish();

        let mut w = CodeWriter::spaces(4);
        for (i, model) in models.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            if let Some(description) = &model.description {
                writeln!(w, "/// {}", description)?;
            }
            let contract = cx.contract(scope_of_models, model)?;
            match &model.kind {
                ModelKind::Object { .. } => self.object(cx, &mut w, model, contract, &scope)?,
                ModelKind::Enum { .. } => self.enumeration(&mut w, model)?,
                ModelKind::OneOf { .. } => self.union(cx, &mut w, model, contract, &scope)?,
            }
        }
        if cx.config.json_mode().checks_required() {
            let mut guarded = false;
            for model in models {
                if let SerializationContract::Object { fields, .. } =
                    cx.contract(scope_of_models, model)?
                {
                    guarded |= fields.iter().any(is_required_json);
                }
            }
            if guarded {
                writeln!(w)?;
                w.write_str(PRESENT_JSON)?;
            }
        }
        out.push(Artifact::generated(
            module.file("models.rs"),
            source(&scope, &["serde::{Deserialize, Serialize}"], &w.finish(), true),
        ))
    }

    fn errors(&self, cx: &EmitContext<'_>, out: &mut ArtifactSet) -> Result<(), CodegenError> {
        let module = cx.module(&Role::Errors, None);
        let responses = &cx.spec.errors().responses;
        let mut tracker = cx.tracker(&module);
        for response in responses.iter().filter(|r| !r.is_empty()) {
            tracker.add_type(&response_body(response))?;
        }
        let scope = tracker.finish();

        let mut w = CodeWriter::spaces(4);
        writeln!(w, "/// Failure of a client call.")?;
        writeln!(w, "#[derive(Debug)]")?;
        writeln!(w, "pub enum ApiError {{")?;
        w.indent();
        for response in responses {
            if response.is_empty() {
                writeln!(w, "{},", response.status.pascal_case())?;
            } else {
                writeln!(
                    w,
                    "{}({}),",
                    response.status.pascal_case(),
                    cx.resolver.expr(&response_body(response), &scope)?
                )?;
            }
        }
        writeln!(w, "UnexpectedStatus(u16),")?;
        writeln!(w, "Transport(reqwest::Error),")?;
        w.dedent();
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(w, "impl std::fmt::Display for ApiError {{")?;
        w.indent();
        writeln!(w, "fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {{")?;
        w.indent();
        writeln!(w, "match self {{")?;
        w.indent();
        for response in responses {
            let pattern = if response.is_empty() {
                format!("ApiError::{}", response.status.pascal_case())
            } else {
                format!("ApiError::{}(_)", response.status.pascal_case())
            };
            writeln!(w, "{} => f.write_str(\"{}\"),", pattern, response.status)?;
        }
        writeln!(
            w,
            "ApiError::UnexpectedStatus(status) => write!(f, \"unexpected response status: {{}}\", status),"
        )?;
        writeln!(w, "ApiError::Transport(err) => write!(f, \"transport error: {{}}\", err),")?;
        w.dedent();
        writeln!(w, "}}")?;
        w.dedent();
        writeln!(w, "}}")?;
        w.dedent();
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(w, "impl std::error::Error for ApiError {{}}")?;
        writeln!(w)?;
        writeln!(w, "impl From<reqwest::Error> for ApiError {{")?;
        writeln!(w, "    fn from(err: reqwest::Error) -> Self {{")?;
        writeln!(w, "        ApiError::Transport(err)")?;
        writeln!(w, "    }}")?;
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(w, "/// Map a response no operation declares to an [`ApiError`].")?;
        writeln!(w, "pub async fn handle_response(resp: reqwest::Response) -> ApiError {{")?;
        w.indent();
        writeln!(w, "match resp.status().as_u16() {{")?;
        w.indent();
        for response in responses {
            let Some(code) = response.status_code() else {
                continue;
            };
            let variant = format!("ApiError::{}", response.status.pascal_case());
            if response.is_empty() {
                writeln!(w, "{} => {},", code, variant)?;
            } else {
                writeln!(
                    w,
                    "{} => match resp.json::<{}>().await {{",
                    code,
                    cx.resolver.expr(&response_body(response), &scope)?
                )?;
                writeln!(w, "    Ok(body) => {}(body),", variant)?;
                writeln!(w, "    Err(err) => ApiError::Transport(err),")?;
                writeln!(w, "}},")?;
            }
        }
        writeln!(w, "status => ApiError::UnexpectedStatus(status),")?;
        w.dedent();
        writeln!(w, "}}")?;
        w.dedent();
        writeln!(w, "}}")?;

        out.push(Artifact::generated(
            module.file("types.rs"),
            source(&scope, &[], &w.finish(), true),
        ))
    }

    fn responses(
        &self,
        cx: &EmitContext<'_>,
        version: &Version,
        api: &Api,
        out: &mut ArtifactSet,
    ) -> Result<(), CodegenError> {
        let multi: Vec<&NamedOperation> = api
            .operations
            .iter()
            .filter(|o| o.has_multiple_responses())
            .collect();
        if multi.is_empty() {
            return Ok(());
        }
        let module = cx.module(&Role::Api(api.name.clone()), Some(&version.name));
        let mut tracker = cx.tracker(&module);
        for operation in &multi {
            for response in operation.responses.iter().filter(|r| !r.is_empty()) {
                tracker.add_type(&response_body(response))?;
            }
        }
        let scope = tracker.finish();

        let mut w = CodeWriter::spaces(4);
        for (i, operation) in multi.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            writeln!(w, "#[derive(Debug, Clone, PartialEq)]")?;
            writeln!(w, "pub enum {} {{", response_type_name(operation))?;
            w.indent();
            for response in &operation.responses {
                if response.is_empty() {
                    writeln!(w, "{},", response.status.pascal_case())?;
                } else {
                    writeln!(
                        w,
                        "{}({}),",
                        response.status.pascal_case(),
                        cx.resolver.expr(&response_body(response), &scope)?
                    )?;
                }
            }
            w.dedent();
            writeln!(w, "}}")?;
        }
        out.push(Artifact::generated(
            module.file("responses.rs"),
            source(&scope, &[], &w.finish(), true),
        ))
    }

    fn client(
        &self,
        cx: &EmitContext<'_>,
        version: &Version,
        api: &Api,
        out: &mut ArtifactSet,
    ) -> Result<(), CodegenError> {
        let module = cx.module(&Role::Api(api.name.clone()), Some(&version.name));
        let mut tracker = cx.tracker(&module);
        let errors_module = tracker.add_module(&Role::Errors, None);
        add_operation_types(&mut tracker, api)?;
        let scope = tracker.finish();

        let mut w = CodeWriter::spaces(4);
        writeln!(w, "pub struct Client {{")?;
        writeln!(w, "    base_url: String,")?;
        writeln!(w, "    http: reqwest::Client,")?;
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(w, "impl Client {{")?;
        w.indent();
        writeln!(w, "pub fn new(base_url: impl Into<String>) -> Self {{")?;
        writeln!(w, "    Self {{")?;
        writeln!(w, "        base_url: base_url.into(),")?;
        writeln!(w, "        http: reqwest::Client::new(),")?;
        writeln!(w, "    }}")?;
        writeln!(w, "}}")?;
        for operation in &api.operations {
            writeln!(w)?;
            self.client_method(cx, &mut w, version, operation, &module, &scope, &errors_module)?;
        }
        w.dedent();
        writeln!(w, "}}")?;
        writeln!(w)?;
        w.write_str(
            "fn param_value<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(value)) => value,
        Ok(value) => value.to_string(),
        Err(_) => String::new(),
    }
}
",
        )?;
        out.push(Artifact::generated(
            module.file("client.rs"),
            source(&scope, &[], &w.finish(), true),
        ))
    }

    fn service(
        &self,
        cx: &EmitContext<'_>,
        version: &Version,
        out: &mut ArtifactSet,
    ) -> Result<(), CodegenError> {
        for api in &version.apis {
            let module = cx.module(&Role::Api(api.name.clone()), Some(&version.name));
            let mut tracker = cx.tracker(&module);
            add_operation_types(&mut tracker, api)?;
            let scope = tracker.finish();

            let mut w = CodeWriter::spaces(4);
            writeln!(w, "pub type ServiceError = Box<dyn std::error::Error + Send + Sync>;")?;
            writeln!(w)?;
            writeln!(w, "pub trait Service: Send + Sync + 'static {{")?;
            w.indent();
            for (i, operation) in api.operations.iter().enumerate() {
                if i > 0 {
                    writeln!(w)?;
                }
                let mut params = vec!["&self".to_string()];
                params.extend(arguments(cx, operation, &scope)?);
                writeln!(
                    w,
                    "fn {}({}) -> impl Future<Output = Result<{}, ServiceError>> + Send;",
                    ident(operation.name.source()),
                    params.join(", "),
                    success_type(cx, operation, &module, &scope)?
                )?;
            }
            w.dedent();
            writeln!(w, "}}")?;
            out.push(Artifact::generated(
                module.file("service.rs"),
                source(&scope, &["std::future::Future"], &w.finish(), true),
            ))?;
        }

        if version.apis.is_empty() {
            return Ok(());
        }
        let routing = cx.module(&Role::Routing, Some(&version.name));
        let mut tracker = cx.tracker(&routing);
        let mut api_modules = Vec::new();
        for api in &version.apis {
            api_modules.push(tracker.add_module(&Role::Api(api.name.clone()), Some(&version.name)));
            for operation in &api.operations {
                let mut types: Vec<TypeDef> = operation_params(operation)
                    .map(|p| match &p.ty {
                        TypeDef::Nullable(child) => (**child).clone(),
                        ty => ty.clone(),
                    })
                    .collect();
                types.extend(operation.body.iter().cloned());
                tracker.add_types(&types)?;
            }
        }
        let scope = tracker.finish();

        let mut methods: Vec<String> = version
            .apis
            .iter()
            .flat_map(|a| &a.operations)
            .map(|o| o.endpoint.method.as_str().to_ascii_lowercase())
            .collect();
        methods.sort();
        methods.dedup();
        let method_use = format!("axum::routing::{{{}}}", methods.join(", "));

        let mut w = CodeWriter::spaces(4);
        for (api, api_module) in version.apis.iter().zip(&api_modules) {
            let service = cx.resolver.member(api_module, "Service", &scope);
            writeln!(
                w,
                "pub fn {}_routes<S: {}>(service: Arc<S>) -> Router {{",
                api.name.snake_case(),
                service
            )?;
            w.indent();
            let mut by_path: BTreeMap<String, Vec<&NamedOperation>> = BTreeMap::new();
            let mut order = Vec::new();
            for operation in &api.operations {
                let path = rewrite_url(&versioned_url(version, operation), |p| format!(":{}", p));
                if !by_path.contains_key(&path) {
                    order.push(path.clone());
                }
                by_path.entry(path).or_default().push(operation);
            }
            writeln!(w, "Router::new()")?;
            for path in &order {
                let methods: Vec<String> = by_path[path]
                    .iter()
                    .map(|o| {
                        format!(
                            "{}({}::<S>)",
                            o.endpoint.method.as_str().to_ascii_lowercase(),
                            ident(o.name.source())
                        )
                    })
                    .collect();
                writeln!(w, "    .route(\"{}\", {})", path, methods.join("."))?;
            }
            writeln!(w, "    .with_state(service)")?;
            w.dedent();
            writeln!(w, "}}")?;
            writeln!(w)?;
            for operation in &api.operations {
                self.handler(cx, &mut w, operation, api_module, &scope)?;
                writeln!(w)?;
            }
        }
        w.write_str(ROUTING_HELPERS)?;
        out.push(Artifact::generated(
            routing.file("routing.rs"),
            source(
                &scope,
                &[
                    "std::collections::HashMap",
                    "std::sync::Arc",
                    "axum::extract::{Json, Path, Query, State}",
                    "axum::http::{HeaderMap, StatusCode}",
                    "axum::response::{IntoResponse, Response}",
                    &method_use,
                    "axum::Router",
                    "serde::de::DeserializeOwned",
                ],
                &w.finish(),
                true,
            ),
        ))
    }

    fn scaffold(
        &self,
        cx: &EmitContext<'_>,
        version: &Version,
        api: &Api,
        out: &mut ArtifactSet,
    ) -> Result<(), CodegenError> {
        let module = cx.module(&Role::Services, Some(&version.name));
        let mut tracker = cx.tracker(&module);
        let api_module = tracker.add_module(&Role::Api(api.name.clone()), Some(&version.name));
        add_operation_types(&mut tracker, api)?;
        let scope = tracker.finish();

        let name = format!("{}Service", api.name.pascal_case());
        let service_error = cx.resolver.member(&api_module, "ServiceError", &scope);
        let mut w = CodeWriter::spaces(4);
        writeln!(w, "pub struct {};", name)?;
        writeln!(w)?;
        writeln!(
            w,
            "impl {} for {} {{",
            cx.resolver.member(&api_module, "Service", &scope),
            name
        )?;
        w.indent();
        for (i, operation) in api.operations.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            let mut params = vec!["&self".to_string()];
            params.extend(
                arguments(cx, operation, &scope)?
                    .into_iter()
                    .map(|arg| format!("_{}", arg.trim_start_matches("r#"))),
            );
            writeln!(
                w,
                "async fn {}({}) -> Result<{}, {}> {{",
                ident(operation.name.source()),
                params.join(", "),
                success_type(cx, operation, &api_module, &scope)?,
                service_error
            )?;
            writeln!(
                w,
                "    Err(\"{} is not implemented\".into())",
                ident(operation.name.source())
            )?;
            writeln!(w, "}}")?;
        }
        w.dedent();
        writeln!(w, "}}")?;
        out.push(Artifact::scaffolded(
            module.file(&format!("{}.rs", api.name.snake_case())),
            source(&scope, &[], &w.finish(), false),
        ))
    }

    fn finish(&self, cx: &EmitContext<'_>, out: &mut ArtifactSet) -> Result<(), CodegenError> {
        let versions: Vec<&Version> = cx
            .spec
            .versions()
            .iter()
            .filter(|v| !v.apis.is_empty())
            .collect();
        if cx.config.outputs().needs_service() && !versions.is_empty() {
            let root = cx.module(&Role::Root, None);
            let mut tracker = cx.tracker(&root);
            let mut mounts = Vec::new();
            for version in &versions {
                let routing = tracker.add_module(&Role::Routing, Some(&version.name));
                for api in &version.apis {
                    let api_module =
                        tracker.add_module(&Role::Api(api.name.clone()), Some(&version.name));
                    mounts.push((*version, api, Arc::clone(&routing), api_module));
                }
            }
            let scope = tracker.finish();

            let mut generics = Vec::new();
            let mut params = Vec::new();
            let mut merges = Vec::new();
            for (i, (version, api, routing, api_module)) in mounts.iter().enumerate() {
                let var = format!("{}_{}", version.name.flat_case(), api.name.snake_case());
                generics.push(format!(
                    "S{}: {}",
                    i,
                    cx.resolver.member(api_module, "Service", &scope)
                ));
                params.push(format!("{}: Arc<S{}>", var, i));
                merges.push(format!(
                    ".merge({}({}))",
                    cx.resolver.member(
                        routing,
                        &format!("{}_routes", api.name.snake_case()),
                        &scope
                    ),
                    var
                ));
            }
            let mut w = CodeWriter::spaces(4);
            writeln!(
                w,
                "pub fn routes<{}>({}) -> Router {{",
                generics.join(", "),
                params.join(", ")
            )?;
            writeln!(w, "    Router::new()")?;
            for merge in merges {
                writeln!(w, "        {}", merge)?;
            }
            writeln!(w, "}}")?;
            out.push(Artifact::generated(
                root.file("routing.rs"),
                source(
                    &scope,
                    &["std::sync::Arc", "axum::Router"],
                    &w.finish(),
                    true,
                ),
            ))?;
        }

        let index = directory_index(out.paths(), "rs", "mod");
        for (dir, entries) in index {
            let mut body = String::new();
            for child in entries.dirs.iter().chain(&entries.files) {
                body.push_str(&format!("pub mod {};\n", child));
            }
            if !entries.files.is_empty() && !dir.starts_with("services") {
                body.push('\n');
                for file in &entries.files {
                    body.push_str(&format!("pub use self::{}::*;\n", file));
                }
            }
            out.push(Artifact::generated(
                join_path(&dir, "mod.rs"),
                format!("// {}\n\n{}", GENERATED_HEADER, body),
            ))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident() {
        assert_eq!(ident("createPet"), "create_pet");
        assert_eq!(ident("type"), "r#type");
        assert_eq!(ident("self"), "self_");
        assert_eq!(ident("body"), "body_");
    }

    #[test]
    fn test_module_path() {
        let module = Module::new("crate::api").submodule("v1").submodule("models");
        assert_eq!(module_path(&module), "crate::api::v1::models");
        assert_eq!(module_path(&Module::new("acme/pets")), "acme::pets");
    }
}
