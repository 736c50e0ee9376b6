//! Go backend: `encoding/json` models, `net/http` clients, router-flavored
//! service routing and scaffolded service implementations.

use std::fmt::Write;
use std::sync::Arc;

use specgen_core::contract::{SerializationContract, UnionEncoding};
use specgen_core::module_registry::{Module, Role};
use specgen_core::naming::{to_camel_case, to_snake_case};
use specgen_core::spec::{Api, NamedModel, NamedOperation, Param, Version};
use specgen_core::types::{ModelScope, Primitive, TypeDef};
use specgen_core::ImportTarget;

use super::{
    operation_params, response_body, response_type_name, responses_with_codes, rewrite_url,
    versioned_url, Backend, EmitContext,
};
use crate::artifact::{Artifact, ArtifactSet, GENERATED_HEADER};
use crate::config::{ServerFlavor, Target};
use crate::error::CodegenError;
use crate::import_tracker::{ImportScope, ImportTracker};
use crate::resolver::{NullablePolicy, PrimitiveMapping, TargetTable, Wrapper};
use crate::writer::CodeWriter;

const JSON: &str = "encoding/json";
const ERRORS: &str = "errors";
const FMT: &str = "fmt";
const HTTP: &str = "net/http";
const BYTES: &str = "bytes";

/// Identifiers a parameter must not shadow in generated function bodies.
const RESERVED: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var", "url", "req", "res", "resp", "query",
    "err", "result", "body", "bodyData", "client", "raw", "value", "service", "router", "fmt",
    "http", "json", "bytes", "errors",
];

pub struct GoBackend;

pub fn table() -> TargetTable {
    TargetTable::new(
        [
            (Primitive::Int32, PrimitiveMapping::builtin("int")),
            (Primitive::Int64, PrimitiveMapping::builtin("int64")),
            (Primitive::Float, PrimitiveMapping::builtin("float32")),
            (Primitive::Double, PrimitiveMapping::builtin("float64")),
            (
                Primitive::Decimal,
                PrimitiveMapping::library("github.com/shopspring/decimal", "Decimal"),
            ),
            (Primitive::Boolean, PrimitiveMapping::builtin("bool")),
            (Primitive::String, PrimitiveMapping::builtin("string")),
            (
                Primitive::Uuid,
                PrimitiveMapping::library("github.com/google/uuid", "UUID"),
            ),
            (
                Primitive::Date,
                PrimitiveMapping::library("cloud.google.com/go/civil", "Date"),
            ),
            (
                Primitive::DateTime,
                PrimitiveMapping::library("cloud.google.com/go/civil", "DateTime"),
            ),
            (Primitive::Json, PrimitiveMapping::library(JSON, "RawMessage")),
            (Primitive::Empty, PrimitiveMapping::module(Role::Empty, "Type")),
        ],
        NullablePolicy::PointerForPlain("*".to_string()),
        Wrapper::new("[]", ""),
        Wrapper::new("map[string]", ""),
        ".",
    )
}

/// Go package name of a module.
fn package_name(module: &Module) -> String {
    to_snake_case(module.alias())
}

fn ident(name: &str) -> String {
    let camel = to_camel_case(name);
    if RESERVED.contains(&camel.as_str()) {
        format!("{}_", camel)
    } else {
        camel
    }
}

/// Header, package clause and import block followed by `body`.
fn source(module: &Module, scope: &ImportScope, body: &str, generated: bool) -> String {
    let mut out = String::new();
    if generated {
        out.push_str("// ");
        out.push_str(GENERATED_HEADER);
        out.push_str("\n\n");
    }
    out.push_str(&format!("package {}\n", package_name(module)));
    if !scope.is_empty() {
        out.push_str("\nimport (\n");
        for directive in scope.directives() {
            let path = match &directive.target {
                ImportTarget::Module(module) => module.qualified("/"),
                ImportTarget::Library(path) => path.clone(),
            };
            match &directive.alias {
                Some(alias) => out.push_str(&format!("\t{} \"{}\"\n", alias, path)),
                None => out.push_str(&format!("\t\"{}\"\n", path)),
            }
        }
        out.push_str(")\n");
    }
    out.push('\n');
    out.push_str(body);
    out
}

/// Type of a slot that may be unset: nullable unless it already is.
fn optional(ty: &TypeDef) -> TypeDef {
    if ty.is_nullable() {
        ty.clone()
    } else {
        TypeDef::nullable(ty.clone())
    }
}

fn is_pointer(ty: &TypeDef) -> bool {
    matches!(ty, TypeDef::Nullable(child) if matches!(**child, TypeDef::Plain(_)))
}

fn operation_types(operation: &NamedOperation) -> Vec<TypeDef> {
    let mut types: Vec<TypeDef> = operation_params(operation).map(|p| p.ty.clone()).collect();
    types.extend(operation.body.iter().cloned());
    if !operation.has_multiple_responses() {
        if let Some(response) = operation.responses.first() {
            if !response.is_empty() {
                types.push(response_body(response));
            }
        }
    }
    types
}

/// `Name(params) results` as shared by interfaces, clients and scaffolds.
fn signature(
    cx: &EmitContext<'_>,
    operation: &NamedOperation,
    api_module: &Module,
    scope: &ImportScope,
) -> Result<String, CodegenError> {
    let mut params = Vec::new();
    for param in operation_params(operation) {
        params.push(format!(
            "{} {}",
            ident(param.name.source()),
            cx.resolver.expr(&param.ty, scope)?
        ));
    }
    if let Some(body) = &operation.body {
        params.push(format!("body {}", cx.resolver.expr(body, scope)?));
    }
    let results = results(cx, operation, api_module, scope)?;
    Ok(format!(
        "{}({}) {}",
        operation.name.pascal_case(),
        params.join(", "),
        results
    ))
}

fn results(
    cx: &EmitContext<'_>,
    operation: &NamedOperation,
    api_module: &Module,
    scope: &ImportScope,
) -> Result<String, CodegenError> {
    if operation.has_multiple_responses() {
        let name = cx
            .resolver
            .member(api_module, &response_type_name(operation), scope);
        return Ok(format!("(*{}, error)", name));
    }
    match operation.responses.first() {
        Some(response) if !response.is_empty() => Ok(format!(
            "(*{}, error)",
            cx.resolver.expr(&response_body(response), scope)?
        )),
        _ => Ok("error".to_string()),
    }
}

/// Value returned alongside an error, `nil, ` or nothing.
fn error_prefix(operation: &NamedOperation) -> &'static str {
    let empty = !operation.has_multiple_responses()
        && operation.responses.first().map_or(true, |r| r.is_empty());
    if empty {
        ""
    } else {
        "nil, "
    }
}

fn add_operation_types(tracker: &mut ImportTracker<'_>, api: &Api) -> Result<(), CodegenError> {
    for operation in &api.operations {
        tracker.add_types(&operation_types(operation))?;
    }
    Ok(())
}

impl GoBackend {
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
        let name = model.name.pascal_case();
        if let Some(description) = &model.description {
            writeln!(w, "// {}", description)?;
        }
        writeln!(w, "type {} struct {{", name)?;
        w.indent();
        for field in fields {
            let omit = if field.required { "" } else { ",omitempty" };
            writeln!(
                w,
                "{} {} `json:\"{}{}\"`",
                specgen_core::naming::to_pascal_case(&field.key),
                cx.resolver.expr(&field.ty, scope)?,
                field.key,
                omit
            )?;
        }
        w.dedent();
        writeln!(w, "}}")?;

        let required = contract.required_fields();
        if !cx.config.json_mode().checks_required() || required.is_empty() {
            return Ok(());
        }
        let shadow = format!("json{}", name);
        let list = format!("{}RequiredFields", model.name.camel_case());
        let quoted: Vec<String> = required.iter().map(|f| format!("\"{}\"", f)).collect();
        writeln!(w)?;
        writeln!(w, "type {} {}", shadow, name)?;
        writeln!(w)?;
        writeln!(w, "var {} = []string{{{}}}", list, quoted.join(", "))?;
        writeln!(w)?;
        writeln!(w, "func (obj {}) MarshalJSON() ([]byte, error) {{", name)?;
        w.indent();
        writeln!(w, "data, err := json.Marshal({}(obj))", shadow)?;
        writeln!(w, "if err != nil {{\n\treturn nil, err\n}}")?;
        writeln!(w, "if err := checkRequiredFields(data, {}); err != nil {{", list)?;
        writeln!(w, "\treturn nil, err\n}}")?;
        writeln!(w, "return data, nil")?;
        w.dedent();
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(w, "func (obj *{}) UnmarshalJSON(data []byte) error {{", name)?;
        w.indent();
        writeln!(w, "jsonObj := {}(*obj)", shadow)?;
        writeln!(w, "if err := json.Unmarshal(data, &jsonObj); err != nil {{\n\treturn err\n}}")?;
        writeln!(w, "if err := checkRequiredFields(data, {}); err != nil {{", list)?;
        writeln!(w, "\treturn err\n}}")?;
        writeln!(w, "*obj = {}(jsonObj)", name)?;
        writeln!(w, "return nil")?;
        w.dedent();
        writeln!(w, "}}")?;
        Ok(())
    }

    fn enumeration(
        &self,
        w: &mut CodeWriter,
        model: &NamedModel,
        enums_package: &str,
    ) -> Result<(), CodegenError> {
        let specgen_core::spec::ModelKind::Enum { items } = &model.kind else {
            return Ok(());
        };
        let name = model.name.pascal_case();
        writeln!(w, "type {} string", name)?;
        writeln!(w)?;
        writeln!(w, "const (")?;
        w.indent();
        let mut constants = Vec::new();
        for item in items {
            let constant = format!("{}{}", name, item.name.pascal_case());
            writeln!(w, "{} {} = \"{}\"", constant, name, item.value)?;
            constants.push(constant);
        }
        w.dedent();
        writeln!(w, ")")?;
        writeln!(w)?;
        let strings: Vec<String> = constants.iter().map(|c| format!("string({})", c)).collect();
        writeln!(w, "var {}ValuesStrings = []string{{{}}}", name, strings.join(", "))?;
        writeln!(w, "var {}Values = []{}{{{}}}", name, name, constants.join(", "))?;
        writeln!(w)?;
        writeln!(w, "func (self *{}) UnmarshalJSON(b []byte) error {{", name)?;
        w.indent();
        writeln!(
            w,
            "str, err := {}.ReadStringValue(b, {}ValuesStrings)",
            enums_package, name
        )?;
        writeln!(w, "if err != nil {{\n\treturn err\n}}")?;
        writeln!(w, "*self = {}(str)", name)?;
        writeln!(w, "return nil")?;
        w.dedent();
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
        let name = model.name.pascal_case();
        let slots: Vec<String> = cases
            .iter()
            .map(|c| specgen_core::naming::to_pascal_case(&c.tag))
            .collect();

        writeln!(w, "type {} struct {{", name)?;
        w.indent();
        for (case, slot) in cases.iter().zip(&slots) {
            let ty = cx.resolver.expr(&optional(&case.ty), scope)?;
            match encoding {
                UnionEncoding::Wrapper => {
                    writeln!(w, "{} {} `json:\"{},omitempty\"`", slot, ty, case.tag)?
                }
                UnionEncoding::Discriminated { .. } => writeln!(w, "{} {}", slot, ty)?,
            }
        }
        w.dedent();
        writeln!(w, "}}")?;
        writeln!(w)?;

        writeln!(w, "func (u {}) setCases() int {{", name)?;
        w.indent();
        writeln!(w, "set := 0")?;
        for slot in &slots {
            writeln!(w, "if u.{} != nil {{\n\tset++\n}}", slot)?;
        }
        writeln!(w, "return set")?;
        w.dedent();
        writeln!(w, "}}")?;
        writeln!(w)?;

        match encoding {
            UnionEncoding::Wrapper => {
                let shadow = format!("json{}", name);
                writeln!(w, "type {} {}", shadow, name)?;
                writeln!(w)?;
                writeln!(w, "func (u {}) MarshalJSON() ([]byte, error) {{", name)?;
                w.indent();
                writeln!(w, "if u.setCases() != 1 {{")?;
                writeln!(w, "\treturn nil, errors.New(\"union case is not set\")\n}}")?;
                for (case, slot) in cases.iter().zip(&slots) {
                    writeln!(w, "if u.{} != nil {{", slot)?;
                    writeln!(
                        w,
                        "\treturn json.Marshal(map[string]interface{{}}{{\"{}\": u.{}}})\n}}",
                        case.tag, slot
                    )?;
                }
                writeln!(w, "return nil, errors.New(\"union case is not set\")")?;
                w.dedent();
                writeln!(w, "}}")?;
                writeln!(w)?;
                writeln!(w, "func (u *{}) UnmarshalJSON(data []byte) error {{", name)?;
                w.indent();
                writeln!(w, "jsonObj := {}(*u)", shadow)?;
                writeln!(w, "if err := json.Unmarshal(data, &jsonObj); err != nil {{\n\treturn err\n}}")?;
                writeln!(w, "value := {}(jsonObj)", name)?;
                writeln!(w, "if value.setCases() != 1 {{")?;
                writeln!(w, "\treturn errors.New(\"union case is not set\")\n}}")?;
                writeln!(w, "*u = value")?;
                writeln!(w, "return nil")?;
                w.dedent();
                writeln!(w, "}}")?;
            }
            UnionEncoding::Discriminated { field } => {
                writeln!(w, "func (u {}) MarshalJSON() ([]byte, error) {{", name)?;
                w.indent();
                writeln!(w, "if u.setCases() != 1 {{")?;
                writeln!(w, "\treturn nil, errors.New(\"union case is not set\")\n}}")?;
                for (case, slot) in cases.iter().zip(&slots) {
                    writeln!(w, "if u.{} != nil {{", slot)?;
                    writeln!(w, "\treturn marshalTagged(\"{}\", \"{}\", u.{})\n}}", field, case.tag, slot)?;
                }
                writeln!(w, "return nil, errors.New(\"union case is not set\")")?;
                w.dedent();
                writeln!(w, "}}")?;
                writeln!(w)?;
                writeln!(w, "func (u *{}) UnmarshalJSON(data []byte) error {{", name)?;
                w.indent();
                writeln!(w, "var discriminator struct {{")?;
                writeln!(w, "\tValue *string `json:\"{}\"`\n}}", field)?;
                writeln!(w, "if err := json.Unmarshal(data, &discriminator); err != nil {{")?;
                writeln!(
                    w,
                    "\treturn errors.New(\"failed to parse discriminator field {}: \" + err.Error())\n}}",
                    field
                )?;
                writeln!(w, "if discriminator.Value == nil {{")?;
                writeln!(w, "\treturn errors.New(\"discriminator field {} not found\")\n}}", field)?;
                writeln!(w, "switch *discriminator.Value {{")?;
                for (case, slot) in cases.iter().zip(&slots) {
                    writeln!(w, "case \"{}\":", case.tag)?;
                    w.indent();
                    writeln!(w, "var unionCase {}", cx.resolver.expr(&case.ty, scope)?)?;
                    writeln!(w, "if err := json.Unmarshal(data, &unionCase); err != nil {{\n\treturn err\n}}")?;
                    writeln!(w, "*u = {}{{{}: &unionCase}}", name, slot)?;
                    w.dedent();
                }
                writeln!(w, "default:")?;
                writeln!(
                    w,
                    "\treturn errors.New(\"unexpected union discriminator field {} value: \" + *discriminator.Value)",
                    field
                )?;
                writeln!(w, "}}")?;
                writeln!(w, "return nil")?;
                w.dedent();
                writeln!(w, "}}")?;
            }
        }
        Ok(())
    }

    fn route_call(&self, server: ServerFlavor, method: &str, url: &str) -> String {
        let handler = "func(res http.ResponseWriter, req *http.Request) {";
        match server {
            ServerFlavor::HttpRouter => format!(
                "router.HandlerFunc(\"{}\", \"{}\", {}",
                method,
                rewrite_url(url, |p| format!(":{}", p)),
                handler
            ),
            ServerFlavor::Vestigo => format!(
                "router.Add(\"{}\", \"{}\", {}",
                method,
                rewrite_url(url, |p| format!(":{}", p)),
                handler
            ),
            _ => {
                let mut title = method.to_ascii_lowercase();
                if let Some(first) = title.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                format!("router.{}(\"{}\", {}", title, url, handler)
            }
        }
    }

    fn url_param_getter(&self, server: ServerFlavor, router_package: &str, name: &str) -> String {
        match server {
            ServerFlavor::HttpRouter => format!(
                "{}.ParamsFromContext(req.Context()).ByName(\"{}\")",
                router_package, name
            ),
            ServerFlavor::Vestigo => format!("{}.Param(req, \"{}\")", router_package, name),
            _ => format!("{}.URLParam(req, \"{}\")", router_package, name),
        }
    }

    fn router_library(&self, server: ServerFlavor) -> (&'static str, &'static str) {
        match server {
            ServerFlavor::HttpRouter => ("github.com/julienschmidt/httprouter", "*{}.Router"),
            ServerFlavor::Vestigo => ("github.com/husobee/vestigo", "*{}.Router"),
            _ => ("github.com/go-chi/chi", "{}.Router"),
        }
    }

    fn router_type(&self, server: ServerFlavor, scope: &ImportScope) -> (String, String) {
        let (library, pattern) = self.router_library(server);
        let package = scope
            .library_name(library)
            .map(str::to_string)
            .unwrap_or_else(|| ImportTarget::library(library).default_alias().to_string());
        (pattern.replace("{}", &package), package)
    }

    fn handler(
        &self,
        cx: &EmitContext<'_>,
        w: &mut CodeWriter,
        version: &Version,
        operation: &NamedOperation,
        scope: &ImportScope,
        router_package: &str,
    ) -> Result<(), CodegenError> {
        let server = cx.config.server();
        writeln!(
            w,
            "{}",
            self.route_call(
                server,
                operation.endpoint.method.as_str(),
                &versioned_url(version, operation)
            )
        )?;
        w.indent();
        let bad_request = "\trespondError(res, http.StatusBadRequest, err)\n\treturn\n}";
        let mut args = Vec::new();
        for param in &operation.endpoint.url_params {
            let var = ident(param.name.source());
            writeln!(w, "var {} {}", var, cx.resolver.expr(&param.ty, scope)?)?;
            writeln!(
                w,
                "if err := parseParam({}, &{}); err != nil {{\n{}",
                self.url_param_getter(server, router_package, param.name.source()),
                var,
                bad_request
            )?;
            args.push(var);
        }
        for (param, getter) in operation
            .query
            .iter()
            .map(|p| (p, format!("req.URL.Query().Get(\"{}\")", p.name.source())))
            .chain(
                operation
                    .headers
                    .iter()
                    .map(|p| (p, format!("req.Header.Get(\"{}\")", p.name.source()))),
            )
        {
            let var = ident(param.name.source());
            writeln!(w, "var {} {}", var, cx.resolver.expr(&param.ty, scope)?)?;
            match &param.ty {
                TypeDef::Nullable(child) if is_pointer(&param.ty) => {
                    writeln!(w, "if raw := {}; raw != \"\" {{", getter)?;
                    w.indent();
                    writeln!(w, "var value {}", cx.resolver.expr(child, scope)?)?;
                    writeln!(w, "if err := parseParam(raw, &value); err != nil {{\n{}", bad_request)?;
                    writeln!(w, "{} = &value", var)?;
                    w.dedent();
                    writeln!(w, "}}")?;
                }
                TypeDef::Nullable(_) => {
                    writeln!(w, "if raw := {}; raw != \"\" {{", getter)?;
                    writeln!(w, "\tif err := parseParam(raw, &{}); err != nil {{", var)?;
                    writeln!(w, "\t\trespondError(res, http.StatusBadRequest, err)\n\t\treturn\n\t}}\n}}")?;
                }
                _ => {
                    writeln!(w, "if err := parseParam({}, &{}); err != nil {{\n{}", getter, var, bad_request)?;
                }
            }
            args.push(var);
        }
        if let Some(body) = &operation.body {
            writeln!(w, "var body {}", cx.resolver.expr(body, scope)?)?;
            writeln!(
                w,
                "if err := json.NewDecoder(req.Body).Decode(&body); err != nil {{\n{}",
                bad_request
            )?;
            args.push("body".to_string());
        }

        let call = format!("service.{}({})", operation.name.pascal_case(), args.join(", "));
        let internal = "\trespondError(res, http.StatusInternalServerError, err)\n\treturn\n}";
        if operation.has_multiple_responses() {
            writeln!(w, "result, err := {}", call)?;
            writeln!(w, "if err != nil {{\n{}", internal)?;
            for (response, code) in responses_with_codes(operation) {
                writeln!(w, "if result.{} != nil {{", response.status.pascal_case())?;
                if response.is_empty() {
                    writeln!(w, "\tres.WriteHeader({})", code)?;
                } else {
                    writeln!(w, "\trespondJSON(res, {}, result.{})", code, response.status.pascal_case())?;
                }
                writeln!(w, "\treturn\n}}")?;
            }
            writeln!(w, "respondMessage(res, http.StatusInternalServerError, \"response is not set\")")?;
        } else if let Some((response, code)) = responses_with_codes(operation).next() {
            if response.is_empty() {
                writeln!(w, "if err := {}; err != nil {{\n{}", call, internal)?;
                writeln!(w, "res.WriteHeader({})", code)?;
            } else {
                writeln!(w, "result, err := {}", call)?;
                writeln!(w, "if err != nil {{\n{}", internal)?;
                writeln!(w, "respondJSON(res, {}, result)", code)?;
            }
        }
        w.dedent();
        writeln!(w, "}})")?;
        Ok(())
    }

    fn routing_helpers(&self, w: &mut CodeWriter) -> Result<(), CodegenError> {
        w.write_str(
            "func parseParam(raw string, target interface{}) error {
\tif err := json.Unmarshal([]byte(raw), target); err == nil {
\t\treturn nil
\t}
\tquoted, err := json.Marshal(raw)
\tif err != nil {
\t\treturn err
\t}
\treturn json.Unmarshal(quoted, target)
}

func respondJSON(res http.ResponseWriter, status int, data interface{}) {
\tbody, err := json.Marshal(data)
\tif err != nil {
\t\trespondError(res, http.StatusInternalServerError, err)
\t\treturn
\t}
\tres.Header().Set(\"Content-Type\", \"application/json\")
\tres.WriteHeader(status)
\tres.Write(body)
}

func respondMessage(res http.ResponseWriter, status int, message string) {
\tbody, _ := json.Marshal(map[string]string{\"message\": message})
\tres.Header().Set(\"Content-Type\", \"application/json\")
\tres.WriteHeader(status)
\tres.Write(body)
}

func respondError(res http.ResponseWriter, status int, err error) {
\trespondMessage(res, status, err.Error())
}
",
        )?;
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
        errors_package: &str,
    ) -> Result<(), CodegenError> {
        let fail = error_prefix(operation);
        let url = versioned_url(version, operation);
        writeln!(
            w,
            "func (client *Client) {} {{",
            signature(cx, operation, api_module, scope)?
        )?;
        w.indent();
        if operation.endpoint.url_params.is_empty() {
            writeln!(w, "url := client.baseUrl + \"{}\"", url)?;
        } else {
            let format = rewrite_url(&url, |_| "%v".to_string());
            let args: Vec<String> = operation
                .endpoint
                .url_params
                .iter()
                .map(|p| ident(p.name.source()))
                .collect();
            writeln!(
                w,
                "url := client.baseUrl + fmt.Sprintf(\"{}\", {})",
                format,
                args.join(", ")
            )?;
        }
        let method = operation.endpoint.method.as_str();
        if operation.body.is_some() {
            writeln!(w, "bodyData, err := json.Marshal(body)")?;
            writeln!(w, "if err != nil {{\n\treturn {}err\n}}", fail)?;
            writeln!(w, "req, err := http.NewRequest(\"{}\", url, bytes.NewBuffer(bodyData))", method)?;
        } else {
            writeln!(w, "req, err := http.NewRequest(\"{}\", url, nil)", method)?;
        }
        writeln!(w, "if err != nil {{\n\treturn {}err\n}}", fail)?;
        if operation.body.is_some() {
            writeln!(w, "req.Header.Set(\"Content-Type\", \"application/json\")")?;
        }
        if !operation.query.is_empty() {
            writeln!(w, "query := req.URL.Query()")?;
            for param in &operation.query {
                self.set_value(w, param, "query.Add")?;
            }
            writeln!(w, "req.URL.RawQuery = query.Encode()")?;
        }
        for param in &operation.headers {
            self.set_value(w, param, "req.Header.Set")?;
        }
        writeln!(w, "resp, err := client.httpClient.Do(req)")?;
        writeln!(w, "if err != nil {{\n\treturn {}err\n}}", fail)?;
        writeln!(w, "defer resp.Body.Close()")?;
        writeln!(w, "switch resp.StatusCode {{")?;
        let multiple = operation.has_multiple_responses();
        let response_type = cx
            .resolver
            .member(api_module, &response_type_name(operation), scope);
        for (response, code) in responses_with_codes(operation) {
            writeln!(w, "case {}:", code)?;
            w.indent();
            let slot = response.status.pascal_case();
            if response.is_empty() {
                if multiple {
                    let empty_value = cx.resolver.member(
                        &cx.module(&Role::Empty, None),
                        "Value",
                        scope,
                    );
                    writeln!(w, "return &{}{{{}: &{}}}, nil", response_type, slot, empty_value)?;
                } else {
                    writeln!(w, "return nil")?;
                }
            } else {
                writeln!(w, "var result {}", cx.resolver.expr(&response_body(response), scope)?)?;
                writeln!(
                    w,
                    "if err := json.NewDecoder(resp.Body).Decode(&result); err != nil {{\n\treturn nil, err\n}}"
                )?;
                if multiple {
                    writeln!(w, "return &{}{{{}: &result}}, nil", response_type, slot)?;
                } else {
                    writeln!(w, "return &result, nil")?;
                }
            }
            w.dedent();
        }
        writeln!(w, "}}")?;
        writeln!(w, "return {}{}.HandleResponse(resp)", fail, errors_package)?;
        w.dedent();
        writeln!(w, "}}")?;
        Ok(())
    }

    fn set_value(&self, w: &mut CodeWriter, param: &Param, setter: &str) -> Result<(), CodegenError> {
        let var = ident(param.name.source());
        if is_pointer(&param.ty) {
            writeln!(w, "if {} != nil {{", var)?;
            writeln!(w, "\t{}(\"{}\", fmt.Sprint(*{}))\n}}", setter, param.name.source(), var)?;
        } else {
            writeln!(w, "{}(\"{}\", fmt.Sprint({}))", setter, param.name.source(), var)?;
        }
        Ok(())
    }
}

impl Backend for GoBackend {
    fn target(&self) -> Target {
        Target::Go
    }

    fn table(&self) -> TargetTable {
        table()
    }

    fn helpers(&self, cx: &EmitContext<'_>, out: &mut ArtifactSet) -> Result<(), CodegenError> {
        let enums = cx.module(&Role::Enums, None);
        let mut tracker = cx.tracker(&enums);
        tracker.add_library(JSON);
        tracker.add_library(FMT);
        let scope = tracker.finish();
        let body = "func contains(lookFor string, arr []string) bool {
\tfor _, value := range arr {
\t\tif lookFor == value {
\t\t\treturn true
\t\t}
\t}
\treturn false
}

func ReadStringValue(b []byte, values []string) (string, error) {
\tvar str string
\tif err := json.Unmarshal(b, &str); err != nil {
\t\treturn \"\", err
\t}
\tif !contains(str, values) {
\t\treturn \"\", fmt.Errorf(\"Unknown enum value: %s\", str)
\t}
\treturn str, nil
}
";
        out.push(Artifact::generated(
            enums.file("helpers.go"),
            source(&enums, &scope, body, true),
        ))?;

        let empty = cx.module(&Role::Empty, None);
        let body = "type Type struct{}\n\nvar Value = Type{}\n";
        out.push(Artifact::generated(
            empty.file("empty.go"),
            source(&empty, &ImportScope::bare(Arc::clone(&empty)), body, true),
        ))?;
        Ok(())
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
        let strict = cx.config.json_mode().checks_required();
        let mut contracts = Vec::with_capacity(models.len());
        for model in models {
            contracts.push(cx.contract(scope_of_models, model)?);
        }
        let checks_objects = strict
            && contracts.iter().any(|c| {
                matches!(c, SerializationContract::Object { .. }) && !c.required_fields().is_empty()
            });
        let has_union = models.iter().any(|m| matches!(m.kind, specgen_core::spec::ModelKind::OneOf { .. }));
        let has_tagged = contracts.iter().any(|c| {
            matches!(
                c,
                SerializationContract::OneOf {
                    encoding: UnionEncoding::Discriminated { .. },
                    ..
                }
            )
        });
        let has_enum = models.iter().any(NamedModel::is_enum);

        let mut tracker = cx.tracker(module);
        if checks_objects || has_union {
            tracker.add_library(JSON);
            tracker.add_library(ERRORS);
        }
        if has_enum {
            tracker.add_module(&Role::Enums, None);
        }
        for model in models {
            let types: Vec<TypeDef> = model.types().into_iter().map(optional_if_union(model)).collect();
            tracker.add_types(&types)?;
        }
        let scope = tracker.finish();
        let enums_module = cx.module(&Role::Enums, None);
        let enums_package = scope
            .local_name(&enums_module)
            .unwrap_or_else(|| enums_module.alias())
            .to_string();

        let mut w = CodeWriter::tabs();
        for (i, (model, contract)) in models.iter().zip(&contracts).enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            match &model.kind {
                specgen_core::spec::ModelKind::Object { .. } => {
                    self.object(cx, &mut w, model, contract, &scope)?
                }
                specgen_core::spec::ModelKind::Enum { .. } => {
                    self.enumeration(&mut w, model, &enums_package)?
                }
                specgen_core::spec::ModelKind::OneOf { .. } => {
                    self.union(cx, &mut w, model, contract, &scope)?
                }
            }
        }
        if checks_objects {
            w.write_str(
                "
func checkRequiredFields(data []byte, fields []string) error {
\tvar rawMap map[string]json.RawMessage
\tif err := json.Unmarshal(data, &rawMap); err != nil {
\t\treturn errors.New(\"failed to check fields in json: \" + err.Error())
\t}
\tfor _, name := range fields {
\t\tvalue, found := rawMap[name]
\t\tif !found {
\t\t\treturn errors.New(\"required field missing: \" + name)
\t\t}
\t\tif string(value) == \"null\" {
\t\t\treturn errors.New(\"required field doesn't have value: \" + name)
\t\t}
\t}
\treturn nil
}
",
            )?;
        }
        if has_tagged {
            w.write_str(
                "
func marshalTagged(field string, tag string, value interface{}) ([]byte, error) {
\tdata, err := json.Marshal(value)
\tif err != nil {
\t\treturn nil, err
\t}
\tvar rawMap map[string]json.RawMessage
\tif err := json.Unmarshal(data, &rawMap); err != nil {
\t\treturn nil, err
\t}
\ttagData, err := json.Marshal(tag)
\tif err != nil {
\t\treturn nil, err
\t}
\trawMap[field] = tagData
\treturn json.Marshal(rawMap)
}
",
            )?;
        }
        out.push(Artifact::generated(
            module.file("models.go"),
            source(module, &scope, &w.finish(), true),
        ))
    }

    fn errors(&self, cx: &EmitContext<'_>, out: &mut ArtifactSet) -> Result<(), CodegenError> {
        let module = cx.module(&Role::Errors, None);
        let responses = &cx.spec.errors().responses;
        let has_bodies = responses.iter().any(|r| !r.is_empty());

        let mut tracker = cx.tracker(&module);
        if has_bodies {
            tracker.add_library(JSON);
        }
        tracker.add_library(FMT);
        tracker.add_library(HTTP);
        for response in responses.iter().filter(|r| !r.is_empty()) {
            tracker.add_type(&response_body(response))?;
        }
        let scope = tracker.finish();

        let mut w = CodeWriter::tabs();
        for response in responses {
            let name = response.status.pascal_case();
            if response.is_empty() {
                writeln!(w, "type {} struct{{}}", name)?;
            } else {
                writeln!(w, "type {} struct {{", name)?;
                writeln!(w, "\tBody {}", cx.resolver.expr(&response_body(response), &scope)?)?;
                writeln!(w, "}}")?;
            }
            writeln!(w)?;
            writeln!(w, "func (e *{}) Error() string {{", name)?;
            writeln!(w, "\treturn \"{}\"", response.status)?;
            writeln!(w, "}}")?;
            writeln!(w)?;
        }
        writeln!(w, "type UnexpectedStatus struct {{\n\tStatusCode int\n}}")?;
        writeln!(w)?;
        writeln!(w, "func (e *UnexpectedStatus) Error() string {{")?;
        writeln!(w, "\treturn fmt.Sprintf(\"unexpected response status: %d\", e.StatusCode)")?;
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(w, "func HandleResponse(resp *http.Response) error {{")?;
        w.indent();
        if !responses.is_empty() {
            writeln!(w, "switch resp.StatusCode {{")?;
            for response in responses {
                let Some(code) = response.status_code() else {
                    continue;
                };
                let name = response.status.pascal_case();
                writeln!(w, "case {}:", code)?;
                w.indent();
                if response.is_empty() {
                    writeln!(w, "return &{}{{}}", name)?;
                } else {
                    writeln!(w, "var body {}", cx.resolver.expr(&response_body(response), &scope)?)?;
                    writeln!(
                        w,
                        "if err := json.NewDecoder(resp.Body).Decode(&body); err != nil {{\n\treturn err\n}}"
                    )?;
                    writeln!(w, "return &{}{{Body: body}}", name)?;
                }
                w.dedent();
            }
            writeln!(w, "}}")?;
        }
        writeln!(w, "return &UnexpectedStatus{{StatusCode: resp.StatusCode}}")?;
        w.dedent();
        writeln!(w, "}}")?;

        out.push(Artifact::generated(
            module.file("errors.go"),
            source(&module, &scope, &w.finish(), true),
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
            for response in &operation.responses {
                tracker.add_type(&optional(&response_body(response)))?;
            }
        }
        let scope = tracker.finish();

        let mut w = CodeWriter::tabs();
        for (i, operation) in multi.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            writeln!(w, "type {} struct {{", response_type_name(operation))?;
            w.indent();
            for response in &operation.responses {
                writeln!(
                    w,
                    "{} {}",
                    response.status.pascal_case(),
                    cx.resolver.expr(&optional(&response_body(response)), &scope)?
                )?;
            }
            w.dedent();
            writeln!(w, "}}")?;
        }
        out.push(Artifact::generated(
            module.file("responses.go"),
            source(&module, &scope, &w.finish(), true),
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
        let has_body = api.operations.iter().any(|o| o.body.is_some());
        let decodes = api
            .operations
            .iter()
            .any(|o| o.responses.iter().any(|r| !r.is_empty()));
        let formats = api.operations.iter().any(|o| {
            !o.endpoint.url_params.is_empty() || !o.query.is_empty() || !o.headers.is_empty()
        });
        let multi_empty = api
            .operations
            .iter()
            .any(|o| o.has_multiple_responses() && o.responses.iter().any(|r| r.is_empty()));

        let mut tracker = cx.tracker(&module);
        if has_body {
            tracker.add_library(BYTES);
        }
        if has_body || decodes {
            tracker.add_library(JSON);
        }
        if formats {
            tracker.add_library(FMT);
        }
        tracker.add_library(HTTP);
        let errors_module = tracker.add_module(&Role::Errors, None);
        if multi_empty {
            tracker.add_module(&Role::Empty, None);
        }
        add_operation_types(&mut tracker, api)?;
        for operation in api.operations.iter().filter(|o| o.has_multiple_responses()) {
            let bodies: Vec<TypeDef> = operation
                .responses
                .iter()
                .filter(|r| !r.is_empty())
                .map(response_body)
                .collect();
            tracker.add_types(&bodies)?;
        }
        let scope = tracker.finish();
        let errors_package = scope
            .local_name(&errors_module)
            .unwrap_or_else(|| errors_module.alias())
            .to_string();

        let mut w = CodeWriter::tabs();
        writeln!(w, "type Client struct {{\n\tbaseUrl    string\n\thttpClient *http.Client\n}}")?;
        writeln!(w)?;
        writeln!(w, "func NewClient(baseUrl string) *Client {{")?;
        writeln!(w, "\treturn &Client{{baseUrl: baseUrl, httpClient: &http.Client{{}}}}\n}}")?;
        for operation in &api.operations {
            writeln!(w)?;
            self.client_method(cx, &mut w, version, operation, &module, &scope, &errors_package)?;
        }
        out.push(Artifact::generated(
            module.file("client.go"),
            source(&module, &scope, &w.finish(), true),
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

            let mut w = CodeWriter::tabs();
            writeln!(w, "type Service interface {{")?;
            w.indent();
            for operation in &api.operations {
                writeln!(w, "{}", signature(cx, operation, &module, &scope)?)?;
            }
            w.dedent();
            writeln!(w, "}}")?;
            out.push(Artifact::generated(
                module.file("service.go"),
                source(&module, &scope, &w.finish(), true),
            ))?;
        }

        if version.apis.is_empty() {
            return Ok(());
        }
        let server = cx.config.server();
        let routing = cx.module(&Role::Routing, Some(&version.name));
        let mut tracker = cx.tracker(&routing);
        tracker.add_library(JSON);
        tracker.add_library(HTTP);
        tracker.add_library(self.router_library(server).0);
        let mut api_modules = Vec::new();
        for api in &version.apis {
            api_modules.push(tracker.add_module(&Role::Api(api.name.clone()), Some(&version.name)));
        }
        for api in &version.apis {
            for operation in &api.operations {
                let mut types: Vec<TypeDef> = operation_params(operation).map(|p| p.ty.clone()).collect();
                for param in operation.query.iter().chain(&operation.headers) {
                    if let TypeDef::Nullable(child) = &param.ty {
                        types.push((**child).clone());
                    }
                }
                types.extend(operation.body.iter().cloned());
                tracker.add_types(&types)?;
            }
        }
        let scope = tracker.finish();
        let (router_type, router_package) = self.router_type(server, &scope);

        let mut w = CodeWriter::tabs();
        for (api, api_module) in version.apis.iter().zip(&api_modules) {
            let service_type = cx.resolver.member(api_module, "Service", &scope);
            writeln!(
                w,
                "func Add{}Routes(router {}, service {}) {{",
                api.name.pascal_case(),
                router_type,
                service_type
            )?;
            w.indent();
            for operation in &api.operations {
                self.handler(cx, &mut w, version, operation, &scope, &router_package)?;
            }
            w.dedent();
            writeln!(w, "}}")?;
            writeln!(w)?;
        }
        self.routing_helpers(&mut w)?;
        out.push(Artifact::generated(
            routing.file("routing.go"),
            source(&routing, &scope, &w.finish(), true),
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
        let api_module = cx.module(&Role::Api(api.name.clone()), Some(&version.name));
        let mut tracker = cx.tracker(&module);
        tracker.add_library(FMT);
        if api.operations.iter().any(|o| o.has_multiple_responses()) {
            tracker.add_module(&Role::Api(api.name.clone()), Some(&version.name));
        }
        add_operation_types(&mut tracker, api)?;
        let scope = tracker.finish();

        let service = format!("{}Service", api.name.pascal_case());
        let mut w = CodeWriter::tabs();
        writeln!(w, "type {} struct{{}}", service)?;
        for operation in &api.operations {
            writeln!(w)?;
            writeln!(
                w,
                "func (service *{}) {} {{",
                service,
                signature(cx, operation, &api_module, &scope)?
            )?;
            writeln!(
                w,
                "\treturn {}fmt.Errorf(\"{} is not implemented\")",
                error_prefix(operation),
                operation.name.pascal_case()
            )?;
            writeln!(w, "}}")?;
        }
        out.push(Artifact::scaffolded(
            module.file(&format!("{}.go", api.name.snake_case())),
            source(&module, &scope, &w.finish(), false),
        ))
    }

    fn finish(&self, cx: &EmitContext<'_>, out: &mut ArtifactSet) -> Result<(), CodegenError> {
        let outputs = cx.config.outputs();
        let versions: Vec<&Version> = cx
            .spec
            .versions()
            .iter()
            .filter(|v| !v.apis.is_empty())
            .collect();
        if !outputs.needs_service() || versions.is_empty() {
            return Ok(());
        }
        let server = cx.config.server();
        let root = cx.module(&Role::Root, None);
        let mut tracker = cx.tracker(&root);
        tracker.add_library(self.router_library(server).0);
        let mut mounts = Vec::new();
        for version in &versions {
            let routing = tracker.add_module(&Role::Routing, Some(&version.name));
            for api in &version.apis {
                let api_module = tracker.add_module(&Role::Api(api.name.clone()), Some(&version.name));
                mounts.push((version, api, Arc::clone(&routing), api_module));
            }
        }
        let scope = tracker.finish();
        let (router_type, _) = self.router_type(server, &scope);

        let mut params = Vec::new();
        let mut calls = Vec::new();
        for (version, api, routing, api_module) in &mounts {
            let var = format!("{}{}", version.name.flat_case(), api.name.pascal_case());
            let var = ident(&var);
            params.push(format!(
                "{} {}",
                var,
                cx.resolver.member(api_module, "Service", &scope)
            ));
            calls.push(format!(
                "{}(router, {})",
                cx.resolver
                    .member(routing, &format!("Add{}Routes", api.name.pascal_case()), &scope),
                var
            ));
        }
        let mut w = CodeWriter::tabs();
        writeln!(w, "func AddRoutes(router {}, {}) {{", router_type, params.join(", "))?;
        w.indent();
        for call in calls {
            writeln!(w, "{}", call)?;
        }
        w.dedent();
        writeln!(w, "}}")?;
        out.push(Artifact::generated(
            root.file("spec_routing.go"),
            source(&root, &scope, &w.finish(), true),
        ))
    }
}

/// Union slots are always optional; other model types are used as declared.
fn optional_if_union(model: &NamedModel) -> impl Fn(&TypeDef) -> TypeDef + '_ {
    move |ty| match model.kind {
        specgen_core::spec::ModelKind::OneOf { .. } => optional(ty),
        _ => ty.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_avoids_reserved_words() {
        assert_eq!(ident("type"), "type_");
        assert_eq!(ident("Request-Id"), "requestId");
        assert_eq!(ident("body"), "body_");
    }

    #[test]
    fn test_package_name() {
        assert_eq!(package_name(&Module::new("github.com/acme/pet-store")), "pet_store");
        assert_eq!(package_name(&Module::new("acme").submodule("v1")), "v1");
    }
}
