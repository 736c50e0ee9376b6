//! TypeScript backend: interfaces with encode/decode guards, `fetch`
//! clients and `express` routing.

use std::fmt::Write;
use std::sync::Arc;

use specgen_core::contract::{SerializationContract, UnionCase, UnionEncoding};
use specgen_core::module_registry::{Module, Role};
use specgen_core::naming::to_camel_case;
use specgen_core::spec::{Api, NamedModel, NamedOperation, Param, Version};
use specgen_core::types::{ModelRef, ModelScope, PlainType, Primitive, TypeDef, TypeFolder};
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

const EXPRESS: &str = "express";

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "let", "static", "yield", "await",
    "implements", "interface", "package", "private", "protected", "public", "url", "headers",
    "resp", "req", "res", "body", "result", "service", "router", "err",
];

pub struct TypeScriptBackend;

pub fn table() -> TargetTable {
    TargetTable::new(
        [
            (Primitive::Int32, PrimitiveMapping::builtin("number")),
            (Primitive::Int64, PrimitiveMapping::builtin("number")),
            (Primitive::Float, PrimitiveMapping::builtin("number")),
            (Primitive::Double, PrimitiveMapping::builtin("number")),
            (Primitive::Decimal, PrimitiveMapping::builtin("number")),
            (Primitive::Boolean, PrimitiveMapping::builtin("boolean")),
            (Primitive::String, PrimitiveMapping::builtin("string")),
            (Primitive::Uuid, PrimitiveMapping::builtin("string")),
            (Primitive::Date, PrimitiveMapping::builtin("string")),
            (Primitive::DateTime, PrimitiveMapping::builtin("string")),
            (Primitive::Json, PrimitiveMapping::builtin("unknown")),
            (Primitive::Empty, PrimitiveMapping::module(Role::Empty, "Empty")),
        ],
        NullablePolicy::Native(Wrapper::new("", " | null")),
        Wrapper::new("Array<", ">"),
        Wrapper::new("Record<string, ", ">"),
        ".",
    )
}

fn ident(name: &str) -> String {
    let camel = to_camel_case(name);
    if RESERVED.contains(&camel.as_str()) {
        format!("{}_", camel)
    } else {
        camel
    }
}

/// Object key, quoted unless it is a plain identifier.
fn property(key: &str) -> String {
    let plain = key.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        key.to_string()
    } else {
        format!("'{}'", key)
    }
}

/// Import specifier of `to` as seen from a file directly inside `from`.
fn relative(from: &Module, to: &Module) -> String {
    let from = from.segments();
    let to = to.segments();
    let common = from.iter().zip(to).take_while(|(a, b)| a == b).count();
    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend(to[common..].iter().map(String::as_str));
    if from.len() == common {
        format!("./{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

fn source(scope: &ImportScope, body: &str, generated: bool) -> String {
    let mut out = String::new();
    if generated {
        out.push_str("// ");
        out.push_str(GENERATED_HEADER);
        out.push_str("\n\n");
    }
    for directive in scope.directives() {
        let from = match &directive.target {
            ImportTarget::Module(module) => relative(scope.current(), module),
            ImportTarget::Library(path) => path.clone(),
        };
        out.push_str(&format!(
            "import * as {} from '{}';\n",
            directive.local_name(),
            from
        ));
    }
    if !scope.is_empty() {
        out.push('\n');
    }
    out.push_str(body);
    out
}

fn is_string(ty: &TypeDef, cx: &EmitContext<'_>) -> bool {
    match ty {
        TypeDef::Plain(PlainType::Primitive(p)) => cx
            .resolver
            .table()
            .primitive(*p)
            .is_some_and(|m| m.name == "string"),
        _ => false,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encode,
    Decode,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::Encode => "encode",
            Direction::Decode => "decode",
        }
    }

    fn param(self) -> &'static str {
        match self {
            Direction::Encode => "any",
            Direction::Decode => "unknown",
        }
    }
}

/// Folds a type into the function that converts one value of it, or `None`
/// when the value passes through unchanged.
struct Codec<'a, 'c> {
    cx: &'a EmitContext<'c>,
    scope: &'a ImportScope,
    direction: Direction,
}

impl Codec<'_, '_> {
    fn helper(&self, name: &str) -> String {
        let enums = self.cx.module(&Role::Enums, None);
        self.cx.resolver.member(&enums, name, self.scope)
    }

    fn lift(&self, helper: &str, inner: Option<String>) -> Option<String> {
        inner.map(|f| {
            format!(
                "(v: {}) => {}(v, {})",
                self.direction.param(),
                self.helper(helper),
                f
            )
        })
    }

    /// Expression converting `value`, composites mapped element-wise.
    fn apply(&mut self, ty: &TypeDef, value: &str) -> Result<Option<String>, CodegenError> {
        let (helper, child) = match ty {
            TypeDef::Plain(_) => {
                return Ok(ty.fold(self)?.map(|f| format!("{}({})", f, value)));
            }
            TypeDef::Nullable(child) => ("mapNullable", child),
            TypeDef::Array(child) => ("mapArray", child),
            TypeDef::Map(child) => ("mapRecord", child),
        };
        Ok(child
            .fold(self)?
            .map(|f| format!("{}({}, {})", self.helper(helper), value, f)))
    }
}

impl TypeFolder for Codec<'_, '_> {
    type Output = Option<String>;
    type Error = CodegenError;

    fn primitive(&mut self, _: Primitive) -> Result<Option<String>, CodegenError> {
        Ok(None)
    }

    fn model(&mut self, model: &ModelRef) -> Result<Option<String>, CodegenError> {
        let module = self.cx.resolver.model_module(model)?;
        let name = format!("{}{}", self.direction.prefix(), model.name.pascal_case());
        Ok(Some(self.cx.resolver.member(&module, &name, self.scope)))
    }

    fn nullable(&mut self, _: &TypeDef, inner: Option<String>) -> Result<Option<String>, CodegenError> {
        Ok(self.lift("mapNullable", inner))
    }

    fn array(&mut self, _: &TypeDef, inner: Option<String>) -> Result<Option<String>, CodegenError> {
        Ok(self.lift("mapArray", inner))
    }

    fn map(&mut self, _: &TypeDef, inner: Option<String>) -> Result<Option<String>, CodegenError> {
        Ok(self.lift("mapRecord", inner))
    }
}

/// Converter function for `ty`, if it has one.
fn codec(
    cx: &EmitContext<'_>,
    ty: &TypeDef,
    scope: &ImportScope,
    direction: Direction,
) -> Result<Option<String>, CodegenError> {
    ty.fold(&mut Codec {
        cx,
        scope,
        direction,
    })
}

/// True if converting `ty` goes through the shared helpers module.
fn needs_helpers(ty: &TypeDef) -> bool {
    !matches!(ty, TypeDef::Plain(_)) && !ty.referenced_models().is_empty()
}

/// Expression decoding `data` into `ty`.
fn decode(
    cx: &EmitContext<'_>,
    ty: &TypeDef,
    data: &str,
    scope: &ImportScope,
) -> Result<String, CodegenError> {
    let mut codec = Codec {
        cx,
        scope,
        direction: Direction::Decode,
    };
    match codec.apply(ty, data)? {
        Some(call) if ty.as_model().is_some() => Ok(call),
        Some(call) => Ok(format!("{} as {}", call, cx.resolver.expr(ty, scope)?)),
        None => Ok(format!("({}) as {}", data, cx.resolver.expr(ty, scope)?)),
    }
}

fn encode(
    cx: &EmitContext<'_>,
    ty: &TypeDef,
    value: &str,
    scope: &ImportScope,
) -> Result<String, CodegenError> {
    let mut codec = Codec {
        cx,
        scope,
        direction: Direction::Encode,
    };
    Ok(codec.apply(ty, value)?.unwrap_or_else(|| value.to_string()))
}

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
        _ => Ok("void".to_string()),
    }
}

fn signature(
    cx: &EmitContext<'_>,
    operation: &NamedOperation,
    api_module: &Module,
    scope: &ImportScope,
    unused: bool,
) -> Result<String, CodegenError> {
    let prefix = if unused { "_" } else { "" };
    let mut params = Vec::new();
    for param in operation_params(operation) {
        params.push(format!(
            "{}{}: {}",
            prefix,
            ident(param.name.source()),
            cx.resolver.expr(&param.ty, scope)?
        ));
    }
    if let Some(body) = &operation.body {
        params.push(format!("{}body: {}", prefix, cx.resolver.expr(body, scope)?));
    }
    Ok(format!(
        "{}({}): Promise<{}>",
        operation.name.camel_case(),
        params.join(", "),
        success_type(cx, operation, api_module, scope)?
    ))
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
        let types = operation_types(operation);
        if types.iter().any(needs_helpers) {
            tracker.add_module(&Role::Enums, None);
        }
        tracker.add_types(&types)?;
    }
    Ok(())
}

impl TypeScriptBackend {
    fn guards(
        &self,
        w: &mut CodeWriter,
        name: &str,
        check: Option<String>,
    ) -> Result<(), CodegenError> {
        writeln!(w)?;
        writeln!(w, "export function encode{}(value: {}): unknown {{", name, name)?;
        if let Some(check) = &check {
            writeln!(w, "  {};", check.replace("{}", "value"))?;
        }
        writeln!(w, "  return value;")?;
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(w, "export function decode{}(data: unknown): {} {{", name, name)?;
        if let Some(check) = &check {
            writeln!(w, "  {};", check.replace("{}", "data"))?;
        }
        writeln!(w, "  return data as {};", name)?;
        writeln!(w, "}}")?;
        Ok(())
    }

    /// Guards for record-shaped models whose members convert through their
    /// own encoders and decoders.
    #[allow(clippy::too_many_arguments)]
    fn record_guards(
        &self,
        cx: &EmitContext<'_>,
        w: &mut CodeWriter,
        name: &str,
        check: Option<String>,
        members: &[(&str, &TypeDef)],
        scope: &ImportScope,
        helpers: &str,
    ) -> Result<(), CodegenError> {
        let mut encoders = Vec::new();
        let mut decoders = Vec::new();
        for (key, ty) in members {
            let ty = match ty {
                TypeDef::Nullable(child) => child.as_ref(),
                other => *other,
            };
            if let Some(f) = codec(cx, ty, scope, Direction::Encode)? {
                encoders.push((*key, f));
            }
            if let Some(f) = codec(cx, ty, scope, Direction::Decode)? {
                decoders.push((*key, f));
            }
        }
        if encoders.is_empty() && decoders.is_empty() {
            return self.guards(w, name, check);
        }

        writeln!(w)?;
        writeln!(w, "export function encode{}(value: {}): unknown {{", name, name)?;
        if let Some(check) = &check {
            writeln!(w, "  {};", check.replace("{}", "value"))?;
        }
        writeln!(w, "  const result: Record<string, unknown> = {{ ...value }};")?;
        for (key, f) in &encoders {
            writeln!(w, "  {}.convertField(result, '{}', {});", helpers, key, f)?;
        }
        writeln!(w, "  return result;")?;
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(w, "export function decode{}(data: unknown): {} {{", name, name)?;
        if let Some(check) = &check {
            writeln!(w, "  {};", check.replace("{}", "data"))?;
        }
        writeln!(
            w,
            "  const result: Record<string, unknown> = {{ ...{}.asRecord(data) }};",
            helpers
        )?;
        for (key, f) in &decoders {
            writeln!(w, "  {}.convertField(result, '{}', {});", helpers, key, f)?;
        }
        writeln!(w, "  return result as unknown as {};", name)?;
        writeln!(w, "}}")?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn discriminated_guards(
        &self,
        cx: &EmitContext<'_>,
        w: &mut CodeWriter,
        name: &str,
        field: &str,
        list: &str,
        cases: &[UnionCase],
        scope: &ImportScope,
        helpers: &str,
    ) -> Result<(), CodegenError> {
        let read = format!("{}.readDiscriminator({{}}, '{}', {})", helpers, field, list);
        let unreachable = format!(
            "  throw new {}.ContractError(`unexpected union discriminator field {} value`);",
            helpers, field
        );

        writeln!(w)?;
        writeln!(w, "export function encode{}(value: {}): unknown {{", name, name)?;
        writeln!(w, "  switch ({}) {{", read.replace("{}", "value"))?;
        for case in cases {
            let item = format!("value as {}", cx.resolver.expr(&case.ty, scope)?);
            let encoded = match codec(cx, &case.ty, scope, Direction::Encode)? {
                Some(f) => format!("{}({})", f, item),
                None => item,
            };
            writeln!(w, "    case '{}':", case.tag)?;
            writeln!(
                w,
                "      return {{ ...{}.asRecord({}), {}: '{}' }};",
                helpers,
                encoded,
                property(field),
                case.tag
            )?;
        }
        writeln!(w, "  }}")?;
        writeln!(w, "{}", unreachable)?;
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(w, "export function decode{}(data: unknown): {} {{", name, name)?;
        writeln!(w, "  switch ({}) {{", read.replace("{}", "data"))?;
        for case in cases {
            writeln!(w, "    case '{}':", case.tag)?;
            writeln!(
                w,
                "      return {{ ...{}, {}: '{}' }};",
                decode(cx, &case.ty, "data", scope)?,
                property(field),
                case.tag
            )?;
        }
        writeln!(w, "  }}")?;
        writeln!(w, "{}", unreachable)?;
        writeln!(w, "}}")?;
        Ok(())
    }

    fn model(
        &self,
        cx: &EmitContext<'_>,
        w: &mut CodeWriter,
        model: &NamedModel,
        contract: &SerializationContract,
        scope: &ImportScope,
        helpers: &str,
    ) -> Result<(), CodegenError> {
        let name = model.name.pascal_case();
        if let Some(description) = &model.description {
            writeln!(w, "/** {} */", description)?;
        }
        match contract {
            SerializationContract::Object { fields, .. } => {
                writeln!(w, "export interface {} {{", name)?;
                for field in fields {
                    let optional = if field.required { "" } else { "?" };
                    writeln!(
                        w,
                        "  {}{}: {};",
                        property(&field.key),
                        optional,
                        cx.resolver.expr(&field.ty, scope)?
                    )?;
                }
                writeln!(w, "}}")?;
                let required = contract.required_fields();
                let check = if cx.config.json_mode().checks_required() && !required.is_empty() {
                    let list = format!("{}RequiredFields", model.name.camel_case());
                    let quoted: Vec<String> = required.iter().map(|f| format!("'{}'", f)).collect();
                    writeln!(w)?;
                    writeln!(w, "const {} = [{}];", list, quoted.join(", "))?;
                    Some(format!("{}.checkRequiredFields({{}}, {})", helpers, list))
                } else {
                    None
                };
                let members: Vec<(&str, &TypeDef)> =
                    fields.iter().map(|f| (f.key.as_str(), &f.ty)).collect();
                self.record_guards(cx, w, &name, check, &members, scope, helpers)
            }
            SerializationContract::Enum { literals, .. } => {
                let quoted: Vec<String> = literals.iter().map(|l| format!("'{}'", l)).collect();
                writeln!(w, "export type {} = {};", name, quoted.join(" | "))?;
                writeln!(w)?;
                writeln!(
                    w,
                    "export const {}Values: readonly {}[] = [{}];",
                    name,
                    name,
                    quoted.join(", ")
                )?;
                writeln!(w)?;
                writeln!(w, "export function encode{}(value: {}): unknown {{", name, name)?;
                writeln!(w, "  return value;")?;
                writeln!(w, "}}")?;
                writeln!(w)?;
                writeln!(w, "export function decode{}(data: unknown): {} {{", name, name)?;
                writeln!(w, "  return {}.readEnumValue(data, {}Values);", helpers, name)?;
                writeln!(w, "}}")?;
                Ok(())
            }
            SerializationContract::OneOf {
                cases, encoding, ..
            } => {
                let tags: Vec<String> = cases.iter().map(|c| format!("'{}'", c.tag)).collect();
                let list = format!("{}Cases", model.name.camel_case());
                match encoding {
                    UnionEncoding::Wrapper => {
                        writeln!(w, "export interface {} {{", name)?;
                        for case in cases {
                            writeln!(
                                w,
                                "  {}?: {};",
                                property(&case.tag),
                                cx.resolver.expr(&case.ty, scope)?
                            )?;
                        }
                        writeln!(w, "}}")?;
                        writeln!(w)?;
                        writeln!(w, "const {} = [{}];", list, tags.join(", "))?;
                        let check = format!("{}.checkOneCase({{}}, {})", helpers, list);
                        let members: Vec<(&str, &TypeDef)> =
                            cases.iter().map(|c| (c.tag.as_str(), &c.ty)).collect();
                        self.record_guards(cx, w, &name, Some(check), &members, scope, helpers)
                    }
                    UnionEncoding::Discriminated { field } => {
                        let mut variants = Vec::new();
                        for case in cases {
                            variants.push(format!(
                                "({{ {}: '{}' }} & {})",
                                property(field),
                                case.tag,
                                cx.resolver.expr(&case.ty, scope)?
                            ));
                        }
                        writeln!(w, "export type {} =", name)?;
                        for (i, variant) in variants.iter().enumerate() {
                            let end = if i + 1 == variants.len() { ";" } else { "" };
                            writeln!(w, "  | {}{}", variant, end)?;
                        }
                        writeln!(w)?;
                        writeln!(w, "const {} = [{}];", list, tags.join(", "))?;
                        self.discriminated_guards(
                            cx, w, &name, field, &list, cases, scope, helpers,
                        )
                    }
                }
            }
        }
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
        writeln!(w, "async {} {{", signature(cx, operation, api_module, scope, false)?)?;
        w.indent();
        let url = rewrite_url(&versioned_url(version, operation), |p| {
            let var = operation
                .endpoint
                .url_params
                .iter()
                .find(|u| u.name.source() == p)
                .map_or_else(|| ident(p), |u| ident(u.name.source()));
            format!("${{encodeURIComponent(paramValue({}))}}", var)
        });
        writeln!(w, "const url = new URL(`${{this.baseUrl}}{}`);", url)?;
        for param in &operation.query {
            self.attach(w, param, "url.searchParams.set")?;
        }
        writeln!(w, "const headers: Record<string, string> = {{}};")?;
        for param in &operation.headers {
            let var = ident(param.name.source());
            if param.ty.is_nullable() {
                writeln!(w, "if ({} !== null && {} !== undefined) {{", var, var)?;
                writeln!(w, "  headers['{}'] = paramValue({});", param.name.source(), var)?;
                writeln!(w, "}}")?;
            } else {
                writeln!(w, "headers['{}'] = paramValue({});", param.name.source(), var)?;
            }
        }
        let method = operation.endpoint.method.as_str();
        match &operation.body {
            Some(body) => {
                writeln!(w, "headers['Content-Type'] = 'application/json';")?;
                writeln!(w, "const resp = await fetch(url.toString(), {{")?;
                writeln!(w, "  method: '{}',", method)?;
                writeln!(w, "  headers,")?;
                writeln!(w, "  body: JSON.stringify({}),", encode(cx, body, "body", scope)?)?;
                writeln!(w, "}});")?;
            }
            None => writeln!(
                w,
                "const resp = await fetch(url.toString(), {{ method: '{}', headers }});",
                method
            )?,
        }
        writeln!(w, "switch (resp.status) {{")?;
        w.indent();
        for (response, code) in responses_with_codes(operation) {
            writeln!(w, "case {}:", code)?;
            let value = if response.is_empty() {
                None
            } else {
                Some(decode(cx, &response_body(response), "await resp.json()", scope)?)
            };
            let statement = match (operation.has_multiple_responses(), value) {
                (true, Some(value)) => {
                    format!("return {{ status: '{}', body: {} }};", response.status, value)
                }
                (true, None) => format!("return {{ status: '{}' }};", response.status),
                (false, Some(value)) => format!("return {};", value),
                (false, None) => "return;".to_string(),
            };
            writeln!(w, "  {}", statement)?;
        }
        w.dedent();
        writeln!(w, "}}")?;
        writeln!(
            w,
            "throw await {}(resp);",
            cx.resolver.member(errors_module, "handleResponse", scope)
        )?;
        w.dedent();
        writeln!(w, "}}")?;
        Ok(())
    }

    fn attach(&self, w: &mut CodeWriter, param: &Param, setter: &str) -> Result<(), CodegenError> {
        let var = ident(param.name.source());
        if param.ty.is_nullable() {
            writeln!(w, "if ({} !== null && {} !== undefined) {{", var, var)?;
            writeln!(w, "  {}('{}', paramValue({}));", setter, param.name.source(), var)?;
            writeln!(w, "}}")?;
        } else {
            writeln!(w, "{}('{}', paramValue({}));", setter, param.name.source(), var)?;
        }
        Ok(())
    }

    fn handler(
        &self,
        cx: &EmitContext<'_>,
        w: &mut CodeWriter,
        version: &Version,
        operation: &NamedOperation,
        scope: &ImportScope,
        express: &str,
    ) -> Result<(), CodegenError> {
        let path = rewrite_url(&versioned_url(version, operation), |p| format!(":{}", p));
        writeln!(
            w,
            "router.{}('{}', async (req: {}.Request, res: {}.Response) => {{",
            operation.endpoint.method.as_str().to_ascii_lowercase(),
            path,
            express,
            express
        )?;
        w.indent();
        writeln!(w, "try {{")?;
        w.indent();
        let mut args = Vec::new();
        let sources = operation
            .endpoint
            .url_params
            .iter()
            .map(|p| (p, format!("req.params['{}']", p.name.source())))
            .chain(
                operation
                    .query
                    .iter()
                    .map(|p| (p, format!("req.query['{}']", p.name.source()))),
            )
            .chain(
                operation
                    .headers
                    .iter()
                    .map(|p| (p, format!("req.header('{}')", p.name.source()))),
            );
        for (param, raw) in sources {
            let var = ident(param.name.source());
            let ty = cx.resolver.expr(&param.ty, scope)?;
            let (inner, nullable) = match &param.ty {
                TypeDef::Nullable(child) => (child.as_ref(), true),
                other => (other, false),
            };
            let parse = !is_string(inner, cx) && inner.as_model().is_none();
            let read = if nullable {
                format!("optional({}, {})", raw, parse)
            } else {
                format!("required({}, '{}', {})", raw, param.name.source(), parse)
            };
            if param.ty.referenced_models().is_empty() {
                writeln!(w, "const {} = {} as {};", var, read, ty)?;
            } else {
                writeln!(
                    w,
                    "const {} = decodeBody(() => {});",
                    var,
                    decode(cx, &param.ty, &read, scope)?
                )?;
            }
            args.push(var);
        }
        if let Some(body) = &operation.body {
            writeln!(
                w,
                "const body = decodeBody(() => {});",
                decode(cx, body, "req.body", scope)?
            )?;
            args.push("body".to_string());
        }
        let call = format!("await service.{}({})", operation.name.camel_case(), args.join(", "));
        if operation.has_multiple_responses() {
            writeln!(w, "const result = {};", call)?;
            writeln!(w, "switch (result.status) {{")?;
            w.indent();
            for (response, code) in responses_with_codes(operation) {
                writeln!(w, "case '{}':", response.status)?;
                if response.is_empty() {
                    writeln!(w, "  res.status({}).end();", code)?;
                } else {
                    writeln!(
                        w,
                        "  res.status({}).json({});",
                        code,
                        encode(cx, &response_body(response), "result.body", scope)?
                    )?;
                }
                writeln!(w, "  return;")?;
            }
            w.dedent();
            writeln!(w, "}}")?;
        } else if let Some((response, code)) = responses_with_codes(operation).next() {
            if response.is_empty() {
                writeln!(w, "{};", call)?;
                writeln!(w, "res.status({}).end();", code)?;
            } else {
                writeln!(w, "const result = {};", call)?;
                writeln!(
                    w,
                    "res.status({}).json({});",
                    code,
                    encode(cx, &response_body(response), "result", scope)?
                )?;
            }
        }
        w.dedent();
        writeln!(w, "}} catch (err) {{")?;
        writeln!(w, "  respondError(res, err instanceof BadRequestError ? 400 : 500, err);")?;
        writeln!(w, "}}")?;
        w.dedent();
        writeln!(w, "}});")?;
        Ok(())
    }
}

const HELPERS: &str = "export class ContractError extends Error {
  constructor(message: string) {
    super(message);
    this.name = 'ContractError';
  }
}

export function asRecord(data: unknown): Record<string, unknown> {
  if (typeof data !== 'object' || data === null || Array.isArray(data)) {
    throw new ContractError('expected a JSON object');
  }
  return data as Record<string, unknown>;
}

export function checkRequiredFields(data: unknown, fields: readonly string[]): void {
  const record = asRecord(data);
  for (const field of fields) {
    if (record[field] === undefined) {
      throw new ContractError(`required field missing: ${field}`);
    }
    if (record[field] === null) {
      throw new ContractError(`required field doesn't have value: ${field}`);
    }
  }
}

export function readEnumValue<T extends string>(data: unknown, values: readonly T[]): T {
  if (typeof data !== 'string' || !(values as readonly string[]).includes(data)) {
    throw new ContractError(`Unknown enum value: ${String(data)}`);
  }
  return data as T;
}

export function checkOneCase(data: unknown, cases: readonly string[]): void {
  const record = asRecord(data);
  const set = cases.filter((name) => record[name] !== undefined && record[name] !== null);
  if (set.length !== 1) {
    throw new ContractError('union case is not set');
  }
}

export function convertField(
  record: Record<string, unknown>,
  key: string,
  convert: (item: any) => unknown,
): void {
  const value = record[key];
  if (value !== undefined && value !== null) {
    record[key] = convert(value);
  }
}

export function mapNullable<T>(data: unknown, convert: (item: any) => T): T | null {
  return data === undefined || data === null ? null : convert(data);
}

export function mapArray<T>(data: unknown, convert: (item: any) => T): T[] {
  if (!Array.isArray(data)) {
    throw new ContractError('expected a JSON array');
  }
  return data.map((item) => convert(item));
}

export function mapRecord<T>(data: unknown, convert: (item: any) => T): Record<string, T> {
  const result: Record<string, T> = {};
  for (const [key, item] of Object.entries(asRecord(data))) {
    result[key] = convert(item);
  }
  return result;
}

export function readDiscriminator(data: unknown, field: string, tags: readonly string[]): string {
  const value = asRecord(data)[field];
  if (value === undefined || value === null) {
    throw new ContractError(`discriminator field ${field} not found`);
  }
  if (typeof value !== 'string' || !tags.includes(value)) {
    throw new ContractError(`unexpected union discriminator field ${field} value: ${String(value)}`);
  }
  return value;
}
";

const ROUTING_HELPERS: &str = "class BadRequestError extends Error {}

function parseParam(raw: unknown, parse: boolean): unknown {
  if (!parse || typeof raw !== 'string') {
    return raw;
  }
  try {
    return JSON.parse(raw);
  } catch {
    return raw;
  }
}

function required(raw: unknown, name: string, parse: boolean): unknown {
  if (raw === undefined) {
    throw new BadRequestError(`missing parameter ${name}`);
  }
  return parseParam(raw, parse);
}

function optional(raw: unknown, parse: boolean): unknown {
  return raw === undefined ? null : parseParam(raw, parse);
}

function decodeBody<T>(decode: () => T): T {
  try {
    return decode();
  } catch (err) {
    throw new BadRequestError(err instanceof Error ? err.message : String(err));
  }
}

function respondError(res: express.Response, status: number, err: unknown): void {
  res.status(status).json({ message: err instanceof Error ? err.message : String(err) });
}
";

impl Backend for TypeScriptBackend {
    fn target(&self) -> Target {
        Target::TypeScript
    }

    fn table(&self) -> TargetTable {
        table()
    }

    fn helpers(&self, cx: &EmitContext<'_>, out: &mut ArtifactSet) -> Result<(), CodegenError> {
        let enums = cx.module(&Role::Enums, None);
        out.push(Artifact::generated(
            enums.file("helpers.ts"),
            source(&ImportScope::bare(Arc::clone(&enums)), HELPERS, true),
        ))?;
        let empty = cx.module(&Role::Empty, None);
        out.push(Artifact::generated(
            empty.file("types.ts"),
            source(
                &ImportScope::bare(Arc::clone(&empty)),
                "/** The body of a response that carries none. */\nexport type Empty = Record<string, never>;\n",
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
        let mut contracts = Vec::with_capacity(models.len());
        for model in models {
            contracts.push(cx.contract(scope_of_models, model)?);
        }
        let strict = cx.config.json_mode().checks_required();
        let uses_helpers = contracts.iter().any(|c| match c {
            SerializationContract::Object { fields, .. } => {
                (strict && !c.required_fields().is_empty())
                    || fields.iter().any(|f| !f.ty.referenced_models().is_empty())
            }
            _ => true,
        });
        let mut tracker = cx.tracker(module);
        if uses_helpers {
            tracker.add_module(&Role::Enums, None);
        }
        for model in models {
            tracker.add_types(model.types())?;
        }
        let scope = tracker.finish();
        let enums = cx.module(&Role::Enums, None);
        let helpers = scope
            .local_name(&enums)
            .unwrap_or_else(|| enums.alias())
            .to_string();

        let mut w = CodeWriter::spaces(2);
        for (i, (model, contract)) in models.iter().zip(&contracts).enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            self.model(cx, &mut w, model, contract, &scope, &helpers)?;
        }
        out.push(Artifact::generated(
            module.file("models.ts"),
            source(&scope, &w.finish(), true),
        ))
    }

    fn errors(&self, cx: &EmitContext<'_>, out: &mut ArtifactSet) -> Result<(), CodegenError> {
        let module = cx.module(&Role::Errors, None);
        let responses = &cx.spec.errors().responses;
        let mut tracker = cx.tracker(&module);
        for response in responses.iter().filter(|r| !r.is_empty()) {
            let body = response_body(response);
            if needs_helpers(&body) {
                tracker.add_module(&Role::Enums, None);
            }
            tracker.add_type(&body)?;
        }
        let scope = tracker.finish();

        let mut w = CodeWriter::spaces(2);
        for response in responses {
            let name = response.status.pascal_case();
            writeln!(w, "export class {} extends Error {{", name)?;
            w.indent();
            if response.is_empty() {
                writeln!(w, "constructor() {{")?;
            } else {
                writeln!(
                    w,
                    "constructor(readonly body: {}) {{",
                    cx.resolver.expr(&response_body(response), &scope)?
                )?;
            }
            writeln!(w, "  super('{}');", response.status)?;
            writeln!(w, "  this.name = '{}';", name)?;
            writeln!(w, "}}")?;
            w.dedent();
            writeln!(w, "}}")?;
            writeln!(w)?;
        }
        writeln!(w, "export class UnexpectedStatus extends Error {{")?;
        writeln!(w, "  constructor(readonly status: number) {{")?;
        writeln!(w, "    super(`unexpected response status: ${{status}}`);")?;
        writeln!(w, "    this.name = 'UnexpectedStatus';")?;
        writeln!(w, "  }}")?;
        writeln!(w, "}}")?;
        writeln!(w)?;
        writeln!(w, "export async function handleResponse(resp: Response): Promise<Error> {{")?;
        w.indent();
        if !responses.is_empty() {
            writeln!(w, "switch (resp.status) {{")?;
            w.indent();
            for response in responses {
                let Some(code) = response.status_code() else {
                    continue;
                };
                writeln!(w, "case {}:", code)?;
                if response.is_empty() {
                    writeln!(w, "  return new {}();", response.status.pascal_case())?;
                } else {
                    writeln!(
                        w,
                        "  return new {}({});",
                        response.status.pascal_case(),
                        decode(cx, &response_body(response), "await resp.json()", &scope)?
                    )?;
                }
            }
            w.dedent();
            writeln!(w, "}}")?;
        }
        writeln!(w, "return new UnexpectedStatus(resp.status);")?;
        w.dedent();
        writeln!(w, "}}")?;
        out.push(Artifact::generated(
            module.file("errors.ts"),
            source(&scope, &w.finish(), true),
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

        let mut w = CodeWriter::spaces(2);
        for (i, operation) in multi.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            writeln!(w, "export type {} =", response_type_name(operation))?;
            let count = operation.responses.len();
            for (j, response) in operation.responses.iter().enumerate() {
                let end = if j + 1 == count { ";" } else { "" };
                if response.is_empty() {
                    writeln!(w, "  | {{ status: '{}' }}{}", response.status, end)?;
                } else {
                    writeln!(
                        w,
                        "  | {{ status: '{}'; body: {} }}{}",
                        response.status,
                        cx.resolver.expr(&response_body(response), &scope)?,
                        end
                    )?;
                }
            }
        }
        out.push(Artifact::generated(
            module.file("responses.ts"),
            source(&scope, &w.finish(), true),
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

        let mut w = CodeWriter::spaces(2);
        writeln!(w, "export class Client {{")?;
        w.indent();
        writeln!(w, "constructor(private readonly baseUrl: string) {{}}")?;
        for operation in &api.operations {
            writeln!(w)?;
            self.client_method(cx, &mut w, version, operation, &module, &scope, &errors_module)?;
        }
        w.dedent();
        writeln!(w, "}}")?;
        writeln!(w)?;
        w.write_str(
            "function paramValue(value: unknown): string {
  return typeof value === 'string' ? value : JSON.stringify(value);
}
",
        )?;
        out.push(Artifact::generated(
            module.file("client.ts"),
            source(&scope, &w.finish(), true),
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

            let mut w = CodeWriter::spaces(2);
            writeln!(w, "export interface Service {{")?;
            for operation in &api.operations {
                writeln!(w, "  {};", signature(cx, operation, &module, &scope, false)?)?;
            }
            writeln!(w, "}}")?;
            out.push(Artifact::generated(
                module.file("service.ts"),
                source(&scope, &w.finish(), true),
            ))?;
        }

        if version.apis.is_empty() {
            return Ok(());
        }
        let routing = cx.module(&Role::Routing, Some(&version.name));
        let mut tracker = cx.tracker(&routing);
        tracker.add_library(EXPRESS);
        let mut api_modules = Vec::new();
        for api in &version.apis {
            api_modules.push(tracker.add_module(&Role::Api(api.name.clone()), Some(&version.name)));
            add_operation_types(&mut tracker, api)?;
        }
        let scope = tracker.finish();
        let express = scope.library_name(EXPRESS).unwrap_or(EXPRESS).to_string();

        let mut w = CodeWriter::spaces(2);
        for (api, api_module) in version.apis.iter().zip(&api_modules) {
            writeln!(
                w,
                "export function {}Routes(router: {}.Router, service: {}): void {{",
                api.name.camel_case(),
                express,
                cx.resolver.member(api_module, "Service", &scope)
            )?;
            w.indent();
            for operation in &api.operations {
                self.handler(cx, &mut w, version, operation, &scope, &express)?;
            }
            w.dedent();
            writeln!(w, "}}")?;
            writeln!(w)?;
        }
        w.write_str(ROUTING_HELPERS)?;
        out.push(Artifact::generated(
            routing.file("routing.ts"),
            source(&scope, &w.finish(), true),
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

        let mut w = CodeWriter::spaces(2);
        writeln!(
            w,
            "export class {}Service implements {} {{",
            api.name.pascal_case(),
            cx.resolver.member(&api_module, "Service", &scope)
        )?;
        for (i, operation) in api.operations.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            writeln!(w, "  async {} {{", signature(cx, operation, &api_module, &scope, true)?)?;
            writeln!(
                w,
                "    throw new Error('{} is not implemented');",
                operation.name.camel_case()
            )?;
            writeln!(w, "  }}")?;
        }
        writeln!(w, "}}")?;
        out.push(Artifact::scaffolded(
            module.file(&format!("{}.ts", api.name.snake_case())),
            source(&scope, &w.finish(), false),
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
            tracker.add_library(EXPRESS);
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
            let express = scope.library_name(EXPRESS).unwrap_or(EXPRESS).to_string();

            let mut params = Vec::new();
            let mut calls = Vec::new();
            for (version, api, routing, api_module) in &mounts {
                let var = ident(&format!("{}_{}", version.name.flat_case(), api.name.snake_case()));
                params.push(format!(
                    "{}: {}",
                    var,
                    cx.resolver.member(api_module, "Service", &scope)
                ));
                calls.push(format!(
                    "{}(router, {});",
                    cx.resolver
                        .member(routing, &format!("{}Routes", api.name.camel_case()), &scope),
                    var
                ));
            }
            let mut w = CodeWriter::spaces(2);
            writeln!(
                w,
                "export function addRoutes(router: {}.Router, {}): void {{",
                express,
                params.join(", ")
            )?;
            for call in calls {
                writeln!(w, "  {}", call)?;
            }
            writeln!(w, "}}")?;
            out.push(Artifact::generated(
                root.file("routing.ts"),
                source(&scope, &w.finish(), true),
            ))?;
        }

        let index = directory_index(out.paths(), "ts", "index");
        for (dir, entries) in index {
            let mut body = String::new();
            for child in &entries.dirs {
                body.push_str(&format!("export * as {} from './{}';\n", child, child));
            }
            for file in &entries.files {
                body.push_str(&format!("export * from './{}';\n", file));
            }
            out.push(Artifact::generated(
                join_path(&dir, "index.ts"),
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
    fn test_relative_imports() {
        let root = Module::new("acme");
        let models = root.submodule("v1").submodule("models");
        let pets = root.submodule("v1").submodule("pets");
        let errors = root.submodule("errors");
        let services = root.submodule("services").submodule("v1");
        assert_eq!(relative(&pets, &models), "../models");
        assert_eq!(relative(&errors, &errors.submodule("models")), "./models");
        assert_eq!(relative(&services, &pets), "../../v1/pets");
        assert_eq!(relative(&root, &pets), "./v1/pets");
        assert_eq!(relative(&pets, &root), "../..");
    }

    #[test]
    fn test_property_quoting() {
        assert_eq!(property("name"), "name");
        assert_eq!(property("Request-Id"), "'Request-Id'");
        assert_eq!(property("2fa"), "'2fa'");
    }

    #[test]
    fn test_ident() {
        assert_eq!(ident("Request-Id"), "requestId");
        assert_eq!(ident("delete"), "delete_");
    }
}
