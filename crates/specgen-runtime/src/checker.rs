//! Contract checking over JSON values.
//!
//! The in-memory form of a value mirrors what generated code holds: objects
//! are JSON objects keyed by wire name, enums are their literal strings, and
//! unions of either encoding are slot maps `{"<tag>": <value>}` with one slot
//! set. [`ContractChecker::encode`] turns that form into the wire form and
//! [`ContractChecker::decode`] goes back, enforcing the contract both ways.

use serde_json::{Map, Value};
use specgen_core::contract::{
    ContractSet, FieldContract, SerializationContract, UnionCase, UnionEncoding,
};
use specgen_core::types::{ModelScope, PlainType, Primitive, TypeDef};
use tracing::trace;

use crate::errors::{kind_of, ContractError, ContractViolation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encode,
    Decode,
}

/// Interprets the contracts of one specification.
#[derive(Debug, Clone, Copy)]
pub struct ContractChecker<'a> {
    contracts: &'a ContractSet,
    check_required: bool,
}

impl<'a> ContractChecker<'a> {
    pub fn new(contracts: &'a ContractSet) -> Self {
        Self {
            contracts,
            check_required: true,
        }
    }

    /// Leave out required-field checks, as non-strict generated code does.
    /// Enum domains and union cases are still enforced.
    pub fn without_required_checks(mut self) -> Self {
        self.check_required = false;
        self
    }

    /// Encode an in-memory value of type `ty` into its wire form.
    pub fn encode(&self, ty: &TypeDef, value: &Value) -> Result<Value, ContractViolation> {
        self.walk(Direction::Encode, ty, value, "")
    }

    /// Decode a wire payload of type `ty` into its in-memory form.
    pub fn decode(&self, ty: &TypeDef, payload: &Value) -> Result<Value, ContractViolation> {
        self.walk(Direction::Decode, ty, payload, "")
    }

    pub fn encode_model(
        &self,
        scope: &ModelScope,
        name: &str,
        value: &Value,
    ) -> Result<Value, ContractViolation> {
        let contract = self.find(scope, name)?;
        self.model(Direction::Encode, contract, value, "")
    }

    pub fn decode_model(
        &self,
        scope: &ModelScope,
        name: &str,
        payload: &Value,
    ) -> Result<Value, ContractViolation> {
        let contract = self.find(scope, name)?;
        self.model(Direction::Decode, contract, payload, "")
    }

    fn find(&self, scope: &ModelScope, name: &str) -> Result<&'a SerializationContract, ContractViolation> {
        self.contracts
            .find(scope, name)
            .ok_or_else(|| ContractViolation::new("", ContractError::UnknownModel(name.to_string())))
    }

    fn walk(
        &self,
        direction: Direction,
        ty: &TypeDef,
        value: &Value,
        path: &str,
    ) -> Result<Value, ContractViolation> {
        match ty {
            TypeDef::Nullable(child) => {
                if value.is_null() {
                    Ok(Value::Null)
                } else {
                    self.walk(direction, child, value, path)
                }
            }
            TypeDef::Array(child) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| mismatch(path, "array", value))?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.walk(direction, child, item, &format!("{}[{}]", path, i)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            TypeDef::Map(child) => {
                let entries = value
                    .as_object()
                    .ok_or_else(|| mismatch(path, "object", value))?;
                let mut out = Map::new();
                for (key, item) in entries {
                    out.insert(
                        key.clone(),
                        self.walk(direction, child, item, &child_path(path, key))?,
                    );
                }
                Ok(Value::Object(out))
            }
            TypeDef::Plain(PlainType::Primitive(primitive)) => check_primitive(*primitive, value, path),
            TypeDef::Plain(PlainType::Model(model)) => {
                let contract = self.contracts.get(model).ok_or_else(|| {
                    ContractViolation::new(
                        path,
                        ContractError::UnknownModel(model.name.source().to_string()),
                    )
                })?;
                self.model(direction, contract, value, path)
            }
        }
    }

    fn model(
        &self,
        direction: Direction,
        contract: &SerializationContract,
        value: &Value,
        path: &str,
    ) -> Result<Value, ContractViolation> {
        trace!("{:?} {} at '{}'", direction, contract.model(), path);
        match contract {
            SerializationContract::Object { fields, .. } => {
                self.object(direction, fields, value, path)
            }
            SerializationContract::Enum { literals, .. } => check_literal(literals, value, path),
            SerializationContract::OneOf {
                cases, encoding, ..
            } => match (encoding, direction) {
                (UnionEncoding::Wrapper, _) => self.wrapper(direction, cases, value, path),
                (UnionEncoding::Discriminated { field }, Direction::Encode) => {
                    self.encode_tagged(field, cases, value, path)
                }
                (UnionEncoding::Discriminated { field }, Direction::Decode) => {
                    self.decode_tagged(field, cases, value, path)
                }
            },
        }
    }

    fn object(
        &self,
        direction: Direction,
        fields: &[FieldContract],
        value: &Value,
        path: &str,
    ) -> Result<Value, ContractViolation> {
        let raw = value
            .as_object()
            .ok_or_else(|| mismatch(path, "object", value))?;
        if direction == Direction::Decode {
            self.check_required(fields, raw, path)?;
        }

        let mut out = Map::new();
        for field in fields {
            match raw.get(&field.key) {
                None | Some(Value::Null) => {}
                Some(item) => {
                    let encoded =
                        self.walk(direction, &field.ty, item, &child_path(path, &field.key))?;
                    out.insert(field.key.clone(), encoded);
                }
            }
        }

        if direction == Direction::Encode {
            self.check_required(fields, &out, path)?;
        }
        Ok(Value::Object(out))
    }

    fn check_required(
        &self,
        fields: &[FieldContract],
        raw: &Map<String, Value>,
        path: &str,
    ) -> Result<(), ContractViolation> {
        if !self.check_required {
            return Ok(());
        }
        for field in fields.iter().filter(|f| f.required) {
            if raw.get(&field.key).map_or(true, Value::is_null) {
                return Err(ContractViolation::new(
                    path,
                    ContractError::RequiredField(field.key.clone()),
                ));
            }
        }
        Ok(())
    }

    fn wrapper(
        &self,
        direction: Direction,
        cases: &[UnionCase],
        value: &Value,
        path: &str,
    ) -> Result<Value, ContractViolation> {
        let (case, item) = single_case(cases, value, path)?;
        let mut out = Map::new();
        out.insert(
            case.tag.clone(),
            self.walk(direction, &case.ty, item, &child_path(path, &case.tag))?,
        );
        Ok(Value::Object(out))
    }

    fn encode_tagged(
        &self,
        field: &str,
        cases: &[UnionCase],
        value: &Value,
        path: &str,
    ) -> Result<Value, ContractViolation> {
        let (case, item) = single_case(cases, value, path)?;
        let encoded = self.walk(Direction::Encode, &case.ty, item, path)?;
        match encoded {
            Value::Object(mut map) => {
                map.insert(field.to_string(), Value::String(case.tag.clone()));
                Ok(Value::Object(map))
            }
            other => Err(mismatch(path, "object", &other)),
        }
    }

    fn decode_tagged(
        &self,
        field: &str,
        cases: &[UnionCase],
        payload: &Value,
        path: &str,
    ) -> Result<Value, ContractViolation> {
        let raw = payload
            .as_object()
            .ok_or_else(|| mismatch(path, "object", payload))?;
        let tag = match raw.get(field) {
            None | Some(Value::Null) => {
                return Err(ContractViolation::new(
                    path,
                    ContractError::MissingDiscriminator(field.to_string()),
                ))
            }
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => {
                return Err(ContractViolation::new(
                    path,
                    ContractError::UnknownDiscriminatorValue(other.to_string()),
                ))
            }
        };
        let case = cases.iter().find(|c| c.tag == tag).ok_or_else(|| {
            ContractViolation::new(path, ContractError::UnknownDiscriminatorValue(tag.clone()))
        })?;

        let mut item = raw.clone();
        item.remove(field);
        let decoded = self.walk(Direction::Decode, &case.ty, &Value::Object(item), path)?;
        let mut out = Map::new();
        out.insert(case.tag.clone(), decoded);
        Ok(Value::Object(out))
    }
}

/// The one set slot of a union slot map.
fn single_case<'c, 'v>(
    cases: &'c [UnionCase],
    value: &'v Value,
    path: &str,
) -> Result<(&'c UnionCase, &'v Value), ContractViolation> {
    let raw = value
        .as_object()
        .ok_or_else(|| mismatch(path, "object", value))?;
    let mut set = cases.iter().filter_map(|case| match raw.get(&case.tag) {
        None | Some(Value::Null) => None,
        Some(item) => Some((case, item)),
    });
    match (set.next(), set.next()) {
        (Some(only), None) => Ok(only),
        _ => Err(ContractViolation::new(path, ContractError::UnionCase)),
    }
}

fn check_literal(literals: &[String], value: &Value, path: &str) -> Result<Value, ContractViolation> {
    match value {
        Value::String(raw) if literals.iter().any(|l| l == raw) => Ok(value.clone()),
        Value::String(raw) => Err(ContractViolation::new(
            path,
            ContractError::UnknownEnumValue(raw.clone()),
        )),
        other => Err(ContractViolation::new(
            path,
            ContractError::UnknownEnumValue(other.to_string()),
        )),
    }
}

fn check_primitive(primitive: Primitive, value: &Value, path: &str) -> Result<Value, ContractViolation> {
    let (valid, expected) = match primitive {
        Primitive::Int32 => (
            value.as_i64().is_some_and(|n| i32::try_from(n).is_ok()),
            "32-bit integer",
        ),
        Primitive::Int64 => (value.is_i64(), "integer"),
        Primitive::Float | Primitive::Double => (value.is_number(), "number"),
        Primitive::Decimal => (value.is_number() || value.is_string(), "decimal"),
        Primitive::Boolean => (value.is_boolean(), "boolean"),
        Primitive::String | Primitive::Uuid | Primitive::Date | Primitive::DateTime => {
            (value.is_string(), "string")
        }
        Primitive::Json => (true, "json"),
        Primitive::Empty => (value.is_object(), "object"),
    };
    if valid {
        Ok(value.clone())
    } else {
        Err(mismatch(path, expected, value))
    }
}

fn mismatch(path: &str, expected: &'static str, value: &Value) -> ContractViolation {
    ContractViolation::new(
        path,
        ContractError::Mismatch {
            expected,
            found: kind_of(value),
        },
    )
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("", "name"), "name");
        assert_eq!(child_path("pets[0]", "name"), "pets[0].name");
    }

    #[test]
    fn test_primitives() {
        let int32 = TypeDef::parse("int32").unwrap();
        let contracts = ContractSet::default();
        let checker = ContractChecker::new(&contracts);
        assert_eq!(checker.decode(&int32, &json!(7)).unwrap(), json!(7));
        let err = checker.decode(&int32, &json!(4_000_000_000_i64)).unwrap_err();
        assert!(matches!(err.error, ContractError::Mismatch { .. }));

        let tags = TypeDef::parse("string[]?").unwrap();
        assert_eq!(checker.decode(&tags, &json!(null)).unwrap(), json!(null));
        let err = checker.decode(&tags, &json!(["a", 1])).unwrap_err();
        assert_eq!(err.path, "[1]");
    }

    #[test]
    fn test_unbound_model_reference() {
        let contracts = ContractSet::default();
        let checker = ContractChecker::new(&contracts);
        let err = checker
            .decode(&TypeDef::parse("Pet").unwrap(), &json!({}))
            .unwrap_err();
        assert_eq!(err.error, ContractError::UnknownModel("Pet".to_string()));
    }
}
