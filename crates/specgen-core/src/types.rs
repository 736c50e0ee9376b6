//! Type expressions of the specification: `Plain`, `Nullable`, `Array`, `Map`.
//!
//! The shape rules live here and nowhere else. Every consumer that needs
//! to walk a type (validation, the per-target resolver, contract
//! synthesis) does so through [`TypeDef::fold`] with its own
//! [`TypeFolder`], instead of re-matching the variants at each call site.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::naming::Name;

/// Built-in scalar keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Primitive {
    Int32,
    Int64,
    Float,
    Double,
    Decimal,
    Boolean,
    String,
    Uuid,
    Date,
    DateTime,
    Json,
    Empty,
}

impl Primitive {
    pub const ALL: [Primitive; 12] = [
        Primitive::Int32,
        Primitive::Int64,
        Primitive::Float,
        Primitive::Double,
        Primitive::Decimal,
        Primitive::Boolean,
        Primitive::String,
        Primitive::Uuid,
        Primitive::Date,
        Primitive::DateTime,
        Primitive::Json,
        Primitive::Empty,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Decimal => "decimal",
            Primitive::Boolean => "boolean",
            Primitive::String => "string",
            Primitive::Uuid => "uuid",
            Primitive::Date => "date",
            Primitive::DateTime => "datetime",
            Primitive::Json => "json",
            Primitive::Empty => "empty",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.keyword() == keyword)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Where a referenced model is declared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelScope {
    /// Declared in the models of the named version.
    Version(Name),
    /// Declared in the global error model set.
    Errors,
}

/// A reference to a named model.
///
/// `scope` is `None` until the reference has been bound by
/// [`crate::spec::SpecBuilder::build`]; every reference reachable from a
/// validated [`crate::spec::Spec`] carries a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelRef {
    pub name: Name,
    pub scope: Option<ModelScope>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlainType {
    Primitive(Primitive),
    Model(ModelRef),
}

impl PlainType {
    /// Classify a plain name: primitive keyword or (unbound) model reference.
    pub fn from_name(name: &str) -> Self {
        match Primitive::from_keyword(name) {
            Some(primitive) => PlainType::Primitive(primitive),
            None => PlainType::Model(ModelRef {
                name: Name::new(name),
                scope: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PlainType::Primitive(p) => p.keyword(),
            PlainType::Model(m) => m.name.source(),
        }
    }
}

/// A type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeDef {
    Plain(PlainType),
    Nullable(Box<TypeDef>),
    Array(Box<TypeDef>),
    Map(Box<TypeDef>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeParseError {
    #[error("empty type expression")]
    Empty,

    #[error("invalid type name '{0}'")]
    InvalidName(String),

    #[error("nullable type cannot be nullable again: '{0}'")]
    DoubleNullable(String),
}

impl TypeDef {
    pub fn plain(name: &str) -> Self {
        TypeDef::Plain(PlainType::from_name(name))
    }

    pub fn primitive(primitive: Primitive) -> Self {
        TypeDef::Plain(PlainType::Primitive(primitive))
    }

    pub fn nullable(child: TypeDef) -> Self {
        TypeDef::Nullable(Box::new(child))
    }

    pub fn array(child: TypeDef) -> Self {
        TypeDef::Array(Box::new(child))
    }

    pub fn map(child: TypeDef) -> Self {
        TypeDef::Map(Box::new(child))
    }

    /// Parse the compact notation: `int32`, `string?`, `Pet[]`, `int64{}`, `string[]?`.
    pub fn parse(expr: &str) -> Result<Self, TypeParseError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(TypeParseError::Empty);
        }
        if let Some(rest) = expr.strip_suffix('?') {
            let child = Self::parse(rest)?;
            if child.is_nullable() {
                return Err(TypeParseError::DoubleNullable(expr.to_string()));
            }
            return Ok(TypeDef::nullable(child));
        }
        if let Some(rest) = expr.strip_suffix("[]") {
            return Ok(TypeDef::array(Self::parse(rest)?));
        }
        if let Some(rest) = expr.strip_suffix("{}") {
            return Ok(TypeDef::map(Self::parse(rest)?));
        }
        let valid = expr
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic())
            && expr.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(TypeParseError::InvalidName(expr.to_string()));
        }
        Ok(TypeDef::plain(expr))
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeDef::Nullable(_))
    }

    /// A field of this type must be present and non-null on the wire.
    pub fn is_required(&self) -> bool {
        !self.is_nullable()
    }

    pub fn is_empty_type(&self) -> bool {
        matches!(self, TypeDef::Plain(PlainType::Primitive(Primitive::Empty)))
    }

    /// The model this type names directly, if it is a plain reference.
    pub fn as_model(&self) -> Option<&ModelRef> {
        match self {
            TypeDef::Plain(PlainType::Model(model)) => Some(model),
            _ => None,
        }
    }

    /// Walk the type bottom-up with `folder`.
    pub fn fold<F: TypeFolder>(&self, folder: &mut F) -> Result<F::Output, F::Error> {
        match self {
            TypeDef::Plain(PlainType::Primitive(p)) => folder.primitive(*p),
            TypeDef::Plain(PlainType::Model(m)) => folder.model(m),
            TypeDef::Nullable(child) => {
                let inner = child.fold(folder)?;
                folder.nullable(child, inner)
            }
            TypeDef::Array(child) => {
                let inner = child.fold(folder)?;
                folder.array(child, inner)
            }
            TypeDef::Map(child) => {
                let inner = child.fold(folder)?;
                folder.map(child, inner)
            }
        }
    }

    /// Every model referenced anywhere inside this type, outermost first.
    pub fn referenced_models(&self) -> Vec<&ModelRef> {
        let mut out = Vec::new();
        let mut current = self;
        loop {
            match current {
                TypeDef::Plain(PlainType::Model(m)) => {
                    out.push(m);
                    return out;
                }
                TypeDef::Plain(PlainType::Primitive(_)) => return out,
                TypeDef::Nullable(child) | TypeDef::Array(child) | TypeDef::Map(child) => {
                    current = child;
                }
            }
        }
    }

    /// True if `primitive` appears anywhere in the type.
    pub fn contains_primitive(&self, primitive: Primitive) -> bool {
        match self {
            TypeDef::Plain(PlainType::Primitive(p)) => *p == primitive,
            TypeDef::Plain(PlainType::Model(_)) => false,
            TypeDef::Nullable(child) | TypeDef::Array(child) | TypeDef::Map(child) => {
                child.contains_primitive(primitive)
            }
        }
    }
}

/// Bottom-up visitor over a [`TypeDef`].
///
/// Composite callbacks receive the child type alongside the already folded
/// child result, so policies that depend on the child's shape (for example
/// "nullable only changes plain types") can be expressed without matching
/// on the tree again.
pub trait TypeFolder {
    type Output;
    type Error;

    fn primitive(&mut self, primitive: Primitive) -> Result<Self::Output, Self::Error>;
    fn model(&mut self, model: &ModelRef) -> Result<Self::Output, Self::Error>;
    fn nullable(&mut self, child: &TypeDef, inner: Self::Output)
        -> Result<Self::Output, Self::Error>;
    fn array(&mut self, child: &TypeDef, inner: Self::Output) -> Result<Self::Output, Self::Error>;
    fn map(&mut self, child: &TypeDef, inner: Self::Output) -> Result<Self::Output, Self::Error>;
}

impl fmt::Display for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDef::Plain(plain) => f.write_str(plain.name()),
            TypeDef::Nullable(child) => write!(f, "{}?", child),
            TypeDef::Array(child) => write!(f, "{}[]", child),
            TypeDef::Map(child) => write!(f, "{}{{}}", child),
        }
    }
}

impl FromStr for TypeDef {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TypeDef {
    type Error = TypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TypeDef> for String {
    fn from(value: TypeDef) -> Self {
        value.to_string()
    }
}
