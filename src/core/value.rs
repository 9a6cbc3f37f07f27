//! Purpose: Typed field values and the type tags that drive codec dispatch.
//! Exports: `Value`, `FieldType`, `TypeTag`, `EnumDecl`, `NamedEnum`, `CustomValue`, `FromValue`.
//! Role: Every value knows its own tag, so codec dispatch needs no type inspection.
//! Invariants: `Value::Null` has no tag and always encodes to an empty byte sequence.
//! Invariants: Enum values carry their enumeration name so registry lookups stay exact.
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::core::error::{Error, ErrorKind};

/// Registry key for codec lookup.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum TypeTag {
    Text,
    Int32,
    Int64,
    Bool,
    Float64,
    Bytes,
    Enum(String),
    Serialized(String),
    Custom(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnumDecl {
    name: String,
    members: Vec<String>,
}

impl EnumDecl {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Exact, case-sensitive member lookup.
    pub fn member(&self, name: &str) -> Option<&str> {
        self.members
            .iter()
            .find(|member| member.as_str() == name)
            .map(String::as_str)
    }
}

/// Declared type of a record field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldType {
    Text,
    Int32,
    Int64,
    Bool,
    Float64,
    Bytes,
    Enum(EnumDecl),
    /// Structured value carried through the versioned blob serializer.
    Serialized(String),
    /// Value handled only by a caller-registered codec.
    Custom(String),
}

impl FieldType {
    pub fn enumeration<E: NamedEnum>() -> Self {
        FieldType::Enum(E::decl())
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            FieldType::Text => TypeTag::Text,
            FieldType::Int32 => TypeTag::Int32,
            FieldType::Int64 => TypeTag::Int64,
            FieldType::Bool => TypeTag::Bool,
            FieldType::Float64 => TypeTag::Float64,
            FieldType::Bytes => TypeTag::Bytes,
            FieldType::Enum(decl) => TypeTag::Enum(decl.name.clone()),
            FieldType::Serialized(name) => TypeTag::Serialized(name.clone()),
            FieldType::Custom(name) => TypeTag::Custom(name.clone()),
        }
    }
}

/// Rust enums that map to stored member names.
pub trait NamedEnum: Sized + Copy + 'static {
    fn decl() -> EnumDecl;
    fn name(self) -> &'static str;
    fn from_name(name: &str) -> Option<Self>;
}

/// Opaque value owned by a custom codec.
#[derive(Clone)]
pub struct CustomValue {
    type_name: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl CustomValue {
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Int32(i32),
    Int64(i64),
    Bool(bool),
    Float64(f64),
    Bytes(Vec<u8>),
    Enum { type_name: String, member: String },
    Serialized { type_name: String, value: JsonValue },
    Custom(CustomValue),
}

impl Value {
    /// Runtime tag of the value; `None` for null.
    pub fn tag(&self) -> Option<TypeTag> {
        let tag = match self {
            Value::Null => return None,
            Value::Text(_) => TypeTag::Text,
            Value::Int32(_) => TypeTag::Int32,
            Value::Int64(_) => TypeTag::Int64,
            Value::Bool(_) => TypeTag::Bool,
            Value::Float64(_) => TypeTag::Float64,
            Value::Bytes(_) => TypeTag::Bytes,
            Value::Enum { type_name, .. } => TypeTag::Enum(type_name.clone()),
            Value::Serialized { type_name, .. } => TypeTag::Serialized(type_name.clone()),
            Value::Custom(custom) => TypeTag::Custom(custom.type_name.clone()),
        };
        Some(tag)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn from_enum<E: NamedEnum>(member: E) -> Self {
        Value::Enum {
            type_name: E::decl().name,
            member: member.name().to_string(),
        }
    }

    /// Converts a serde value into a serialized field value.
    pub fn serialized<T: Serialize>(type_name: impl Into<String>, value: &T) -> Result<Self, Error> {
        let type_name = type_name.into();
        let value = serde_json::to_value(value).map_err(|err| {
            Error::new(ErrorKind::UnmappableType)
                .with_message(format!("cannot serialize value of type {type_name}"))
                .with_source(err)
        })?;
        Ok(Value::Serialized { type_name, value })
    }

    pub fn custom<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Value::Custom(CustomValue::new(type_name, value))
    }

    pub fn into_field<T: FromValue>(self) -> Result<T, Error> {
        T::from_value(self)
    }

    /// Resolves an enum value; null yields `None`.
    pub fn into_enum<E: NamedEnum>(self) -> Result<Option<E>, Error> {
        match self {
            Value::Null => Ok(None),
            Value::Enum { member, .. } | Value::Text(member) => E::from_name(&member)
                .map(Some)
                .ok_or_else(|| {
                    Error::new(ErrorKind::UnmappableType).with_message(format!(
                        "{member} is not a member of {}",
                        E::decl().name
                    ))
                }),
            other => Err(mismatch("enum", &other)),
        }
    }

    /// Deserializes a serialized value; null yields `None`.
    pub fn into_serialized<T: DeserializeOwned>(self) -> Result<Option<T>, Error> {
        match self {
            Value::Null => Ok(None),
            Value::Serialized { type_name, value } => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| {
                    Error::new(ErrorKind::UnmappableType)
                        .with_message(format!("cannot deserialize value of type {type_name}"))
                        .with_source(err)
                }),
            other => Err(mismatch("serialized", &other)),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Bool(_) => "bool",
            Value::Float64(_) => "float64",
            Value::Bytes(_) => "bytes",
            Value::Enum { .. } => "enum",
            Value::Serialized { .. } => "serialized",
            Value::Custom(_) => "custom",
        }
    }
}

fn mismatch(expected: &str, actual: &Value) -> Error {
    Error::new(ErrorKind::UnmappableType).with_message(format!(
        "expected {expected} value, got {}",
        actual.kind_name()
    ))
}

/// Conversion from a decoded value into a concrete field type.
///
/// Null converts to the type's default so partially populated rows still load.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, Error>;
}

macro_rules! impl_from_value {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, Error> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    Value::Null => Ok(<$ty>::default()),
                    other => Err(mismatch($name, &other)),
                }
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }
    };
}

impl_from_value!(String, Text, "text");
impl_from_value!(i32, Int32, "int32");
impl_from_value!(i64, Int64, "int64");
impl_from_value!(bool, Bool, "bool");
impl_from_value!(f64, Float64, "float64");
impl_from_value!(Vec<u8>, Bytes, "bytes");

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
