//! Purpose: Dynamic record whose fields are described at runtime by a schema file.
//! Exports: `Document`, `SchemaFile`, `FieldSpec`, `TypeSpec`, `RoleSpec`, `AccessSpec`, `value_from_json`.
//! Role: Lets the CLI and embedders map JSON objects without a compiled-in record type.
//! Invariants: JSON conversion is driven by the declared field type, never by guessing.
//! Invariants: Keys not declared in the schema are rejected on input.
#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};

use crate::core::error::{Error, ErrorKind};
use crate::core::marshal::Record;
use crate::core::schema::{Access, FieldDecl, RecordDecl};
use crate::core::value::{EnumDecl, FieldType, Value};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    pub collection: String,
    pub namespace: String,
    pub fields: Vec<FieldSpec>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeSpec,
    #[serde(default)]
    pub role: RoleSpec,
    #[serde(default)]
    pub access: AccessSpec,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSpec {
    Text,
    Int32,
    Int64,
    Bool,
    Float64,
    Bytes,
    Enum { name: String, members: Vec<String> },
    Serialized { name: String },
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSpec {
    #[default]
    Plain,
    Key,
    SuperColumn,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessSpec {
    #[default]
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

impl SchemaFile {
    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid schema file: {err}"))
                .with_source(err)
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read schema file")
                .with_path(path)
                .with_source(err)
        })?;
        Self::from_json_str(&text).map_err(|err| err.with_path(path))
    }

    pub fn to_decl(&self) -> RecordDecl {
        self.fields.iter().fold(
            RecordDecl::new(self.collection.clone(), self.namespace.clone()),
            |decl, spec| decl.field(spec.to_decl()),
        )
    }
}

impl FieldSpec {
    fn to_decl(&self) -> FieldDecl {
        let ty = match &self.ty {
            TypeSpec::Text => FieldType::Text,
            TypeSpec::Int32 => FieldType::Int32,
            TypeSpec::Int64 => FieldType::Int64,
            TypeSpec::Bool => FieldType::Bool,
            TypeSpec::Float64 => FieldType::Float64,
            TypeSpec::Bytes => FieldType::Bytes,
            TypeSpec::Enum { name, members } => {
                FieldType::Enum(EnumDecl::new(name.clone(), members.iter().cloned()))
            }
            TypeSpec::Serialized { name } => FieldType::Serialized(name.clone()),
        };
        let access = match self.access {
            AccessSpec::ReadWrite => Access::ReadWrite,
            AccessSpec::ReadOnly => Access::ReadOnly,
            AccessSpec::WriteOnly => Access::WriteOnly,
        };
        let field = FieldDecl::new(self.name.clone(), ty).access(access);
        match self.role {
            RoleSpec::Plain => field,
            RoleSpec::Key => field.key(),
            RoleSpec::SuperColumn => field.super_column(),
        }
    }
}

/// A record held as a name-to-value map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds a document from a JSON object, converting each member to its declared type.
    pub fn from_json(decl: &RecordDecl, json: &JsonValue) -> Result<Self, Error> {
        let object = json.as_object().ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("record must be a JSON object")
                .with_collection(decl.collection.clone())
        })?;
        let mut document = Document::new();
        for (name, member) in object {
            let field = decl
                .fields
                .iter()
                .find(|field| &field.name == name)
                .ok_or_else(|| {
                    Error::new(ErrorKind::Usage)
                        .with_message("field is not declared in the schema")
                        .with_field(name.clone())
                        .with_collection(decl.collection.clone())
                })?;
            let value = value_from_json(&field.ty, member).map_err(|err| {
                err.with_field(name.clone())
                    .with_collection(decl.collection.clone())
            })?;
            document.fields.insert(name.clone(), value);
        }
        Ok(document)
    }

    /// Renders the declared fields this document holds, in declaration order.
    pub fn to_json(&self, decl: &RecordDecl) -> JsonValue {
        let mut object = Map::new();
        for field in &decl.fields {
            if let Some(value) = self.fields.get(&field.name) {
                object.insert(field.name.clone(), value_to_json(value));
            }
        }
        JsonValue::Object(object)
    }
}

impl Record for Document {
    fn instantiate() -> Result<Self, Error> {
        Ok(Document::new())
    }

    fn read_field(&self, name: &str) -> Result<Value, Error> {
        Ok(self.fields.get(name).cloned().unwrap_or(Value::Null))
    }

    fn write_field(&mut self, name: &str, value: Value) -> Result<(), Error> {
        self.fields.insert(name.to_string(), value);
        Ok(())
    }
}

/// Converts one JSON value into a value of the declared field type.
pub fn value_from_json(ty: &FieldType, json: &JsonValue) -> Result<Value, Error> {
    if json.is_null() {
        return Ok(Value::Null);
    }
    let value = match (ty, json) {
        (FieldType::Text, JsonValue::String(text)) => Value::Text(text.clone()),
        (FieldType::Int32, JsonValue::Number(number)) => number
            .as_i64()
            .and_then(|number| i32::try_from(number).ok())
            .map(Value::Int32)
            .ok_or_else(|| invalid_json("int32", json))?,
        (FieldType::Int64, JsonValue::Number(number)) => number
            .as_i64()
            .map(Value::Int64)
            .ok_or_else(|| invalid_json("int64", json))?,
        (FieldType::Bool, JsonValue::Bool(flag)) => Value::Bool(*flag),
        (FieldType::Float64, JsonValue::Number(number)) => number
            .as_f64()
            .map(Value::Float64)
            .ok_or_else(|| invalid_json("float64", json))?,
        (FieldType::Bytes, JsonValue::Array(items)) => Value::Bytes(
            items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|byte| u8::try_from(byte).ok())
                        .ok_or_else(|| invalid_json("byte", item))
                })
                .collect::<Result<Vec<u8>, Error>>()?,
        ),
        (FieldType::Enum(decl), JsonValue::String(member)) => {
            let member = decl.member(member).ok_or_else(|| {
                Error::new(ErrorKind::UnmappableType)
                    .with_message(format!("{member} is not a member of {}", decl.name()))
            })?;
            Value::Enum {
                type_name: decl.name().to_string(),
                member: member.to_string(),
            }
        }
        (FieldType::Serialized(type_name), other) => Value::Serialized {
            type_name: type_name.clone(),
            value: other.clone(),
        },
        (FieldType::Custom(type_name), _) => {
            return Err(Error::new(ErrorKind::UnmappableType)
                .with_message(format!("custom type {type_name} has no JSON form")));
        }
        (ty, other) => return Err(invalid_json(&format!("{:?}", ty.tag()), other)),
    };
    Ok(value)
}

fn invalid_json(expected: &str, json: &JsonValue) -> Error {
    Error::new(ErrorKind::Usage).with_message(format!("expected {expected}, got {json}"))
}

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Text(text) => JsonValue::String(text.clone()),
        Value::Int32(number) => JsonValue::from(*number),
        Value::Int64(number) => JsonValue::from(*number),
        Value::Bool(flag) => JsonValue::Bool(*flag),
        Value::Float64(number) => Number::from_f64(*number)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Bytes(bytes) => JsonValue::Array(bytes.iter().map(|byte| JsonValue::from(*byte)).collect()),
        Value::Enum { member, .. } => JsonValue::String(member.clone()),
        Value::Serialized { value, .. } => value.clone(),
        Value::Custom(custom) => JsonValue::String(format!("<{}>", custom.type_name())),
    }
}
