//! Purpose: Pluggable byte codecs and the resolution rules that pick one per value.
//! Exports: `Codec`, `FnCodec`, `CodecRegistry`, `CodecSet`, `SerializationPolicy`, standard codecs.
//! Role: Leaf of the marshalling engine; schema and marshaller encode through `CodecSet`.
//! Invariants: A `CodecSet` always holds the built-in text codec; keys and column names go through it.
//! Invariants: Resolution order is exact tag, enum by name, serialized blob, then failure.
//! Invariants: Codecs are pure and the set is read-only once built.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::blob;
use crate::core::error::{Error, ErrorKind};
use crate::core::value::{FieldType, TypeTag, Value};

pub trait Codec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, Error>;
    fn decode(&self, bytes: &[u8]) -> Result<Value, Error>;
}

/// Whether values without a codec may fall back to the blob serializer.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationPolicy {
    Allow,
    #[default]
    Deny,
}

/// A codec built from a pair of plain functions.
#[derive(Clone, Copy)]
pub struct FnCodec {
    encode: fn(&Value) -> Result<Vec<u8>, Error>,
    decode: fn(&[u8]) -> Result<Value, Error>,
}

impl FnCodec {
    pub fn new(
        encode: fn(&Value) -> Result<Vec<u8>, Error>,
        decode: fn(&[u8]) -> Result<Value, Error>,
    ) -> Self {
        Self { encode, decode }
    }
}

impl Codec for FnCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, Error> {
        (self.encode)(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, Error> {
        (self.decode)(bytes)
    }
}

pub struct TextCodec;

impl Codec for TextCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, Error> {
        match value {
            Value::Text(text) => Ok(text.as_bytes().to_vec()),
            other => Err(wrong_value("text", other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, Error> {
        String::from_utf8(bytes.to_vec())
            .map(Value::Text)
            .map_err(|err| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("invalid utf-8 text")
                    .with_source(err)
            })
    }
}

pub struct Int32Codec;

impl Codec for Int32Codec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, Error> {
        match value {
            Value::Int32(number) => Ok(number.to_be_bytes().to_vec()),
            other => Err(wrong_value("int32", other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, Error> {
        let buf = fixed::<4>(bytes, "int32")?;
        Ok(Value::Int32(i32::from_be_bytes(buf)))
    }
}

pub struct Int64Codec;

impl Codec for Int64Codec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, Error> {
        match value {
            Value::Int64(number) => Ok(number.to_be_bytes().to_vec()),
            other => Err(wrong_value("int64", other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, Error> {
        let buf = fixed::<8>(bytes, "int64")?;
        Ok(Value::Int64(i64::from_be_bytes(buf)))
    }
}

pub struct BoolCodec;

impl Codec for BoolCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, Error> {
        match value {
            Value::Bool(flag) => Ok(vec![u8::from(*flag)]),
            other => Err(wrong_value("bool", other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, Error> {
        match fixed::<1>(bytes, "bool")? {
            [0] => Ok(Value::Bool(false)),
            [1] => Ok(Value::Bool(true)),
            [other] => Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!("invalid bool byte {other}"))),
        }
    }
}

pub struct Float64Codec;

impl Codec for Float64Codec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, Error> {
        match value {
            Value::Float64(number) => Ok(number.to_bits().to_be_bytes().to_vec()),
            other => Err(wrong_value("float64", other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, Error> {
        let buf = fixed::<8>(bytes, "float64")?;
        Ok(Value::Float64(f64::from_bits(u64::from_be_bytes(buf))))
    }
}

pub struct BytesCodec;

impl Codec for BytesCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, Error> {
        match value {
            Value::Bytes(bytes) => Ok(bytes.clone()),
            other => Err(wrong_value("bytes", other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, Error> {
        Ok(Value::Bytes(bytes.to_vec()))
    }
}

fn fixed<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N], Error> {
    bytes.try_into().map_err(|_| {
        Error::new(ErrorKind::Corrupt)
            .with_message(format!("{what} needs {N} bytes, got {}", bytes.len()))
    })
}

fn wrong_value(codec: &str, value: &Value) -> Error {
    Error::new(ErrorKind::UnmappableType)
        .with_message(format!("{codec} codec cannot encode {:?}", value.tag()))
}

/// Caller-supplied codec table, keyed by type tag.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<TypeTag, Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text, int32, int64, bool, float64, and raw bytes.
    ///
    /// A text codec registered here is replaced by the built-in one when the set is built.
    pub fn standard() -> Self {
        Self::new()
            .with_codec(TypeTag::Text, TextCodec)
            .with_codec(TypeTag::Int32, Int32Codec)
            .with_codec(TypeTag::Int64, Int64Codec)
            .with_codec(TypeTag::Bool, BoolCodec)
            .with_codec(TypeTag::Float64, Float64Codec)
            .with_codec(TypeTag::Bytes, BytesCodec)
    }

    pub fn with_codec(mut self, tag: TypeTag, codec: impl Codec + 'static) -> Self {
        self.codecs.insert(tag, Arc::new(codec));
        self
    }

    pub fn with_fns(
        self,
        tag: TypeTag,
        encode: fn(&Value) -> Result<Vec<u8>, Error>,
        decode: fn(&[u8]) -> Result<Value, Error>,
    ) -> Self {
        self.with_codec(tag, FnCodec::new(encode, decode))
    }

    pub fn contains(&self, tag: &TypeTag) -> bool {
        self.codecs.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.codecs.keys()).finish()
    }
}

/// Resolved codec table for one mapper.
#[derive(Clone)]
pub struct CodecSet {
    codecs: HashMap<TypeTag, Arc<dyn Codec>>,
    text: Arc<dyn Codec>,
    policy: SerializationPolicy,
}

impl CodecSet {
    pub fn new(registry: CodecRegistry, policy: SerializationPolicy) -> Self {
        let mut codecs = registry.codecs;
        let text: Arc<dyn Codec> = Arc::new(TextCodec);
        codecs.insert(TypeTag::Text, text.clone());
        Self {
            codecs,
            text,
            policy,
        }
    }

    pub fn policy(&self) -> SerializationPolicy {
        self.policy
    }

    /// Encodes by the value's own runtime tag.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, Error> {
        let Some(tag) = value.tag() else {
            return Ok(Vec::new());
        };
        if let Some(codec) = self.codecs.get(&tag) {
            return codec.encode(value);
        }
        match value {
            Value::Enum { member, .. } => self.text_to_bytes(member),
            Value::Serialized { value, .. } if self.policy == SerializationPolicy::Allow => {
                blob::encode(value)
            }
            Value::Serialized { type_name, .. } => Err(Error::new(ErrorKind::UnmappableType)
                .with_message(format!("no codec for serialized type {type_name}"))
                .with_hint("Register a codec for the type or allow serialization.")),
            _ => Err(Error::new(ErrorKind::UnmappableType)
                .with_message(format!("no codec for {tag:?}"))
                .with_hint("Register a codec for the type.")),
        }
    }

    /// Decodes against a declared field type.
    ///
    /// Empty bytes decode to null for every type except text, raw bytes, and
    /// custom types with a registered codec, which decide for themselves.
    pub fn decode(&self, ty: &FieldType, bytes: &[u8]) -> Result<Value, Error> {
        let tag = ty.tag();
        let codec = self.codecs.get(&tag);
        let null_on_empty = match ty {
            FieldType::Text | FieldType::Bytes => false,
            FieldType::Custom(_) => codec.is_none(),
            _ => true,
        };
        if bytes.is_empty() && null_on_empty {
            return Ok(Value::Null);
        }
        if let Some(codec) = codec {
            return codec.decode(bytes);
        }
        match ty {
            FieldType::Enum(decl) => {
                let name = self.bytes_to_text(bytes)?;
                let member = decl.member(&name).ok_or_else(|| {
                    Error::new(ErrorKind::UnmappableType)
                        .with_message(format!("{name} is not a member of {}", decl.name()))
                })?;
                Ok(Value::Enum {
                    type_name: decl.name().to_string(),
                    member: member.to_string(),
                })
            }
            FieldType::Serialized(type_name) => Ok(Value::Serialized {
                type_name: type_name.clone(),
                value: blob::decode(bytes)?,
            }),
            _ => Err(Error::new(ErrorKind::UnmappableType)
                .with_message(format!("no codec for {tag:?}"))
                .with_hint("Register a codec for the type.")),
        }
    }

    pub fn text_to_bytes(&self, text: &str) -> Result<Vec<u8>, Error> {
        self.text.encode(&Value::Text(text.to_string()))
    }

    pub fn bytes_to_text(&self, bytes: &[u8]) -> Result<String, Error> {
        match self.text.decode(bytes)? {
            Value::Text(text) => Ok(text),
            other => Err(Error::new(ErrorKind::UnmappableType)
                .with_message(format!("text codec produced {:?}", other.tag()))),
        }
    }
}

impl fmt::Debug for CodecSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecSet")
            .field("types", &self.codecs.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}
