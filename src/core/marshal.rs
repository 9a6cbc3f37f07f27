//! Purpose: Convert records to key + column pairs and back.
//! Exports: `Record`, `Declared`, `MarshalledRecord`, `Marshaller`, `unknown_field`.
//! Role: Core of the engine; pure functions over a `Schema` and a `CodecSet`.
//! Invariants: Encoding uses each value's runtime tag; decoding uses the declared field type.
//! Invariants: An empty key is rejected before any store call.
//! Invariants: Unknown incoming columns are ignored; absent fields keep constructor defaults.
use crate::core::codec::CodecSet;
use crate::core::error::{Error, ErrorKind};
use crate::core::schema::{Property, PropertyRole, RecordDecl, Schema};
use crate::core::store::Column;
use crate::core::value::Value;

/// A record the mapper can read fields from and write fields into.
pub trait Record: Sized {
    /// No-argument construction used when rebuilding a record from a row.
    fn instantiate() -> Result<Self, Error>;

    fn read_field(&self, name: &str) -> Result<Value, Error>;

    fn write_field(&mut self, name: &str, value: Value) -> Result<(), Error>;
}

/// A record type with a compiled-in declaration.
pub trait Declared: Record {
    fn declare() -> RecordDecl;
}

pub fn unknown_field(name: &str) -> Error {
    Error::new(ErrorKind::Schema)
        .with_message("record has no such field")
        .with_field(name)
}

/// Wire-ready form of one record; lives for a single insert.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MarshalledRecord {
    key: Vec<u8>,
    super_column: Option<Vec<u8>>,
    columns: Vec<(String, Vec<u8>)>,
}

impl MarshalledRecord {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn super_column(&self) -> Option<&[u8]> {
        self.super_column.as_deref()
    }

    pub fn columns(&self) -> &[(String, Vec<u8>)] {
        &self.columns
    }

    pub fn into_parts(self) -> (Vec<u8>, Option<Vec<u8>>, Vec<(String, Vec<u8>)>) {
        (self.key, self.super_column, self.columns)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Marshaller<'a> {
    schema: &'a Schema,
    codecs: &'a CodecSet,
}

impl<'a> Marshaller<'a> {
    pub fn new(schema: &'a Schema, codecs: &'a CodecSet) -> Self {
        Self { schema, codecs }
    }

    pub fn marshal<R: Record>(&self, record: &R) -> Result<MarshalledRecord, Error> {
        let mut out = MarshalledRecord::default();
        for property in self.schema.properties() {
            let value = record.read_field(property.name())?;
            let bytes = self
                .codecs
                .encode(&value)
                .map_err(|err| self.field_error(err, property))?;
            match property.role() {
                PropertyRole::Key => out.key = bytes,
                PropertyRole::SuperColumn => out.super_column = Some(bytes),
                PropertyRole::Plain => out.columns.push((property.name().to_string(), bytes)),
            }
        }

        if out.key.is_empty() {
            return Err(self.missing_key());
        }
        Ok(out)
    }

    /// Row key of a record as the store sees it.
    pub fn row_key<R: Record>(&self, record: &R) -> Result<String, Error> {
        let property = self.schema.key_property();
        let value = record.read_field(property.name())?;
        let bytes = self
            .codecs
            .encode(&value)
            .map_err(|err| self.field_error(err, property))?;
        if bytes.is_empty() {
            return Err(self.missing_key());
        }
        self.codecs.bytes_to_text(&bytes)
    }

    pub fn unmarshal<R: Record>(
        &self,
        key: &str,
        columns: &[Column],
        super_column: Option<&[u8]>,
    ) -> Result<R, Error> {
        let mut record = R::instantiate().map_err(|err| {
            Error::new(ErrorKind::Instantiation)
                .with_message("could not instantiate record")
                .with_collection(self.schema.collection())
                .with_source(err)
        })?;

        let key_property = self.schema.key_property();
        let key_bytes = self.codecs.text_to_bytes(key)?;
        self.assign(&mut record, key_property, &key_bytes)?;

        for column in columns {
            let Some(property) = self.schema.property_by_encoded(&column.name) else {
                continue;
            };
            if property.role() == PropertyRole::Key {
                continue;
            }
            self.assign(&mut record, property, &column.value)?;
        }

        if let (Some(bytes), Some(property)) = (super_column, self.schema.super_column_property()) {
            self.assign(&mut record, property, bytes)?;
        }
        Ok(record)
    }

    fn assign<R: Record>(&self, record: &mut R, property: &Property, bytes: &[u8]) -> Result<(), Error> {
        let value = self
            .codecs
            .decode(property.ty(), bytes)
            .map_err(|err| self.field_error(err, property))?;
        record
            .write_field(property.name(), value)
            .map_err(|err| self.field_error(err, property))
    }

    fn field_error(&self, err: Error, property: &Property) -> Error {
        let err = if err.field().is_none() {
            err.with_field(property.name())
        } else {
            err
        };
        if err.collection().is_none() {
            err.with_collection(self.schema.collection())
        } else {
            err
        }
    }

    fn missing_key(&self) -> Error {
        Error::new(ErrorKind::MissingKey)
            .with_message("key is empty, cannot store record")
            .with_field(self.schema.key_property().name())
            .with_collection(self.schema.collection())
    }
}
