//! Purpose: Declarative record layout and the validated schema derived from it.
//! Exports: `RecordDecl`, `FieldDecl`, `FieldRoles`, `Access`, `Schema`, `Property`, `PropertyRole`.
//! Role: Built once per mapper; tells the marshaller which fields are key, super-column, or plain.
//! Invariants: Exactly one key property; at most one super-column property.
//! Invariants: A field cannot hold both roles; roles require accessor and mutator.
//! Invariants: Only read+write fields become properties; names are encoded once at build time.
use std::collections::HashSet;

use crate::core::codec::CodecSet;
use crate::core::error::{Error, ErrorKind};
use crate::core::value::FieldType;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Access {
    #[default]
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FieldRoles {
    key: bool,
    super_column: bool,
}

impl FieldRoles {
    pub const PLAIN: FieldRoles = FieldRoles {
        key: false,
        super_column: false,
    };
    pub const KEY: FieldRoles = FieldRoles {
        key: true,
        super_column: false,
    };
    pub const SUPER_COLUMN: FieldRoles = FieldRoles {
        key: false,
        super_column: true,
    };

    pub const fn union(self, other: FieldRoles) -> FieldRoles {
        FieldRoles {
            key: self.key || other.key,
            super_column: self.super_column || other.super_column,
        }
    }

    pub fn is_key(self) -> bool {
        self.key
    }

    pub fn is_super_column(self) -> bool {
        self.super_column
    }

    fn is_plain(self) -> bool {
        !self.key && !self.super_column
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: FieldType,
    pub access: Access,
    pub roles: FieldRoles,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            access: Access::ReadWrite,
            roles: FieldRoles::PLAIN,
        }
    }

    pub fn key(mut self) -> Self {
        self.roles = self.roles.union(FieldRoles::KEY);
        self
    }

    pub fn super_column(mut self) -> Self {
        self.roles = self.roles.union(FieldRoles::SUPER_COLUMN);
        self
    }

    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }
}

/// Row-level declaration: target column family, keyspace, and fields.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordDecl {
    pub collection: String,
    pub namespace: String,
    pub fields: Vec<FieldDecl>,
}

impl RecordDecl {
    pub fn new(collection: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            namespace: namespace.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PropertyRole {
    Key,
    SuperColumn,
    Plain,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Property {
    name: String,
    encoded_name: Vec<u8>,
    ty: FieldType,
    role: PropertyRole,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn encoded_name(&self) -> &[u8] {
        &self.encoded_name
    }

    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    pub fn role(&self) -> PropertyRole {
        self.role
    }
}

#[derive(Clone, Debug)]
pub struct Schema {
    collection: String,
    namespace: String,
    properties: Vec<Property>,
    key: usize,
    super_column: Option<usize>,
    encoded_names: Vec<Vec<u8>>,
}

impl Schema {
    pub fn build(decl: &RecordDecl, codecs: &CodecSet) -> Result<Self, Error> {
        let schema_error = |message: String| {
            Error::new(ErrorKind::Schema)
                .with_message(message)
                .with_collection(decl.collection.clone())
        };

        if decl.collection.is_empty() {
            return Err(schema_error("record declaration has no collection".to_string()));
        }

        let mut seen = HashSet::new();
        let mut properties = Vec::with_capacity(decl.fields.len());
        let mut key = None;
        let mut super_column = None;

        for field in &decl.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(schema_error(format!("duplicate field {}", field.name)));
            }
            if field.roles.is_key() && field.roles.is_super_column() {
                return Err(schema_error(format!(
                    "field {} is declared as both key and super-column",
                    field.name
                ))
                .with_field(field.name.clone()));
            }
            if field.access != Access::ReadWrite {
                if !field.roles.is_plain() {
                    return Err(schema_error(format!(
                        "field {} needs both accessor and mutator to be key or super-column",
                        field.name
                    ))
                    .with_field(field.name.clone()));
                }
                continue;
            }

            let role = if field.roles.is_key() {
                if key.is_some() {
                    return Err(schema_error("more than one key field".to_string())
                        .with_field(field.name.clone()));
                }
                key = Some(properties.len());
                PropertyRole::Key
            } else if field.roles.is_super_column() {
                if super_column.is_some() {
                    return Err(schema_error("more than one super-column field".to_string())
                        .with_field(field.name.clone()));
                }
                super_column = Some(properties.len());
                PropertyRole::SuperColumn
            } else {
                PropertyRole::Plain
            };

            let encoded_name = codecs
                .text_to_bytes(&field.name)
                .map_err(|err| err.with_field(field.name.clone()))?;
            properties.push(Property {
                name: field.name.clone(),
                encoded_name,
                ty: field.ty.clone(),
                role,
            });
        }

        let key = key.ok_or_else(|| {
            schema_error(format!("no key field declared for {}", decl.collection))
                .with_hint("Mark exactly one field as the row key.")
        })?;
        if !properties
            .iter()
            .any(|property| property.role == PropertyRole::Plain)
        {
            return Err(
                schema_error(format!("no value columns declared for {}", decl.collection))
                    .with_hint("Declare at least one read-write field besides the key and super-column."),
            );
        }
        let encoded_names = properties
            .iter()
            .map(|property| property.encoded_name.clone())
            .collect();

        Ok(Self {
            collection: decl.collection.clone(),
            namespace: decl.namespace.clone(),
            properties,
            key,
            super_column,
            encoded_names,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|property| property.name == name)
    }

    /// Matches a stored column name against encoded property names without decoding it.
    pub fn property_by_encoded(&self, encoded: &[u8]) -> Option<&Property> {
        self.properties
            .iter()
            .find(|property| property.encoded_name == encoded)
    }

    pub fn key_property(&self) -> &Property {
        &self.properties[self.key]
    }

    pub fn super_column_property(&self) -> Option<&Property> {
        self.super_column.map(|index| &self.properties[index])
    }

    /// Encoded names of every mapped property, used as the read predicate.
    pub fn encoded_names(&self) -> &[Vec<u8>] {
        &self.encoded_names
    }
}
