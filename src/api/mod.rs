//! Purpose: Define the stable public Rust API boundary for colmap.
//! Exports: Mapper, store clients, documents, config, and the core types they take.
//! Role: Public, additive-only surface used by the CLI and embedding applications.
//! Invariants: This module is the only public path to the reference stores.
//! Invariants: Row-table internals remain private.

mod config;
mod document;
mod file_store;
mod mapper;
mod memory;
mod tables;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::codec::{Codec, CodecRegistry, CodecSet, FnCodec, SerializationPolicy};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::marshal::{Declared, MarshalledRecord, Marshaller, Record, unknown_field};
pub use crate::core::schema::{Access, FieldDecl, FieldRoles, RecordDecl, Schema};
pub use crate::core::store::{
    Column, Endpoint, Keyspace, RowMutation, RowSlices, SlicePredicate, StoreClient, SuperColumn,
};
pub use crate::core::value::{EnumDecl, FieldType, FromValue, NamedEnum, TypeTag, Value};
pub use config::{DEFAULT_HOST, DEFAULT_PORT, MapperConfig};
pub use document::{AccessSpec, Document, FieldSpec, RoleSpec, SchemaFile, TypeSpec, value_from_json};
pub use file_store::FileStore;
pub use mapper::{ApiResult, Mapper};
pub use memory::MemoryStore;
