// Core modules: values, codecs, schema, marshalling, store interface, errors.
pub mod blob;
pub mod codec;
pub mod error;
pub mod marshal;
pub mod schema;
pub mod store;
pub mod value;
