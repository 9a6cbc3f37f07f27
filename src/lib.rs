//! Purpose: Map typed records onto rows of a sparse, column-oriented store.
//! Exports: `api` (mapper, stores, documents, config) and `core` (codecs, schema, marshalling).
//! Role: Library backing the `colmap` CLI; usable directly by embedding applications.
//! Invariants: Schema and codec state are read-only after a mapper is built.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
