//! Purpose: Narrow interface to the external column store.
//! Exports: `Endpoint`, `Column`, `SuperColumn`, `RowMutation`, `SlicePredicate`, `Keyspace`, `StoreClient`.
//! Role: Seam between the marshalling engine and any store client implementation.
//! Invariants: Single-row reads of an absent row fail with `ErrorKind::NotFound`; nothing else does.
//! Invariants: Multi-row reads return rows in ascending key order.
use serde::{Deserialize, Serialize};

use crate::core::error::Error;

/// Where a unit of work runs: host, port, and keyspace.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub namespace: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, namespace: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            namespace: namespace.into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Column {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
    pub timestamp: i64,
}

impl Column {
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            timestamp,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SuperColumn {
    pub name: Vec<u8>,
    pub columns: Vec<Column>,
}

/// Body of a single-row batch insert.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RowMutation {
    Columns(Vec<Column>),
    SuperColumns(Vec<SuperColumn>),
}

/// Names to fetch; column names for flat slices, super-column names for super slices.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SlicePredicate {
    pub column_names: Vec<Vec<u8>>,
}

impl SlicePredicate {
    pub fn new(column_names: Vec<Vec<u8>>) -> Self {
        Self { column_names }
    }

    pub fn matches(&self, name: &[u8]) -> bool {
        self.column_names.iter().any(|candidate| candidate == name)
    }
}

/// Rows keyed by row key, in ascending key order.
pub type RowSlices = Vec<(String, Vec<Column>)>;

/// Store primitives available inside one unit of work.
pub trait Keyspace {
    fn batch_insert(&mut self, key: &str, family: &str, mutation: RowMutation) -> Result<(), Error>;

    fn get_slice(
        &mut self,
        key: &str,
        family: &str,
        predicate: &SlicePredicate,
    ) -> Result<Vec<Column>, Error>;

    fn multiget_slice(
        &mut self,
        keys: &[String],
        family: &str,
        predicate: &SlicePredicate,
    ) -> Result<RowSlices, Error>;

    /// Inclusive key range; an empty bound is open on that side.
    fn get_range_slice(
        &mut self,
        family: &str,
        predicate: &SlicePredicate,
        start: &str,
        end: &str,
        count: usize,
    ) -> Result<RowSlices, Error>;

    fn get_super_slice(
        &mut self,
        key: &str,
        family: &str,
        predicate: &SlicePredicate,
    ) -> Result<Vec<SuperColumn>, Error>;

    fn remove(&mut self, key: &str, family: &str) -> Result<(), Error>;
}

/// Runs units of work against one connection to the store.
pub trait StoreClient: Send + Sync {
    fn execute<T, F>(&self, endpoint: &Endpoint, work: F) -> Result<T, Error>
    where
        F: FnOnce(&mut dyn Keyspace) -> Result<T, Error>;
}

impl<S: StoreClient> StoreClient for &S {
    fn execute<T, F>(&self, endpoint: &Endpoint, work: F) -> Result<T, Error>
    where
        F: FnOnce(&mut dyn Keyspace) -> Result<T, Error>,
    {
        (**self).execute(endpoint, work)
    }
}

impl<S: StoreClient> StoreClient for std::sync::Arc<S> {
    fn execute<T, F>(&self, endpoint: &Endpoint, work: F) -> Result<T, Error>
    where
        F: FnOnce(&mut dyn Keyspace) -> Result<T, Error>,
    {
        (**self).execute(endpoint, work)
    }
}
