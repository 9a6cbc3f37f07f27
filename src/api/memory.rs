//! Purpose: In-process store client backed by ordered row tables.
//! Exports: `MemoryStore`.
//! Role: Default store for tests and embedding; shares state across clones.
//! Invariants: Units of work run one at a time behind a mutex.
//! Invariants: `executions` counts every unit of work, including failed ones.
#![allow(clippy::result_large_err)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::tables::Tables;
use crate::core::error::{Error, ErrorKind};
use crate::core::store::{Endpoint, Keyspace, StoreClient};

#[derive(Debug, Default)]
struct Inner {
    tables: Mutex<Tables>,
    executions: AtomicU64,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of units of work run so far.
    pub fn executions(&self) -> u64 {
        self.inner.executions.load(Ordering::SeqCst)
    }
}

impl StoreClient for MemoryStore {
    fn execute<T, F>(&self, endpoint: &Endpoint, work: F) -> Result<T, Error>
    where
        F: FnOnce(&mut dyn Keyspace) -> Result<T, Error>,
    {
        self.inner.executions.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.inner.tables.lock().map_err(|_| {
            Error::new(ErrorKind::Internal).with_message("memory store lock poisoned")
        })?;
        let mut keyspace = tables.keyspace(&endpoint.namespace);
        work(&mut keyspace)
    }
}
