//! Purpose: In-process row tables implementing the `Keyspace` primitives.
//! Exports: `Tables`, `TablesKeyspace` (crate-internal).
//! Role: Shared storage model behind `MemoryStore` and `FileStore`.
//! Invariants: Rows are ordered by key; columns and super-columns are ordered by name.
//! Invariants: A column write never replaces a column with a newer timestamp.
//! Invariants: Only inserts and removals mark a keyspace dirty.
use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};
use crate::core::store::{Column, Keyspace, RowMutation, RowSlices, SlicePredicate, SuperColumn};

pub(crate) const STORE_FORMAT_VERSION: u32 = 1;

type Family = BTreeMap<String, StoredRow>;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub(crate) struct Tables {
    version: u32,
    #[serde(default)]
    keyspaces: BTreeMap<String, BTreeMap<String, Family>>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            version: STORE_FORMAT_VERSION,
            keyspaces: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
struct StoredRow {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    super_columns: Vec<SuperColumn>,
}

impl Tables {
    pub(crate) fn version(&self) -> u32 {
        self.version
    }

    pub(crate) fn keyspace(&mut self, namespace: &str) -> TablesKeyspace<'_> {
        TablesKeyspace {
            families: self.keyspaces.entry(namespace.to_string()).or_default(),
            dirty: false,
        }
    }
}

pub(crate) struct TablesKeyspace<'a> {
    families: &'a mut BTreeMap<String, Family>,
    dirty: bool,
}

impl TablesKeyspace<'_> {
    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn row(&self, key: &str, family: &str) -> Result<&StoredRow, Error> {
        self.families
            .get(family)
            .and_then(|rows| rows.get(key))
            .ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message(format!("row {key} not found"))
                    .with_collection(family)
            })
    }
}

impl Keyspace for TablesKeyspace<'_> {
    fn batch_insert(&mut self, key: &str, family: &str, mutation: RowMutation) -> Result<(), Error> {
        if key.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("row key must not be empty")
                .with_collection(family));
        }
        let row = self
            .families
            .entry(family.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default();
        match mutation {
            RowMutation::Columns(columns) => {
                for column in columns {
                    upsert_column(&mut row.columns, column);
                }
            }
            RowMutation::SuperColumns(super_columns) => {
                for super_column in super_columns {
                    let index = match row
                        .super_columns
                        .binary_search_by(|existing| existing.name.cmp(&super_column.name))
                    {
                        Ok(index) => index,
                        Err(index) => {
                            row.super_columns.insert(
                                index,
                                SuperColumn {
                                    name: super_column.name.clone(),
                                    columns: Vec::new(),
                                },
                            );
                            index
                        }
                    };
                    for column in super_column.columns {
                        upsert_column(&mut row.super_columns[index].columns, column);
                    }
                }
            }
        }
        self.dirty = true;
        Ok(())
    }

    fn get_slice(
        &mut self,
        key: &str,
        family: &str,
        predicate: &SlicePredicate,
    ) -> Result<Vec<Column>, Error> {
        let row = self.row(key, family)?;
        Ok(select(&row.columns, predicate))
    }

    fn multiget_slice(
        &mut self,
        keys: &[String],
        family: &str,
        predicate: &SlicePredicate,
    ) -> Result<RowSlices, Error> {
        let Some(rows) = self.families.get(family) else {
            return Ok(Vec::new());
        };
        let mut found = BTreeMap::new();
        for key in keys {
            if let Some(row) = rows.get(key) {
                found.insert(key.clone(), select(&row.columns, predicate));
            }
        }
        Ok(found.into_iter().collect())
    }

    fn get_range_slice(
        &mut self,
        family: &str,
        predicate: &SlicePredicate,
        start: &str,
        end: &str,
        count: usize,
    ) -> Result<RowSlices, Error> {
        let Some(rows) = self.families.get(family) else {
            return Ok(Vec::new());
        };
        if !start.is_empty() && !end.is_empty() && start > end {
            return Ok(Vec::new());
        }
        let lower = bound(start);
        let upper = bound(end);
        Ok(rows
            .range::<str, _>((lower, upper))
            .take(count)
            .map(|(key, row)| (key.clone(), select(&row.columns, predicate)))
            .collect())
    }

    fn get_super_slice(
        &mut self,
        key: &str,
        family: &str,
        predicate: &SlicePredicate,
    ) -> Result<Vec<SuperColumn>, Error> {
        let row = self.row(key, family)?;
        Ok(row
            .super_columns
            .iter()
            .filter(|super_column| predicate.matches(&super_column.name))
            .cloned()
            .collect())
    }

    fn remove(&mut self, key: &str, family: &str) -> Result<(), Error> {
        let removed = self
            .families
            .get_mut(family)
            .and_then(|rows| rows.remove(key))
            .is_some();
        if removed {
            self.dirty = true;
        }
        Ok(())
    }
}

fn bound(key: &str) -> Bound<&str> {
    if key.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Included(key)
    }
}

fn select(columns: &[Column], predicate: &SlicePredicate) -> Vec<Column> {
    columns
        .iter()
        .filter(|column| predicate.matches(&column.name))
        .cloned()
        .collect()
}

fn upsert_column(columns: &mut Vec<Column>, column: Column) {
    match columns.binary_search_by(|existing| existing.name.cmp(&column.name)) {
        Ok(index) => {
            if column.timestamp >= columns[index].timestamp {
                columns[index] = column;
            }
        }
        Err(index) => columns.insert(index, column),
    }
}
