//! Purpose: Access operations composed from the schema, the marshaller, and a store client.
//! Exports: `Mapper`.
//! Role: Public entry point for insert, get, get-many, range, super-column get, and delete.
//! Invariants: Each operation runs exactly one unit of work, or none when the input is rejected.
//! Invariants: Not-found never escapes a read; other store failures surface as `ErrorKind::Store`.
//! Invariants: Marshalling and decoding happen outside the unit of work.
#![allow(clippy::result_large_err)]

use std::marker::PhantomData;

use time::OffsetDateTime;
use tracing::{debug, warn};

use super::config::MapperConfig;
use crate::core::codec::{CodecRegistry, CodecSet};
use crate::core::error::{Error, ErrorKind};
use crate::core::marshal::{Declared, Marshaller, Record};
use crate::core::schema::{RecordDecl, Schema};
use crate::core::store::{
    Column, Endpoint, Keyspace, RowMutation, SlicePredicate, StoreClient, SuperColumn,
};
use crate::core::value::Value;

pub type ApiResult<T> = Result<T, Error>;

/// Maps records of type `R` onto one column family through the store client `S`.
pub struct Mapper<R, S> {
    schema: Schema,
    codecs: CodecSet,
    endpoint: Endpoint,
    store: S,
    _record: PhantomData<fn() -> R>,
}

impl<R: Declared, S: StoreClient> Mapper<R, S> {
    pub fn new(config: &MapperConfig, registry: CodecRegistry, store: S) -> ApiResult<Self> {
        Self::with_declaration(&R::declare(), config, registry, store)
    }
}

impl<R: Record, S: StoreClient> Mapper<R, S> {
    pub fn with_declaration(
        decl: &RecordDecl,
        config: &MapperConfig,
        registry: CodecRegistry,
        store: S,
    ) -> ApiResult<Self> {
        let codecs = CodecSet::new(registry, config.serialization);
        let schema = Schema::build(decl, &codecs)?;
        let endpoint = config.endpoint(schema.namespace());
        debug!(
            collection = schema.collection(),
            namespace = %endpoint.namespace,
            properties = schema.properties().len(),
            "mapper ready"
        );
        Ok(Self {
            schema,
            codecs,
            endpoint,
            store,
            _record: PhantomData,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn codecs(&self) -> &CodecSet {
        &self.codecs
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn marshaller(&self) -> Marshaller<'_> {
        Marshaller::new(&self.schema, &self.codecs)
    }

    fn predicate(&self) -> SlicePredicate {
        SlicePredicate::new(self.schema.encoded_names().to_vec())
    }

    /// Writes one record as one row, stamping every column with the same timestamp.
    pub fn insert(&self, record: &R) -> ApiResult<()> {
        let marshalled = self.marshaller().marshal(record)?;
        let (key, super_column, pairs) = marshalled.into_parts();
        let key = self.codecs.bytes_to_text(&key)?;
        let timestamp = now_millis();

        let mut columns = Vec::with_capacity(pairs.len());
        for (name, value) in pairs {
            let name = match self.schema.property(&name) {
                Some(property) => property.encoded_name().to_vec(),
                None => self.codecs.text_to_bytes(&name)?,
            };
            columns.push(Column::new(name, value, timestamp));
        }
        let mutation = match super_column {
            Some(name) => RowMutation::SuperColumns(vec![SuperColumn { name, columns }]),
            None => RowMutation::Columns(columns),
        };

        debug!(collection = self.schema.collection(), key = %key, timestamp, "insert");
        let family = self.schema.collection();
        self.execute("insert", |keyspace| {
            keyspace.batch_insert(&key, family, mutation)
        })
    }

    /// Reads one row; `None` when the row is absent or has no mapped columns.
    pub fn get(&self, key: &str) -> ApiResult<Option<R>> {
        debug!(collection = self.schema.collection(), key, "get");
        let predicate = self.predicate();
        let family = self.schema.collection();
        let columns = self.execute("get", |keyspace| {
            absent_as_none(keyspace.get_slice(key, family, &predicate))
        })?;
        match columns {
            Some(columns) if !columns.is_empty() => {
                self.marshaller().unmarshal(key, &columns, None).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Reads several rows in one call; absent rows are omitted and results are key-ordered.
    pub fn get_many<I, K>(&self, keys: I) -> ApiResult<Vec<R>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys = keys.into_iter().map(Into::into).collect::<Vec<String>>();
        debug!(collection = self.schema.collection(), keys = keys.len(), "get_many");
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let predicate = self.predicate();
        let family = self.schema.collection();
        let rows = self.execute("get_many", |keyspace| {
            absent_as_none(keyspace.multiget_slice(&keys, family, &predicate))
        })?;
        self.unmarshal_rows(rows.unwrap_or_default())
    }

    /// Reads rows with keys in `start..=end`, at most `limit` of them.
    ///
    /// An empty bound is open on that side.
    pub fn get_range(&self, start: &str, end: &str, limit: usize) -> ApiResult<Vec<R>> {
        debug!(collection = self.schema.collection(), start, end, limit, "get_range");
        if limit == 0 {
            return Ok(Vec::new());
        }
        let predicate = self.predicate();
        let family = self.schema.collection();
        let rows = self.execute("get_range", |keyspace| {
            absent_as_none(keyspace.get_range_slice(family, &predicate, start, end, limit))
        })?;
        self.unmarshal_rows(rows.unwrap_or_default())
    }

    /// Reads the named super-columns of one row, one record per super-column found.
    pub fn get_super(&self, key: &str, names: &[Value]) -> ApiResult<Vec<R>> {
        debug!(collection = self.schema.collection(), key, names = names.len(), "get_super");
        let property = self.schema.super_column_property().ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("record type has no super-column field")
                .with_collection(self.schema.collection())
        })?;
        let encoded = names
            .iter()
            .map(|name| {
                self.codecs.encode(name).map_err(|err| {
                    err.with_field(property.name())
                        .with_collection(self.schema.collection())
                })
            })
            .collect::<ApiResult<Vec<_>>>()?;
        if encoded.is_empty() {
            return Ok(Vec::new());
        }
        let predicate = SlicePredicate::new(encoded);
        let family = self.schema.collection();
        let super_columns = self.execute("get_super", |keyspace| {
            absent_as_none(keyspace.get_super_slice(key, family, &predicate))
        })?;
        let marshaller = self.marshaller();
        super_columns
            .unwrap_or_default()
            .iter()
            .map(|super_column| {
                marshaller.unmarshal(key, &super_column.columns, Some(&super_column.name))
            })
            .collect()
    }

    /// Removes the row holding `record`; removing an absent row is a no-op.
    pub fn delete(&self, record: &R) -> ApiResult<()> {
        let key = self.marshaller().row_key(record)?;
        self.delete_key(&key)
    }

    pub fn delete_key(&self, key: &str) -> ApiResult<()> {
        if key.is_empty() {
            return Err(Error::new(ErrorKind::MissingKey)
                .with_message("key is empty, cannot delete record")
                .with_field(self.schema.key_property().name())
                .with_collection(self.schema.collection()));
        }
        debug!(collection = self.schema.collection(), key, "delete");
        let family = self.schema.collection();
        self.execute("delete", |keyspace| keyspace.remove(key, family))
    }

    fn unmarshal_rows(&self, rows: Vec<(String, Vec<Column>)>) -> ApiResult<Vec<R>> {
        let marshaller = self.marshaller();
        rows.into_iter()
            .filter(|(_, columns)| !columns.is_empty())
            .map(|(key, columns)| marshaller.unmarshal(&key, &columns, None))
            .collect()
    }

    fn execute<T, F>(&self, operation: &str, work: F) -> ApiResult<T>
    where
        F: FnOnce(&mut dyn Keyspace) -> ApiResult<T>,
    {
        self.store.execute(&self.endpoint, work).map_err(|err| {
            warn!(
                operation,
                collection = self.schema.collection(),
                host = %self.endpoint.host,
                port = self.endpoint.port,
                error = %err,
                "store call failed"
            );
            let err = Error::store(err);
            if err.collection().is_none() {
                err.with_collection(self.schema.collection())
            } else {
                err
            }
        })
    }
}

fn absent_as_none<T>(result: ApiResult<T>) -> ApiResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
