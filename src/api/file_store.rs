//! Purpose: Store client persisting row tables to a JSON snapshot file.
//! Exports: `FileStore`.
//! Role: Lets separate processes (the CLI included) share one store.
//! Invariants: An exclusive advisory lock is held for the whole unit of work.
//! Invariants: The snapshot is rewritten only when the unit of work succeeded and mutated rows.
#![allow(clippy::result_large_err)]

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use libc::{EACCES, EPERM};
use tracing::debug;

use super::tables::{STORE_FORMAT_VERSION, Tables};
use crate::core::error::{Error, ErrorKind};
use crate::core::store::{Endpoint, Keyspace, StoreClient};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// The file is created on first use.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(&self) -> Result<File, Error> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|err| {
                Error::new(io_error_kind(&err))
                    .with_message("failed to open store file")
                    .with_path(&self.path)
                    .with_source(err)
            })
    }

    fn lock<'a>(&self, file: &'a File) -> Result<StoreLock<'a>, Error> {
        file.lock_exclusive().map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_message("failed to lock store file")
                .with_path(&self.path)
                .with_source(err)
        })?;
        Ok(StoreLock { file })
    }

    fn load(&self, mut file: &File) -> Result<Tables, Error> {
        let mut text = String::new();
        file.read_to_string(&mut text).map_err(|err| self.io_error("read", err))?;
        if text.trim().is_empty() {
            return Ok(Tables::default());
        }
        let tables: Tables = serde_json::from_str(&text).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("store file is not a valid snapshot")
                .with_hint("Restore the file from a backup or point --store at a new path.")
                .with_path(&self.path)
                .with_source(err)
        })?;
        if tables.version() != STORE_FORMAT_VERSION {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!(
                    "unsupported store format version {}",
                    tables.version()
                ))
                .with_path(&self.path));
        }
        Ok(tables)
    }

    fn save(&self, mut file: &File, tables: &Tables) -> Result<(), Error> {
        let text = serde_json::to_vec(tables).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode store snapshot")
                .with_source(err)
        })?;
        file.set_len(0).map_err(|err| self.io_error("truncate", err))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|err| self.io_error("seek", err))?;
        file.write_all(&text).map_err(|err| self.io_error("write", err))?;
        file.flush().map_err(|err| self.io_error("flush", err))?;
        debug!(path = %self.path.display(), bytes = text.len(), "store snapshot written");
        Ok(())
    }

    fn io_error(&self, action: &str, err: io::Error) -> Error {
        Error::new(io_error_kind(&err))
            .with_message(format!("failed to {action} store file"))
            .with_path(&self.path)
            .with_source(err)
    }
}

impl StoreClient for FileStore {
    fn execute<T, F>(&self, endpoint: &Endpoint, work: F) -> Result<T, Error>
    where
        F: FnOnce(&mut dyn Keyspace) -> Result<T, Error>,
    {
        let file = self.open_file()?;
        let _lock = self.lock(&file)?;
        let mut tables = self.load(&file)?;
        let mut keyspace = tables.keyspace(&endpoint.namespace);
        let out = work(&mut keyspace)?;
        let dirty = keyspace.is_dirty();
        if dirty {
            self.save(&file, &tables)?;
        }
        Ok(out)
    }
}

struct StoreLock<'a> {
    file: &'a File,
}

impl Drop for StoreLock<'_> {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn io_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == EACCES || errno == EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}
