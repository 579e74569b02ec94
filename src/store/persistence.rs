//! Persistence layer for the Build Record Store

use crate::error::StorageError;
use crate::store::{BuildEntry, BuildStore};
use crate::types::{BuildRecord, Sha};
use parking_lot::RwLock;
use sled::transaction::{TransactionError, TransactionResult};
use sled::{Db, Tree};
use std::io;
use std::path::Path;
use tracing::{debug, warn};

const TABLE_BUILDS: &str = "build_store";

/// Sled-based implementation of BuildStore
///
/// The table lives in its own sled tree, opened lazily. Reads and writes hold the
/// table lock shared; dropping the table holds it exclusively, so a purge never
/// interleaves with a half-finished write.
pub struct SledBuildStore {
    db: Db,
    table: RwLock<Option<Tree>>,
}

impl SledBuildStore {
    /// Open (or create) a sled database at the given directory.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Ok(Self::from_db(db))
    }

    /// Wrap an already opened database.
    pub fn from_db(db: Db) -> Self {
        Self {
            db,
            table: RwLock::new(None),
        }
    }

    /// All rows currently in the table, ordered by target commit.
    ///
    /// No staleness check is applied.
    pub fn records(&self) -> Result<Vec<BuildRecord>, StorageError> {
        self.with_table(|tree| {
            let mut out = Vec::new();
            for item in tree.iter() {
                let (key, value) = item.map_err(to_storage_io)?;
                out.push(decode_record(&key, &value)?);
            }
            Ok(out)
        })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }

    fn with_table<T>(
        &self,
        f: impl Fn(&Tree) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        loop {
            {
                let guard = self.table.read();
                if let Some(tree) = guard.as_ref() {
                    return f(tree);
                }
            }
            // Dropped between open and use; reopen.
            self.ensure_schema()?;
        }
    }
}

impl BuildStore for SledBuildStore {
    fn get(&self, commit: &Sha, master: &Sha) -> Result<Option<BuildRecord>, StorageError> {
        let record = self.with_table(|tree| {
            match tree.get(commit.as_str().as_bytes()).map_err(to_storage_io)? {
                Some(value) => decode_record(commit.as_str().as_bytes(), &value).map(Some),
                None => Ok(None),
            }
        })?;

        let Some(record) = record else {
            debug!(commit = %commit, "Build cache miss");
            return Ok(None);
        };

        if &record.master_revision != master {
            warn!(
                commit = %commit,
                cached_master = %record.master_revision,
                current_master = %master,
                "Master moved; purging build cache"
            );
            self.drop_schema()?;
            return Ok(None);
        }

        debug!(commit = %commit, status = ?record.status, "Build cache hit");
        Ok(Some(record))
    }

    fn put(
        &self,
        commit: &Sha,
        master: &Sha,
        entry: BuildEntry,
    ) -> Result<BuildRecord, StorageError> {
        let record = BuildRecord {
            master_revision: master.clone(),
            target_commit: commit.clone(),
            builder: entry.builder,
            build_number: entry.build_number,
            status: entry.status,
        };
        let value = serde_json::to_vec(&record).map_err(to_storage_data)?;
        let key = commit.as_str().as_bytes();

        self.with_table(|tree| {
            let result: TransactionResult<(), ()> = tree.transaction(|tx| {
                tx.remove(key)?;
                tx.insert(key, value.as_slice())?;
                Ok(())
            });
            result.map_err(|e| match e {
                TransactionError::Abort(()) => {
                    StorageError::TransactionAborted(format!("put {}", commit))
                }
                TransactionError::Storage(err) => to_storage_io(err),
            })
        })?;

        debug!(commit = %commit, master = %master, status = ?record.status, "Build record written");
        Ok(record)
    }

    fn ensure_schema(&self) -> Result<(), StorageError> {
        if self.table.read().is_some() {
            return Ok(());
        }
        let mut guard = self.table.write();
        if guard.is_none() {
            *guard = Some(self.db.open_tree(TABLE_BUILDS).map_err(to_storage_io)?);
        }
        Ok(())
    }

    fn drop_schema(&self) -> Result<(), StorageError> {
        let mut guard = self.table.write();
        guard.take();
        let existed = self.db.drop_tree(TABLE_BUILDS).map_err(to_storage_io)?;
        if existed {
            debug!(table = TABLE_BUILDS, "Build table dropped");
        }
        Ok(())
    }
}

fn decode_record(key: &[u8], value: &[u8]) -> Result<BuildRecord, StorageError> {
    serde_json::from_slice(value).map_err(|e| StorageError::CorruptRecord {
        commit: String::from_utf8_lossy(key).into_owned(),
        reason: e.to_string(),
    })
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
}
