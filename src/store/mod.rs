//! Build Record Store
//!
//! Persistent cache of build status keyed by target commit. Every row is stamped with
//! the master head at write time; a read that finds a different master head purges the
//! whole table, since merge-derived commits across all rows go stale together.

pub mod persistence;

pub use persistence::SledBuildStore;

use crate::error::StorageError;
use crate::types::{BuildRecord, Sha};

/// Column values written alongside a commit. All absent means "queued".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEntry {
    pub builder: Option<String>,
    pub build_number: Option<i64>,
    pub status: Option<i32>,
}

impl BuildEntry {
    /// Entry for a build the coordinator has accepted but not started.
    pub fn queued() -> Self {
        Self::default()
    }

    pub fn new(builder: impl Into<String>, build_number: i64, status: i32) -> Self {
        Self {
            builder: Some(builder.into()),
            build_number: Some(build_number),
            status: Some(status),
        }
    }
}

/// Build Record Store interface
pub trait BuildStore: Send + Sync {
    /// Look up the record for `commit`.
    ///
    /// Returns `None` when no row exists, or when the row was written against a master
    /// head other than `master`; in that case the entire table is dropped first.
    fn get(&self, commit: &Sha, master: &Sha) -> Result<Option<BuildRecord>, StorageError>;

    /// Replace any row for `commit` with a new one stamped with `master`.
    ///
    /// Delete and insert happen in one transaction.
    fn put(&self, commit: &Sha, master: &Sha, entry: BuildEntry)
        -> Result<BuildRecord, StorageError>;

    /// Create the backing table if it does not exist. Idempotent.
    fn ensure_schema(&self) -> Result<(), StorageError>;

    /// Remove the backing table if present. Idempotent.
    fn drop_schema(&self) -> Result<(), StorageError>;
}
