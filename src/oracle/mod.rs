//! Merge Oracle
//!
//! Answers every question the resolver has about the repository: which commit a
//! branch names, how it relates to master, and which files a build would touch.

pub mod git;

pub use git::GitMergeOracle;

use crate::error::OracleError;
use crate::types::{MergeStatus, Sha};
use std::collections::BTreeSet;

/// Repository queries needed to decide whether and what to build
pub trait MergeOracle: Send + Sync {
    /// Resolve a branch name (or any revision expression) to a commit.
    ///
    /// Fails with [`OracleError::NotFound`] or [`OracleError::Invalid`] when the name
    /// does not resolve.
    fn lookup(&self, branch: &str) -> Result<Sha, OracleError>;

    /// Relationship of `commit` to the current master head.
    fn merge_status(&self, commit: &Sha) -> Result<MergeStatus, OracleError>;

    /// Paths touched between two commits.
    fn changed_files(&self, from: &Sha, to: &Sha) -> Result<BTreeSet<String>, OracleError>;

    /// Current head of master.
    fn master_head(&self) -> Result<Sha, OracleError>;

    /// Web link for a commit.
    fn commit_url(&self, commit: &Sha) -> String;
}
