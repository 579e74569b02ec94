//! Build Status Resolver
//!
//! Turns "what is the build of this branch?" into a cached answer, queueing a build
//! with the coordinator on the first request for a branch head:
//!
//! 1. resolve the branch to a commit (unresolvable: no build)
//! 2. return the cached record if there is one for the current master
//! 3. evaluate the merge with master (up to date or conflicting: no build)
//! 4. collect the files the build would touch
//! 5. notify the coordinator; once accepted, record the commit as queued and read it
//!    back through step 1 so callers always see what a cache hit would show

use crate::config::HookConfig;
use crate::error::HookError;
use crate::identity::{CallerIdentity, StatusWriter};
use crate::notify::ChangeNotifier;
use crate::oracle::MergeOracle;
use crate::store::{BuildEntry, BuildStore};
use crate::types::{
    BuildRecord, BuildState, ChangeNotification, ChangeProperties, MergeStatus, Sha, SOURCE_TAG,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on notify-then-reread rounds within one `resolve` call.
const MAX_RESOLVE_PASSES: usize = 3;

/// Settings the resolver copies out of [`HookConfig`]
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Repository label sent with each change
    pub repository: String,
    pub ticket_url_base: String,
    pub status_writer: String,
}

impl ResolverSettings {
    pub fn from_config(config: &HookConfig) -> Self {
        Self {
            repository: config.coordinator.repository.clone(),
            ticket_url_base: config.tracker.ticket_url_base.clone(),
            status_writer: config.tracker.status_writer.clone(),
        }
    }
}

/// Outcome of one pass through the resolution steps
enum Pass {
    Done(Option<BuildRecord>),
    Queued,
}

/// Single entry point for build status lookups and updates
pub struct BuildStatusResolver {
    oracle: Arc<dyn MergeOracle>,
    store: Arc<dyn BuildStore>,
    notifier: Arc<dyn ChangeNotifier>,
    status_writer: StatusWriter,
    repository: String,
    ticket_url_base: String,
}

impl BuildStatusResolver {
    pub fn new(
        oracle: Arc<dyn MergeOracle>,
        store: Arc<dyn BuildStore>,
        notifier: Arc<dyn ChangeNotifier>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            oracle,
            store,
            notifier,
            status_writer: StatusWriter::new(settings.status_writer),
            repository: settings.repository,
            ticket_url_base: settings.ticket_url_base.trim_end_matches('/').to_string(),
        }
    }

    /// Build status of `branch`, queueing a build if none is known yet.
    ///
    /// `Ok(None)` means there is nothing to build: the branch does not resolve, is
    /// already merged, does not merge cleanly, or the coordinator refused the change.
    pub fn resolve(
        &self,
        branch: &str,
        author: &str,
        ticket_id: Option<u64>,
    ) -> Result<Option<BuildRecord>, HookError> {
        let branch = branch.trim();
        for _ in 0..MAX_RESOLVE_PASSES {
            match self.resolve_pass(branch, author, ticket_id)? {
                Pass::Done(record) => return Ok(record),
                Pass::Queued => continue,
            }
        }
        warn!(
            branch = %branch,
            passes = MAX_RESOLVE_PASSES,
            "Queued build never became visible; master is probably moving"
        );
        Ok(None)
    }

    fn resolve_pass(
        &self,
        branch: &str,
        author: &str,
        ticket_id: Option<u64>,
    ) -> Result<Pass, HookError> {
        let commit = match self.oracle.lookup(branch) {
            Ok(commit) => commit,
            Err(e) if e.is_unresolvable() => {
                debug!(branch = %branch, reason = %e, "Branch does not resolve; nothing to build");
                return Ok(Pass::Done(None));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(record) = self.cached(&commit)? {
            return Ok(Pass::Done(Some(record)));
        }

        let target = match self.oracle.merge_status(&commit)? {
            MergeStatus::UpToDate => {
                debug!(branch = %branch, commit = %commit, "Already merged; nothing to build");
                return Ok(Pass::Done(None));
            }
            MergeStatus::FailedMerge => {
                debug!(branch = %branch, commit = %commit, "Does not merge; nothing to build");
                return Ok(Pass::Done(None));
            }
            MergeStatus::FastForward => commit.clone(),
            MergeStatus::Merged(merge) => merge,
        };

        let master = self.oracle.master_head()?;
        let change = ChangeNotification {
            project: String::new(),
            repository: self.repository.clone(),
            author: author.to_string(),
            changed_files: self.oracle.changed_files(&master, &target)?,
            comment_text: self.comment_text(branch, ticket_id),
            branch_name: branch.to_string(),
            target_revision: target.clone(),
            category: None,
            when: None,
            properties: ChangeProperties {
                ticket_id,
                premerge_revision: commit.clone(),
            },
            revision_link: self.oracle.commit_url(&target),
            source_tag: SOURCE_TAG.to_string(),
        };

        if !self.notifier.submit(&change) {
            debug!(branch = %branch, target = %target, "Change not accepted; nothing queued");
            return Ok(Pass::Done(None));
        }

        self.store.put(&commit, &master, BuildEntry::queued())?;
        info!(
            branch = %branch,
            commit = %commit,
            target = %target,
            files = change.changed_files.len(),
            "Build queued"
        );
        Ok(Pass::Queued)
    }

    /// Cached record for `commit`, if still valid against the current master.
    pub fn cached(&self, commit: &Sha) -> Result<Option<BuildRecord>, HookError> {
        let master = self.oracle.master_head()?;
        Ok(self.store.get(commit, &master)?)
    }

    /// Record a build result reported by the coordinator.
    ///
    /// Only the configured status writer may call this; anyone else is rejected
    /// before anything is written.
    pub fn set_status(
        &self,
        caller: &CallerIdentity,
        commit: &Sha,
        builder: &str,
        build_number: i64,
        status: i32,
    ) -> Result<BuildRecord, HookError> {
        self.status_writer.verify(caller)?;
        let state =
            BuildState::from_code(Some(status)).ok_or(HookError::InvalidStatus(status.into()))?;

        let master = self.oracle.master_head()?;
        let record = self
            .store
            .put(commit, &master, BuildEntry::new(builder, build_number, status))?;
        info!(
            commit = %commit,
            builder = %builder,
            build_number,
            state = %state,
            "Build status recorded"
        );
        Ok(record)
    }

    /// Drop every cached record.
    pub fn purge(&self) -> Result<(), HookError> {
        self.store.drop_schema()?;
        Ok(())
    }

    fn comment_text(&self, branch: &str, ticket_id: Option<u64>) -> String {
        match ticket_id {
            Some(id) => format!("From Trac #{id} ({}/{id})", self.ticket_url_base),
            None => format!("From branch {}", branch),
        }
    }
}
