//! Core types for the build hook

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A git commit SHA (hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sha(String);

impl Sha {
    /// Creates a new Sha from a string, trimming surrounding whitespace.
    ///
    /// Note: this does not validate the format.
    pub fn new(s: impl Into<String>) -> Self {
        let s = s.into();
        let trimmed = s.trim();
        if trimmed.len() == s.len() {
            Sha(s)
        } else {
            Sha(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short (7-character) form for display.
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Sha {
    fn from(s: &str) -> Self {
        Sha::new(s)
    }
}

impl From<String> for Sha {
    fn from(s: String) -> Self {
        Sha::new(s)
    }
}

/// Status code reported while a build is running.
pub const IN_PROGRESS_CODE: i32 = -1;

/// Terminal build outcomes, in status-code order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildOutcome {
    Success,
    Warnings,
    Failure,
    Skipped,
    Exception,
    Retry,
}

impl BuildOutcome {
    /// All outcomes indexed by status code.
    pub const ALL: [BuildOutcome; 6] = [
        BuildOutcome::Success,
        BuildOutcome::Warnings,
        BuildOutcome::Failure,
        BuildOutcome::Skipped,
        BuildOutcome::Exception,
        BuildOutcome::Retry,
    ];

    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            BuildOutcome::Success => "Success",
            BuildOutcome::Warnings => "Warnings",
            BuildOutcome::Failure => "Failure",
            BuildOutcome::Skipped => "Skipped",
            BuildOutcome::Exception => "Exception",
            BuildOutcome::Retry => "Retry",
        }
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decoded view of a record's status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Accepted by the coordinator, not yet picked up.
    Queued,
    InProgress,
    Terminal(BuildOutcome),
}

impl BuildState {
    /// Decode a raw status column. Returns `None` for codes outside the enumeration.
    pub fn from_code(code: Option<i32>) -> Option<Self> {
        match code {
            None => Some(BuildState::Queued),
            Some(IN_PROGRESS_CODE) => Some(BuildState::InProgress),
            Some(c) => BuildOutcome::from_code(c).map(BuildState::Terminal),
        }
    }

    pub fn code(self) -> Option<i32> {
        match self {
            BuildState::Queued => None,
            BuildState::InProgress => Some(IN_PROGRESS_CODE),
            BuildState::Terminal(outcome) => Some(outcome.code()),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BuildState::Queued => "Queued",
            BuildState::InProgress => "In progress",
            BuildState::Terminal(outcome) => outcome.label(),
        }
    }

    /// Ticket review class used to colour the status badge.
    pub fn review_class(self) -> Option<&'static str> {
        match self {
            BuildState::Queued => None,
            BuildState::InProgress => Some("needs_review"),
            BuildState::Terminal(BuildOutcome::Success) => Some("positive_review"),
            BuildState::Terminal(_) => Some("needs_work"),
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Cached build status for one target commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Master head at the time the record was written
    pub master_revision: Sha,
    /// Commit this record describes (primary key)
    pub target_commit: Sha,
    pub builder: Option<String>,
    pub build_number: Option<i64>,
    /// Raw status column: absent = queued, -1 = in progress, 0..=5 = outcome
    pub status: Option<i32>,
}

impl BuildRecord {
    /// Decoded state, or `None` if the stored code is outside the enumeration.
    pub fn state(&self) -> Option<BuildState> {
        BuildState::from_code(self.status)
    }

    /// Coordinator web page for this build, once builder and number are known.
    pub fn build_url(&self, host: &str) -> Option<String> {
        match (&self.builder, self.build_number) {
            (Some(builder), Some(number)) => Some(format!(
                "http://{}/builders/{}/builds/{}",
                host, builder, number
            )),
            _ => None,
        }
    }
}

/// Relationship between a commit and the current master head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStatus {
    /// The commit is already contained in master.
    UpToDate,
    /// Merging into master produces conflicts.
    FailedMerge,
    /// Master is an ancestor of the commit.
    FastForward,
    /// A synthetic merge commit of master and the commit.
    Merged(Sha),
}

/// Build request payload delivered to the coordinator's `addChange`.
///
/// Field names on the wire follow the coordinator's change schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub project: String,
    pub repository: String,
    #[serde(rename = "who")]
    pub author: String,
    #[serde(rename = "files")]
    pub changed_files: BTreeSet<String>,
    #[serde(rename = "comments")]
    pub comment_text: String,
    #[serde(rename = "branch")]
    pub branch_name: String,
    #[serde(rename = "revision")]
    pub target_revision: Sha,
    pub category: Option<String>,
    pub when: Option<i64>,
    pub properties: ChangeProperties,
    #[serde(rename = "revlink")]
    pub revision_link: String,
    #[serde(rename = "src")]
    pub source_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeProperties {
    #[serde(rename = "trac_ticket")]
    pub ticket_id: Option<u64>,
    #[serde(rename = "premerge_revision")]
    pub premerge_revision: Sha,
}

/// Source tag attached to every change.
pub const SOURCE_TAG: &str = "git";
