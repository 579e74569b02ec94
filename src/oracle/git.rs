//! Merge oracle backed by the `git` command line.
//!
//! Synthetic merges are built with `merge-tree --write-tree` and `commit-tree`, so the
//! repository's refs, index and working tree are never touched.

use crate::config::GitConfig;
use crate::error::OracleError;
use crate::oracle::MergeOracle;
use crate::types::{MergeStatus, Sha};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

const MERGE_AUTHOR_NAME: &str = "buildhook";
const MERGE_AUTHOR_EMAIL: &str = "buildhook@localhost";

/// Git-backed implementation of MergeOracle
#[derive(Debug, Clone)]
pub struct GitMergeOracle {
    repository: PathBuf,
    master_branch: String,
    commit_url_template: String,
}

impl GitMergeOracle {
    pub fn new(config: &GitConfig) -> Self {
        Self {
            repository: config.repository_path.clone(),
            master_branch: config.master_branch.clone(),
            commit_url_template: config.commit_url_template.clone(),
        }
    }

    fn is_ancestor(&self, ancestor: &Sha, descendant: &Sha) -> Result<bool, OracleError> {
        let args = [
            "merge-base",
            "--is-ancestor",
            ancestor.as_str(),
            descendant.as_str(),
        ];
        let output = git_command(&self.repository).args(args).output()?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(command_failed(&args, &output)),
        }
    }

    fn synthesize_merge(&self, master: &Sha, commit: &Sha) -> Result<MergeStatus, OracleError> {
        let args = ["merge-tree", "--write-tree", master.as_str(), commit.as_str()];
        let output = git_command(&self.repository).args(args).output()?;
        match output.status.code() {
            Some(0) => {}
            Some(1) => {
                debug!(commit = %commit, master = %master, "Merge has conflicts");
                return Ok(MergeStatus::FailedMerge);
            }
            _ => return Err(command_failed(&args, &output)),
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let tree = stdout
            .lines()
            .next()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OracleError::UnexpectedOutput("merge-tree printed no tree".into()))?
            .to_string();

        // Pin dates to master's commit time so the same pair always yields the same sha.
        let timestamp = run_git_stdout(
            &self.repository,
            &["show", "-s", "--format=%ct", master.as_str()],
        )?;
        let date = format!("@{} +0000", timestamp);
        let message = format!("Merge {} into {}", commit, self.master_branch);

        let mut cmd = git_command(&self.repository);
        cmd.env("GIT_AUTHOR_NAME", MERGE_AUTHOR_NAME)
            .env("GIT_AUTHOR_EMAIL", MERGE_AUTHOR_EMAIL)
            .env("GIT_COMMITTER_NAME", MERGE_AUTHOR_NAME)
            .env("GIT_COMMITTER_EMAIL", MERGE_AUTHOR_EMAIL)
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_DATE", &date);
        let args = [
            "commit-tree",
            tree.as_str(),
            "-p",
            master.as_str(),
            "-p",
            commit.as_str(),
            "-m",
            message.as_str(),
        ];
        let output = cmd.args(args).output()?;
        if !output.status.success() {
            return Err(command_failed(&args, &output));
        }
        let merged = Sha::new(String::from_utf8_lossy(&output.stdout).into_owned());
        debug!(commit = %commit, merge = %merged, "Synthesized merge commit");
        Ok(MergeStatus::Merged(merged))
    }
}

impl MergeOracle for GitMergeOracle {
    fn lookup(&self, branch: &str) -> Result<Sha, OracleError> {
        validate_branch_name(branch)?;
        let spec = format!("{}^{{commit}}", branch);
        let output = git_command(&self.repository)
            .args(["rev-parse", "--verify", "--quiet", spec.as_str()])
            .output()?;
        if !output.status.success() {
            return Err(OracleError::NotFound(branch.to_string()));
        }
        Ok(Sha::new(String::from_utf8_lossy(&output.stdout).into_owned()))
    }

    fn merge_status(&self, commit: &Sha) -> Result<MergeStatus, OracleError> {
        let master = self.master_head()?;
        if self.is_ancestor(commit, &master)? {
            return Ok(MergeStatus::UpToDate);
        }
        if self.is_ancestor(&master, commit)? {
            return Ok(MergeStatus::FastForward);
        }
        self.synthesize_merge(&master, commit)
    }

    fn changed_files(&self, from: &Sha, to: &Sha) -> Result<BTreeSet<String>, OracleError> {
        let output = run_git_sync(
            &self.repository,
            &["diff", "--no-color", "--no-ext-diff", from.as_str(), to.as_str()],
        )?;
        Ok(parse_diff_paths(&String::from_utf8_lossy(&output.stdout)))
    }

    fn master_head(&self) -> Result<Sha, OracleError> {
        let spec = format!("{}^{{commit}}", self.master_branch);
        run_git_stdout(&self.repository, &["rev-parse", "--verify", spec.as_str()]).map(Sha::new)
    }

    fn commit_url(&self, commit: &Sha) -> String {
        self.commit_url_template.replace("{sha}", commit.as_str())
    }
}

/// Reject names git would misread as options or that cannot be ref names.
fn validate_branch_name(branch: &str) -> Result<(), OracleError> {
    let invalid = branch.is_empty()
        || branch.starts_with('-')
        || branch.chars().any(|c| c.is_whitespace() || c.is_control());
    if invalid {
        return Err(OracleError::Invalid(branch.to_string()));
    }
    Ok(())
}

/// Collect both paths from every `diff --git a/X b/Y` header.
pub fn parse_diff_paths(patch: &str) -> BTreeSet<String> {
    let mut files = BTreeSet::new();
    for line in patch.lines() {
        let Some(rest) = line.strip_prefix("diff --git a/") else {
            continue;
        };
        if let Some((old, new)) = rest.rsplit_once(" b/") {
            files.insert(old.to_string());
            files.insert(new.to_string());
        }
    }
    files
}

/// Create a git Command with clean environment (no system/user config).
fn git_command(workdir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(workdir);
    cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

fn run_git_sync(workdir: &Path, args: &[&str]) -> Result<Output, OracleError> {
    let output = git_command(workdir).args(args).output()?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(command_failed(args, &output))
    }
}

fn run_git_stdout(workdir: &Path, args: &[&str]) -> Result<String, OracleError> {
    let output = run_git_sync(workdir, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn command_failed(args: &[&str], output: &Output) -> OracleError {
    OracleError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}
