//! CLI route: single route table and run context. Dispatches to the resolver and presentation.

use crate::cli::parse::Commands;
use crate::cli::presentation::{format_record_json, format_record_text, format_resolution};
use crate::config::{ConfigLoader, GitConfig, HookConfig};
use crate::error::{HookError, StorageError};
use crate::identity::CallerIdentity;
use crate::notify::NotificationBridge;
use crate::oracle::GitMergeOracle;
use crate::resolver::{BuildStatusResolver, ResolverSettings};
use crate::store::SledBuildStore;
use crate::types::Sha;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Runtime context for CLI execution: config, cache and the resolver built on them.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    resolver: Arc<BuildStatusResolver>,
    store: Arc<SledBuildStore>,
    coordinator_web_host: String,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, HookError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::from_config(workspace_root, config)
    }

    /// Create run context from an already loaded configuration.
    pub fn from_config(workspace_root: PathBuf, config: HookConfig) -> Result<Self, HookError> {
        let config = config.validated()?;

        let cache_path = config.storage.resolve_cache_path(&workspace_root);
        std::fs::create_dir_all(&cache_path).map_err(StorageError::IoError)?;
        let store = Arc::new(SledBuildStore::new(&cache_path)?);

        let git = GitConfig {
            repository_path: workspace_root.join(&config.git.repository_path),
            ..config.git.clone()
        };
        let oracle = Arc::new(GitMergeOracle::new(&git));
        let bridge = Arc::new(NotificationBridge::new(&config.coordinator)?);

        let resolver = Arc::new(BuildStatusResolver::new(
            oracle,
            store.clone(),
            bridge,
            ResolverSettings::from_config(&config),
        ));

        Ok(Self {
            resolver,
            store,
            coordinator_web_host: config.coordinator.web_host().to_string(),
        })
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, HookError> {
        let started = Instant::now();
        let result = self.execute_inner(command);
        self.store.flush()?;
        info!(
            command = command.name(),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, HookError> {
        match command {
            Commands::Resolve {
                branch,
                author,
                ticket,
                format,
            } => {
                let record = self.resolver.resolve(branch, author, *ticket)?;
                Ok(format_resolution(
                    record.as_ref(),
                    format,
                    &self.coordinator_web_host,
                ))
            }
            Commands::SetStatus {
                sha,
                builder,
                number,
                status,
                as_identity,
            } => {
                let caller = CallerIdentity::new(as_identity.as_str());
                let record =
                    self.resolver
                        .set_status(&caller, &Sha::new(sha.as_str()), builder, *number, *status)?;
                Ok(format_record_text(&record, &self.coordinator_web_host))
            }
            Commands::Show { sha, format } => self.handle_show(sha.as_deref(), format),
            Commands::Purge => {
                self.resolver.purge()?;
                Ok("Build cache purged".to_string())
            }
        }
    }

    fn handle_show(&self, sha: Option<&str>, format: &str) -> Result<String, HookError> {
        if let Some(sha) = sha {
            let record = self.resolver.cached(&Sha::new(sha))?;
            return Ok(format_resolution(
                record.as_ref(),
                format,
                &self.coordinator_web_host,
            ));
        }

        let records = self.store.records()?;
        if format == "json" {
            let lines: Vec<String> = records
                .iter()
                .map(|r| format_record_json(r, &self.coordinator_web_host))
                .collect();
            return Ok(format!("[{}]", lines.join(",")));
        }
        if records.is_empty() {
            return Ok("No cached builds".to_string());
        }
        Ok(records
            .iter()
            .map(|r| format_record_text(r, &self.coordinator_web_host))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
