//! Configuration System
//!
//! Layered configuration for the build hook: built-in defaults, the user-level config
//! file, the workspace config files, then `BUILDHOOK__*` environment variables.
//! Validation runs once at startup; a hook without a coordinator host refuses to start.

use crate::error::HookError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Port the coordinator listens on when none is configured.
pub const DEFAULT_COORDINATOR_PORT: u16 = 9989;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookConfig {
    /// Build coordinator connection
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Repository the merge oracle works in
    #[serde(default)]
    pub git: GitConfig,

    /// Ticket tracker integration
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Storage paths
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Coordinator connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Host name, optionally with an embedded `:port`
    #[serde(default)]
    pub host: String,

    /// Explicit port; wins over a port embedded in `host`
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Repository label attached to every change
    #[serde(default)]
    pub repository: String,

    /// Deadline for connect, login and `addChange` together
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: None,
            username: String::new(),
            password: String::new(),
            repository: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for CoordinatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("repository", &self.repository)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl CoordinatorConfig {
    /// Resolve the host and port to connect to.
    pub fn endpoint(&self) -> Result<(String, u16), String> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err("Coordinator host must be set".to_string());
        }

        let (name, embedded_port) = match host.split_once(':') {
            Some((name, port)) => {
                let port_str = port.split(':').next().unwrap_or(port);
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| format!("Invalid port in coordinator host '{}'", host))?;
                (name, Some(port))
            }
            None => (host, None),
        };
        if name.is_empty() {
            return Err(format!("Coordinator host '{}' has no host name", host));
        }

        let port = self
            .port
            .or(embedded_port)
            .unwrap_or(DEFAULT_COORDINATOR_PORT);
        Ok((name.to_string(), port))
    }

    /// Host name without any port, as used in build page links.
    pub fn web_host(&self) -> &str {
        let host = self.host.trim();
        host.split_once(':').map(|(name, _)| name).unwrap_or(host)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.endpoint()?;
        if self.timeout_secs == 0 {
            return Err("Coordinator timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Repository settings for the git merge oracle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_repository_path")]
    pub repository_path: PathBuf,

    #[serde(default = "default_master_branch")]
    pub master_branch: String,

    /// Web link template; `{sha}` is replaced with the commit id
    #[serde(default = "default_commit_url_template")]
    pub commit_url_template: String,
}

fn default_repository_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_master_branch() -> String {
    "master".to_string()
}

fn default_commit_url_template() -> String {
    "{sha}".to_string()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            repository_path: default_repository_path(),
            master_branch: default_master_branch(),
            commit_url_template: default_commit_url_template(),
        }
    }
}

impl GitConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.master_branch.trim().is_empty() {
            return Err("Master branch cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Ticket tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Ticket links in change comments are `{ticket_url_base}/{id}`
    #[serde(default = "default_ticket_url_base")]
    pub ticket_url_base: String,

    /// The only identity allowed to record build status
    #[serde(default = "default_status_writer")]
    pub status_writer: String,
}

fn default_ticket_url_base() -> String {
    "http://trac.sagemath.org".to_string()
}

fn default_status_writer() -> String {
    "git".to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            ticket_url_base: default_ticket_url_base(),
            status_writer: default_status_writer(),
        }
    }
}

/// Storage paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled directory holding the build table; relative paths are workspace-relative
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".buildhook/cache")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
        }
    }
}

impl StorageConfig {
    pub fn resolve_cache_path(&self, workspace_root: &Path) -> PathBuf {
        if self.cache_path.is_absolute() {
            self.cache_path.clone()
        } else {
            workspace_root.join(&self.cache_path)
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Coordinator(String),
    Git(String),
    Tracker(String),
    Storage(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Coordinator(msg) => write!(f, "Coordinator: {}", msg),
            ValidationError::Git(msg) => write!(f, "Git: {}", msg),
            ValidationError::Tracker(msg) => write!(f, "Tracker: {}", msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl HookConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.coordinator.validate() {
            errors.push(ValidationError::Coordinator(e));
        }
        if let Err(e) = self.git.validate() {
            errors.push(ValidationError::Git(e));
        }
        if self.tracker.status_writer.trim().is_empty() {
            errors.push(ValidationError::Tracker(
                "status_writer cannot be empty".to_string(),
            ));
        }
        if self.storage.cache_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Cache path cannot be empty".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold every problem into one startup error.
    pub fn validated(self) -> Result<Self, HookError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            HookError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}
