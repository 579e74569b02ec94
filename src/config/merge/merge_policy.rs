//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("coordinator.timeout_secs", 30)?
        .set_default("git.repository_path", ".")?
        .set_default("git.master_branch", "master")?
        .set_default("tracker.status_writer", "git")?
        .set_default("storage.cache_path", ".buildhook/cache")
}
