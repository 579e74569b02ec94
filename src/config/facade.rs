//! Config loading facade: one entry point over the layered sources.

use crate::config::merge::builder_with_defaults;
use crate::config::sources::{environment, global_file, workspace_file};
use crate::config::HookConfig;
use config::{ConfigError, File};
use std::path::Path;

/// Loads [`HookConfig`] from defaults, files and environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, global file, workspace files,
    /// environment.
    pub fn load(workspace_root: &Path) -> Result<HookConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }

    /// Load configuration from one explicit file; environment still overrides it.
    pub fn load_from_file(path: &Path) -> Result<HookConfig, ConfigError> {
        let builder = builder_with_defaults()?.add_source(File::from(path).required(true));
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }

    /// Built-in defaults only.
    pub fn default() -> HookConfig {
        HookConfig::default()
    }
}
