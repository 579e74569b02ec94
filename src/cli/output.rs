//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::HookError;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &HookError) -> String {
    match e {
        HookError::ConfigError(_) => {
            format!("{} (see config/buildhook.toml or BUILDHOOK__* variables)", e)
        }
        _ => e.to_string(),
    }
}
