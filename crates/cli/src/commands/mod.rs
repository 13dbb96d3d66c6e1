pub mod ask;
pub mod config_cmd;
pub mod index;
pub mod serve;
pub mod tools;

use anyhow::Context;
use curator_config::AppConfig;
use std::path::Path;

/// Load from `path` when given, else from the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => AppConfig::load().context("Failed to load config"),
    }
}
