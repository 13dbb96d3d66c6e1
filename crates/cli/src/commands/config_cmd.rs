//! `curator config`: Show the effective configuration.

use curator_config::AppConfig;
use std::path::Path;

pub fn run(config: &AppConfig, path: Option<&Path>) {
    let source = match path {
        Some(path) => path.to_path_buf(),
        None => AppConfig::config_dir().join("config.toml"),
    };
    let marker = if source.exists() { "" } else { " (not found, defaults)" };

    println!("# Source: {}{marker}", source.display());
    println!("# Environment overrides applied; secrets redacted.");
    println!();
    print!("{}", config.to_redacted_toml());
}
