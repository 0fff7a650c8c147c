use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lakeadmin_core::{LoadOptions, Settings};

use crate::cli::Cli;

const LOCAL_FILE: &str = "lakeadmin.toml";

fn home_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lakeadmin").join("config.toml"))
}

/// Picks the desired-state file: explicit flag, then the working directory,
/// then the home directory. `None` means settings come from env and flags only.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. --config flag / LAKEADMIN_CONFIG env
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    // 2. ./lakeadmin.toml
    let local = PathBuf::from(LOCAL_FILE);
    if local.exists() {
        return Some(local);
    }
    // 3. ~/.lakeadmin/config.toml
    home_config_path().filter(|p| p.exists())
}

pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = resolve_config_path(cli.config.as_deref());
    let options = LoadOptions {
        path: path.clone(),
        host: cli.host.clone(),
        token: cli.token.clone(),
        log_level: cli.log_level.clone(),
    };
    Settings::load(&options).with_context(|| match path {
        Some(p) => format!("Failed to load settings from {}", p.display()),
        None => "Failed to load settings (no config file found; use --config, --host and --token)"
            .to_string(),
    })
}
