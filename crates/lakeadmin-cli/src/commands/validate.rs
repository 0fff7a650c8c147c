use anyhow::{Context, Result};
use colored::Colorize;
use lakeadmin_core::Settings;

use crate::output::print_success;

const REDACTED: &str = "********";

/// Serializes the effective settings with the token masked.
pub fn redacted_toml(settings: &Settings) -> Result<String> {
    let mut shown = settings.clone();
    if !shown.workspace.token.is_empty() {
        shown.workspace.token = REDACTED.to_string();
    }
    toml::to_string_pretty(&shown).context("Failed to render settings as TOML")
}

pub fn validate(settings: &Settings) -> Result<()> {
    print_success("Configuration is valid");
    println!("{}: {}", "Workspace".cyan(), settings.workspace.host);
    println!("{}: {}", "Groups".cyan(), settings.groups.len());
    println!("{}: {}", "Jobs".cyan(), settings.jobs.len());
    println!("{}: {}", "Volumes".cyan(), settings.volumes.len());
    println!();
    println!("{}", redacted_toml(settings)?);
    Ok(())
}
