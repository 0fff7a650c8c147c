use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use lakeadmin_core::ResourceKind;

#[derive(Parser)]
#[command(name = "lakeadmin")]
#[command(about = "lakeadmin: provision workspace groups, jobs and volumes from a desired-state file")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Desired-state TOML file (defaults to ./lakeadmin.toml, then ~/.lakeadmin/config.toml)
    #[arg(short, long, global = true, env = "LAKEADMIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Workspace URL (overrides the config file)
    #[arg(long, global = true, env = "LAKEADMIN_HOST")]
    pub host: Option<String>,

    /// Personal access token (overrides the config file)
    #[arg(long, global = true, env = "LAKEADMIN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Log level or filter directive; RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile every group, job and volume in the desired-state file
    Apply(ApplyArgs),
    /// Inspect workspace groups
    Groups(GroupsArgs),
    /// Load and validate the configuration without calling the workspace
    Validate,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Group,
    Job,
    Volume,
}

impl From<KindArg> for ResourceKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Group => ResourceKind::Group,
            KindArg::Job => ResourceKind::Job,
            KindArg::Volume => ResourceKind::Volume,
        }
    }
}

#[derive(clap::Args)]
pub struct ApplyArgs {
    /// Only reconcile one kind of resource
    #[arg(long)]
    pub only: Option<KindArg>,
}

#[derive(clap::Args)]
pub struct GroupsArgs {
    #[command(subcommand)]
    pub command: GroupsCommands,
}

#[derive(Subcommand)]
pub enum GroupsCommands {
    /// List every group in the workspace
    List,
}
