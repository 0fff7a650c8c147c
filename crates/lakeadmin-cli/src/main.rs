mod cli;
mod commands;
mod config;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, GroupsCommands};
use lakeadmin_core::WorkspaceClient;
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::load_settings(&cli)?;
    observability::init_tracing_with_level(&settings.logging.level);
    tracing::debug!(host = %settings.workspace.host, "settings loaded");

    match &cli.command {
        Commands::Apply(args) => {
            let client = WorkspaceClient::from_settings(&settings);
            commands::apply::apply(&client, &settings, args.only.map(Into::into)).await?;
        }
        Commands::Groups(args) => match args.command {
            GroupsCommands::List => {
                let client = WorkspaceClient::from_settings(&settings);
                commands::groups::list(&client).await?;
            }
        },
        Commands::Validate => {
            commands::validate::validate(&settings)?;
        }
    }

    Ok(())
}
