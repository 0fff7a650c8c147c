use anyhow::{Context, Result};
use lakeadmin_core::{WorkspaceClient, list_groups};

use crate::output::print_groups_table;

pub async fn list(client: &WorkspaceClient) -> Result<()> {
    let groups = list_groups(client)
        .await
        .context("Failed to list workspace groups")?;
    print_groups_table(&groups);
    Ok(())
}
