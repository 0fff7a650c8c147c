use anyhow::{Context, Result};
use lakeadmin_core::{ResourceKind, Settings, WorkspaceClient};

use crate::output::{print_report_table, print_row_status};

pub async fn apply(
    client: &WorkspaceClient,
    settings: &Settings,
    only: Option<ResourceKind>,
) -> Result<()> {
    let report = lakeadmin_core::apply(client, settings, only)
        .await
        .context("Apply aborted; resources reconciled before the failure were kept")?;

    let rows = report.rows();
    for row in &rows {
        print_row_status(row);
    }
    println!();
    print_report_table(&rows);
    Ok(())
}
