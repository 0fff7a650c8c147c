use colored::Colorize;
use lakeadmin_core::{Action, ReportRow, ScimGroup};
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// One status line per reconciled resource.
pub fn print_row_status(row: &ReportRow) {
    let mut msg = format!("{} {} ({}) {}", row.kind, row.key, row.id, row.action);
    if row.permissions_changed {
        msg.push_str(", permissions granted");
    }
    match row.action {
        Action::Unchanged if !row.permissions_changed => print_warning(&msg),
        _ => print_success(&msg),
    }
}

pub fn print_report_table(rows: &[ReportRow]) {
    if rows.is_empty() {
        println!("Nothing to reconcile.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Kind", "Name", "ID", "Action", "Permissions", "Notes"]);
    for row in rows {
        let permissions = if row.permissions_changed {
            "granted"
        } else {
            "-"
        };
        builder.push_record([
            row.kind.to_string(),
            row.key.clone(),
            row.id.clone(),
            row.action.to_string(),
            permissions.to_string(),
            row.note.clone(),
        ]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}

pub fn print_groups_table(groups: &[ScimGroup]) {
    if groups.is_empty() {
        println!("No groups found.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["ID", "Name", "Members"]);
    for group in groups {
        builder.push_record([
            group.id.clone(),
            group.display_name.clone(),
            group.members.len().to_string(),
        ]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
    println!("Total: {}", groups.len());
}
