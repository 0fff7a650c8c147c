//! Runs every reconciler declared in [`Settings`], in a fixed order.

use std::fmt;

use crate::client::WorkspaceClient;
use crate::error::ProvisionResult;
use crate::group::{GroupReport, reconcile_group};
use crate::job::{JobReport, reconcile_job};
use crate::reconcile::Action;
use crate::settings::Settings;
use crate::volume::{VolumeReport, reconcile_volume};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Group,
    Job,
    Volume,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => write!(f, "group"),
            Self::Job => write!(f, "job"),
            Self::Volume => write!(f, "volume"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub groups: Vec<GroupReport>,
    pub jobs: Vec<JobReport>,
    pub volumes: Vec<VolumeReport>,
}

/// Flattened view of one reconciled resource, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub kind: ResourceKind,
    pub key: String,
    pub id: String,
    pub action: Action,
    pub permissions_changed: bool,
    pub note: String,
}

impl ApplyReport {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.jobs.is_empty() && self.volumes.is_empty()
    }

    pub fn rows(&self) -> Vec<ReportRow> {
        let groups = self.groups.iter().map(|g| ReportRow {
            kind: ResourceKind::Group,
            key: g.name.clone(),
            id: g.reconciled.id.clone(),
            action: g.reconciled.action,
            permissions_changed: g.permissions_changed || g.workspace_access_changed,
            note: format!(
                "{} member(s) added, {} already present",
                g.members_added, g.members_present
            ),
        });
        let jobs = self.jobs.iter().map(|j| ReportRow {
            kind: ResourceKind::Job,
            key: j.name.clone(),
            id: j.reconciled.id.to_string(),
            action: j.reconciled.action,
            permissions_changed: j.permissions_changed,
            note: String::new(),
        });
        let volumes = self.volumes.iter().map(|v| ReportRow {
            kind: ResourceKind::Volume,
            key: v.full_name.clone(),
            id: v.reconciled.id.clone(),
            action: v.reconciled.action,
            permissions_changed: v.grants_changed,
            note: String::new(),
        });
        groups.chain(jobs).chain(volumes).collect()
    }
}

/// Reconciles groups, then jobs, then volumes.
///
/// Groups go first because jobs and volumes may grant permissions to them.
/// The first error aborts the run; anything already created stays in place.
pub async fn apply(
    client: &WorkspaceClient,
    settings: &Settings,
    only: Option<ResourceKind>,
) -> ProvisionResult<ApplyReport> {
    let wanted = |kind: ResourceKind| only.is_none_or(|k| k == kind);
    let mut report = ApplyReport::default();

    if wanted(ResourceKind::Group) {
        for spec in &settings.groups {
            tracing::info!(group = %spec.name, "reconciling group");
            report.groups.push(reconcile_group(client, spec).await?);
        }
    }
    if wanted(ResourceKind::Job) {
        for spec in &settings.jobs {
            tracing::info!(job = %spec.name, "reconciling job");
            report.jobs.push(reconcile_job(client, spec).await?);
        }
    }
    if wanted(ResourceKind::Volume) {
        for spec in &settings.volumes {
            tracing::info!(volume = %spec.full_name(), "reconciling volume");
            report.volumes.push(reconcile_volume(client, spec).await?);
        }
    }

    Ok(report)
}
