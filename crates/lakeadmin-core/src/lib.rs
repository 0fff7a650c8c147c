//! # lakeadmin-core
//!
//! Idempotent provisioning of workspace groups, jobs and volumes over the
//! platform's REST API.
//!
//! Every resource kind follows the same workflow:
//!
//! 1. resolve every principal the descriptor depends on (missing ones abort
//!    the run before anything is written),
//! 2. look the resource up by its natural key and update it, or create it,
//! 3. grant whichever desired permissions are not already held.
//!
//! ```ignore
//! use lakeadmin_core::{GroupSpec, PermissionLevel, WorkspaceClient, reconcile_group};
//!
//! let client = WorkspaceClient::new("https://dbc-1234.cloud.databricks.com", token);
//! let mut spec = GroupSpec::new("data-engineers");
//! spec.workspace_access = Some(PermissionLevel::CanUse);
//! let report = reconcile_group(&client, &spec).await?;
//! println!("group id {}", report.reconciled.id);
//! ```

pub mod apply;
pub mod client;
pub mod directory;
mod error;
pub mod group;
pub mod job;
pub mod paging;
pub mod permissions;
pub mod reconcile;
pub mod settings;
pub mod volume;

pub use apply::{ApplyReport, ReportRow, ResourceKind, apply};
pub use client::WorkspaceClient;
pub use directory::{ScimGroup, list_groups};
pub use error::{LookupKind, ProvisionError, ProvisionResult};
pub use group::{GroupReport, GroupSpec, MembershipChange, add_member, reconcile_group};
pub use job::{ClusterSpec, JobLookup, JobReport, JobSpec, reconcile_job};
pub use permissions::{
    AclTarget, PermissionEntry, PermissionLevel, PermissionSet, PermissionTarget, Principal,
    reconcile_permissions,
};
pub use reconcile::{Action, Reconcilable, Reconciled, create_or_update};
pub use settings::{LoadOptions, Settings};
pub use volume::{VolumeGrants, VolumeReport, VolumeSpec, VolumeType, reconcile_volume};
