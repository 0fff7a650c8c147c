//! Workspace groups: creation, entitlements, membership and permissions.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::WorkspaceClient;
use crate::directory::{self, SCIM_GROUPS};
use crate::error::{LookupKind, ProvisionResult};
use crate::permissions::{
    AclTarget, PermissionEntry, PermissionLevel, PermissionSet, Principal, reconcile_permissions,
};
use crate::reconcile::{Action, Reconcilable, Reconciled, create_or_update};

const SCIM_GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
const SCIM_PATCH_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// Desired state of one workspace group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Display name; the natural key.
    pub name: String,
    /// Users, groups or service principals that must be members.
    #[serde(default)]
    pub members: Vec<Principal>,
    /// Entitlements such as `workspace-access`.
    #[serde(default)]
    pub entitlements: Vec<String>,
    /// Grants on the group object itself, e.g. a manager group with `CAN_MANAGE`.
    #[serde(default)]
    pub permissions: Vec<PermissionEntry>,
    /// Level granted to this group on the workspace object, typically `CAN_USE`.
    #[serde(default)]
    pub workspace_access: Option<PermissionLevel>,
}

impl GroupSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            entitlements: Vec::new(),
            permissions: Vec::new(),
            workspace_access: None,
        }
    }

    fn principal(&self) -> Principal {
        Principal::Group(self.name.clone())
    }

    pub fn permission_set(&self) -> PermissionSet {
        self.permissions.iter().cloned().collect()
    }

    fn workspace_permission_set(&self) -> PermissionSet {
        self.workspace_access
            .iter()
            .map(|level| PermissionEntry::new(self.principal(), level.clone()))
            .collect()
    }

    fn entitlement_values(&self) -> Vec<serde_json::Value> {
        self.entitlements
            .iter()
            .map(|e| json!({ "value": e }))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CreatedGroup {
    id: String,
}

#[async_trait]
impl Reconcilable for GroupSpec {
    type Id = String;

    const KIND: LookupKind = LookupKind::Group;

    fn natural_key(&self) -> String {
        self.name.clone()
    }

    async fn find(&self, client: &WorkspaceClient) -> ProvisionResult<Option<String>> {
        directory::find_group(client, &self.name).await
    }

    async fn create(&self, client: &WorkspaceClient) -> ProvisionResult<String> {
        let mut body = json!({
            "schemas": [SCIM_GROUP_SCHEMA],
            "displayName": self.name,
        });
        if !self.entitlements.is_empty() {
            body["entitlements"] = serde_json::Value::Array(self.entitlement_values());
        }
        let created: CreatedGroup = client.send_as(Method::POST, SCIM_GROUPS, &body).await?;
        Ok(created.id)
    }

    async fn update(&self, client: &WorkspaceClient, id: &String) -> ProvisionResult<Action> {
        // The display name is the lookup key, so entitlements are the only
        // mutable part of the descriptor.
        if self.entitlements.is_empty() {
            return Ok(Action::Unchanged);
        }
        let body = json!({
            "schemas": [SCIM_PATCH_SCHEMA],
            "Operations": [
                { "op": "add", "path": "entitlements", "value": self.entitlement_values() }
            ]
        });
        client
            .send(Method::PATCH, &format!("{SCIM_GROUPS}/{id}"), &body)
            .await?;
        Ok(Action::Updated)
    }
}

/// Result of adding one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Added,
    AlreadyMember,
}

/// Adds `member_id` to the group. A 409 means the member is already there
/// and is reported as [`MembershipChange::AlreadyMember`].
pub async fn add_member(
    client: &WorkspaceClient,
    group_id: &str,
    member_id: &str,
) -> ProvisionResult<MembershipChange> {
    let body = json!({
        "schemas": [SCIM_PATCH_SCHEMA],
        "Operations": [
            { "op": "add", "path": "members", "value": [{ "value": member_id }] }
        ]
    });
    let resp = client
        .send_raw(Method::PATCH, &format!("{SCIM_GROUPS}/{group_id}"), &body)
        .await?;
    if resp.status.is_success() {
        tracing::info!(group_id, member_id, "added group member");
        Ok(MembershipChange::Added)
    } else if resp.status == StatusCode::CONFLICT {
        tracing::warn!(group_id, member_id, "member already in group");
        Ok(MembershipChange::AlreadyMember)
    } else {
        Err(resp.into_error())
    }
}

/// Everything `reconcile_group` changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub name: String,
    pub reconciled: Reconciled<String>,
    pub members_added: usize,
    pub members_present: usize,
    pub permissions_changed: bool,
    pub workspace_access_changed: bool,
}

/// Full group workflow.
///
/// Members and every other principal the descriptor references are resolved
/// first, so a missing one aborts before the group is created or touched.
pub async fn reconcile_group(
    client: &WorkspaceClient,
    spec: &GroupSpec,
) -> ProvisionResult<GroupReport> {
    let own = spec.principal();
    let member_ids = directory::require_all(client, &spec.members).await?;
    let desired = spec.permission_set();
    directory::require_all(client, desired.principals().filter(|p| **p != own)).await?;

    let reconciled = create_or_update(client, spec).await?;

    let mut members_added = 0;
    let mut members_present = 0;
    for member_id in &member_ids {
        match add_member(client, &reconciled.id, member_id).await? {
            MembershipChange::Added => members_added += 1,
            MembershipChange::AlreadyMember => members_present += 1,
        }
    }

    let permissions_changed =
        reconcile_permissions(client, &AclTarget::group(reconciled.id.clone()), &desired).await?;
    let workspace_access_changed = reconcile_permissions(
        client,
        &AclTarget::workspace(),
        &spec.workspace_permission_set(),
    )
    .await?;

    Ok(GroupReport {
        name: spec.name.clone(),
        reconciled,
        members_added,
        members_present,
        permissions_changed,
        workspace_access_changed,
    })
}
