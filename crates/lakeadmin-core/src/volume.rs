//! Storage volumes and their grants.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::WorkspaceClient;
use crate::directory;
use crate::error::{LookupKind, ProvisionResult};
use crate::permissions::{
    HeldPermissions, PermissionEntry, PermissionLevel, PermissionSet, PermissionTarget,
    reconcile_permissions,
};
use crate::reconcile::{Action, Reconcilable, Reconciled, create_or_update};

const VOLUMES: &str = "2.0/volumes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeType {
    Managed,
    External,
}

/// Desired state of one volume, keyed by `catalog.schema.name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub catalog_name: String,
    pub schema_name: String,
    pub name: String,
    pub volume_type: VolumeType,
    /// Required for external volumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub grants: Vec<PermissionEntry>,
}

/// Body of the create and update calls.
#[derive(Debug, Serialize)]
struct VolumePayload<'a> {
    name: &'a str,
    catalog_name: &'a str,
    schema_name: &'a str,
    volume_type: VolumeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

impl VolumeSpec {
    pub fn full_name(&self) -> String {
        format!("{}.{}.{}", self.catalog_name, self.schema_name, self.name)
    }

    pub fn grant_set(&self) -> PermissionSet {
        self.grants.iter().cloned().collect()
    }

    fn payload(&self) -> VolumePayload<'_> {
        VolumePayload {
            name: &self.name,
            catalog_name: &self.catalog_name,
            schema_name: &self.schema_name,
            volume_type: self.volume_type,
            storage_location: self.storage_location.as_deref(),
            comment: self.comment.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VolumeList {
    #[serde(default)]
    volumes: Vec<VolumeInfo>,
}

#[derive(Debug, Deserialize)]
struct VolumeInfo {
    #[serde(default)]
    name: String,
    volume_id: String,
}

#[async_trait]
impl Reconcilable for VolumeSpec {
    type Id = String;

    const KIND: LookupKind = LookupKind::Volume;

    fn natural_key(&self) -> String {
        self.full_name()
    }

    async fn find(&self, client: &WorkspaceClient) -> ProvisionResult<Option<String>> {
        let list: VolumeList = client
            .get(
                VOLUMES,
                &[
                    ("catalog_name", self.catalog_name.clone()),
                    ("schema_name", self.schema_name.clone()),
                ],
            )
            .await?;
        Ok(list
            .volumes
            .into_iter()
            .find(|v| v.name == self.name)
            .map(|v| v.volume_id))
    }

    async fn create(&self, client: &WorkspaceClient) -> ProvisionResult<String> {
        let created: VolumeInfo = client
            .send_as(Method::POST, VOLUMES, &self.payload())
            .await?;
        Ok(created.volume_id)
    }

    async fn update(&self, client: &WorkspaceClient, id: &String) -> ProvisionResult<Action> {
        client
            .send(Method::PATCH, &format!("{VOLUMES}/{id}"), &self.payload())
            .await?;
        Ok(Action::Updated)
    }
}

/// Grants on a volume, read and extended through `volumes/{id}/permissions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeGrants {
    volume_id: String,
}

impl VolumeGrants {
    pub fn new(volume_id: impl Into<String>) -> Self {
        Self {
            volume_id: volume_id.into(),
        }
    }

    fn path(&self) -> String {
        format!("{VOLUMES}/{}/permissions", self.volume_id)
    }
}

impl fmt::Display for VolumeGrants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "volumes/{}", self.volume_id)
    }
}

#[derive(Debug, Deserialize)]
struct GrantListing {
    #[serde(default)]
    access_control_list: BTreeMap<String, PrincipalGrants>,
}

#[derive(Debug, Deserialize)]
struct PrincipalGrants {
    #[serde(default)]
    permissions: Vec<PermissionLevel>,
}

#[derive(Debug, Serialize)]
struct GrantChange<'a> {
    principal: &'a str,
    add: Vec<&'a PermissionLevel>,
}

#[derive(Debug, Serialize)]
struct GrantPatch<'a> {
    changes: Vec<GrantChange<'a>>,
}

impl<'a> GrantPatch<'a> {
    /// One change per principal, listing only the levels still missing.
    fn from_missing(missing: &'a PermissionSet) -> Self {
        let changes = missing
            .by_principal()
            .into_iter()
            .map(|(principal, levels)| GrantChange {
                principal: principal.name(),
                add: levels,
            })
            .collect();
        Self { changes }
    }
}

#[async_trait]
impl PermissionTarget for VolumeGrants {
    fn describe(&self) -> String {
        self.to_string()
    }

    async fn held(&self, client: &WorkspaceClient) -> ProvisionResult<HeldPermissions> {
        let listing: GrantListing = client.get(&self.path(), &[]).await?;
        let mut held = HeldPermissions::new();
        for (principal, grants) in listing.access_control_list {
            for level in grants.permissions {
                held.grant_by_name(principal.clone(), level);
            }
        }
        Ok(held)
    }

    async fn grant(
        &self,
        client: &WorkspaceClient,
        missing: &PermissionSet,
    ) -> ProvisionResult<()> {
        let body = GrantPatch::from_missing(missing);
        client.send(Method::PATCH, &self.path(), &body).await?;
        Ok(())
    }
}

/// Everything `reconcile_volume` changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeReport {
    pub full_name: String,
    pub reconciled: Reconciled<String>,
    pub grants_changed: bool,
}

/// Full volume workflow: resolve grant principals, create or update the
/// volume, then grant whatever levels are still missing.
pub async fn reconcile_volume(
    client: &WorkspaceClient,
    spec: &VolumeSpec,
) -> ProvisionResult<VolumeReport> {
    let desired = spec.grant_set();
    directory::require_all(client, desired.principals()).await?;

    let reconciled = create_or_update(client, spec).await?;
    let grants_changed =
        reconcile_permissions(client, &VolumeGrants::new(reconciled.id.clone()), &desired).await?;

    Ok(VolumeReport {
        full_name: spec.full_name(),
        reconciled,
        grants_changed,
    })
}
