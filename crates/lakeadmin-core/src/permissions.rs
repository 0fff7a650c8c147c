//! Permission entries and the generic "grant what is missing" reconciliation.
//!
//! Both permission APIs the workspace exposes (object ACLs and volume grants)
//! are handled through [`PermissionTarget`]. The diff itself is shared: the
//! desired entries are compared against what each principal currently holds,
//! and only the missing `(principal, level)` pairs are sent in one patch.
//! Nothing is ever revoked.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::WorkspaceClient;
use crate::error::ProvisionResult;

/// Something that can hold a permission.
///
/// In configuration files this is written as `{ user = "a@b.com" }`,
/// `{ group = "data-engineers" }` or `{ service_principal = "etl-bot" }`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    User(String),
    Group(String),
    ServicePrincipal(String),
}

impl Principal {
    /// Name the permission APIs use to key this principal.
    pub fn name(&self) -> &str {
        match self {
            Self::User(name) | Self::Group(name) | Self::ServicePrincipal(name) => name,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(name) => write!(f, "user:{name}"),
            Self::Group(name) => write!(f, "group:{name}"),
            Self::ServicePrincipal(name) => write!(f, "service-principal:{name}"),
        }
    }
}

/// Platform-defined access tier.
///
/// Known levels get their own variant; anything else the platform returns or
/// the configuration names is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PermissionLevel {
    CanManage,
    CanManageRun,
    CanView,
    CanUse,
    CanRestart,
    CanAttachTo,
    IsOwner,
    Read,
    Write,
    Other(String),
}

impl PermissionLevel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CanManage => "CAN_MANAGE",
            Self::CanManageRun => "CAN_MANAGE_RUN",
            Self::CanView => "CAN_VIEW",
            Self::CanUse => "CAN_USE",
            Self::CanRestart => "CAN_RESTART",
            Self::CanAttachTo => "CAN_ATTACH_TO",
            Self::IsOwner => "IS_OWNER",
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for PermissionLevel {
    fn from(value: String) -> Self {
        let upper = value.to_ascii_uppercase();
        match upper.as_str() {
            "CAN_MANAGE" => Self::CanManage,
            "CAN_MANAGE_RUN" => Self::CanManageRun,
            "CAN_VIEW" => Self::CanView,
            "CAN_USE" => Self::CanUse,
            "CAN_RESTART" => Self::CanRestart,
            "CAN_ATTACH_TO" => Self::CanAttachTo,
            "IS_OWNER" => Self::IsOwner,
            "READ" => Self::Read,
            "WRITE" => Self::Write,
            _ => Self::Other(upper),
        }
    }
}

impl From<&str> for PermissionLevel {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<PermissionLevel> for String {
    fn from(value: PermissionLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(principal, level)` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub principal: Principal,
    pub level: PermissionLevel,
}

impl PermissionEntry {
    pub fn new(principal: Principal, level: impl Into<PermissionLevel>) -> Self {
        Self {
            principal,
            level: level.into(),
        }
    }
}

/// Unordered set of desired entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<PermissionEntry>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: PermissionEntry) -> bool {
        self.0.insert(entry)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionEntry> {
        self.0.iter()
    }

    pub fn principals(&self) -> impl Iterator<Item = &Principal> {
        self.by_principal().into_keys()
    }

    /// Entries of `self` not already held according to `held`.
    ///
    /// Builds a fresh set; neither input is modified.
    pub fn missing_from(&self, held: &HeldPermissions) -> PermissionSet {
        self.0
            .iter()
            .filter(|entry| !held.holds(&entry.principal, &entry.level))
            .cloned()
            .collect()
    }

    /// Levels grouped per principal, in a stable order.
    pub fn by_principal(&self) -> BTreeMap<&Principal, Vec<&PermissionLevel>> {
        let mut grouped: BTreeMap<&Principal, Vec<&PermissionLevel>> = BTreeMap::new();
        for entry in &self.0 {
            grouped.entry(&entry.principal).or_default().push(&entry.level);
        }
        grouped
    }
}

impl FromIterator<PermissionEntry> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionEntry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a PermissionEntry;
    type IntoIter = std::collections::btree_set::Iter<'a, PermissionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Who a held level belongs to.
///
/// The permissions API reports the principal kind; volume grant listings
/// only report a name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Holder {
    Principal(Principal),
    Name(String),
}

/// Levels currently held on one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeldPermissions(BTreeMap<Holder, BTreeSet<PermissionLevel>>);

impl HeldPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a level held by a principal of known kind.
    pub fn grant(&mut self, principal: Principal, level: impl Into<PermissionLevel>) {
        self.insert(Holder::Principal(principal), level.into());
    }

    /// Records a level held by a name whose principal kind is not reported.
    pub fn grant_by_name(&mut self, name: impl Into<String>, level: impl Into<PermissionLevel>) {
        self.insert(Holder::Name(name.into()), level.into());
    }

    fn insert(&mut self, holder: Holder, level: PermissionLevel) {
        self.0.entry(holder).or_default().insert(level);
    }

    /// A kinded grant only matches the same kind; a name-only grant matches
    /// any principal with that name.
    pub fn holds(&self, principal: &Principal, level: &PermissionLevel) -> bool {
        let held_by = |holder: &Holder| {
            self.0
                .get(holder)
                .is_some_and(|levels| levels.contains(level))
        };
        held_by(&Holder::Principal(principal.clone()))
            || held_by(&Holder::Name(principal.name().to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A remote object whose permissions can be read and extended.
#[async_trait]
pub trait PermissionTarget: Send + Sync {
    /// Human-readable name for logs, e.g. `jobs/123`.
    fn describe(&self) -> String;

    async fn held(&self, client: &WorkspaceClient) -> ProvisionResult<HeldPermissions>;

    /// Grants exactly `missing` in a single request.
    async fn grant(&self, client: &WorkspaceClient, missing: &PermissionSet)
    -> ProvisionResult<()>;
}

/// Makes sure every entry of `desired` is held on `target`.
///
/// Returns `true` if a grant was issued. An empty desired set short-circuits
/// without touching the network.
pub async fn reconcile_permissions<T: PermissionTarget + ?Sized>(
    client: &WorkspaceClient,
    target: &T,
    desired: &PermissionSet,
) -> ProvisionResult<bool> {
    if desired.is_empty() {
        return Ok(false);
    }

    let held = target.held(client).await?;
    let missing = desired.missing_from(&held);
    if missing.is_empty() {
        tracing::info!(object = %target.describe(), "permissions already in place");
        return Ok(false);
    }

    target.grant(client, &missing).await?;
    tracing::info!(
        object = %target.describe(),
        granted = missing.len(),
        "granted missing permissions"
    );
    Ok(true)
}

/// Objects governed by the workspace permissions API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclObject {
    Job(i64),
    Group(String),
    Workspace,
}

impl AclObject {
    fn path(&self) -> String {
        match self {
            Self::Job(id) => format!("2.0/permissions/jobs/{id}"),
            Self::Group(id) => format!("2.0/permissions/groups/{id}"),
            Self::Workspace => "2.0/permissions/workspace".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AccessControlList {
    #[serde(default)]
    access_control_list: Vec<AccessControlResponse>,
}

#[derive(Debug, Deserialize)]
struct AccessControlResponse {
    user_name: Option<String>,
    group_name: Option<String>,
    service_principal_name: Option<String>,
    #[serde(default)]
    all_permissions: Vec<HeldLevel>,
}

impl AccessControlResponse {
    fn principal(&self) -> Option<Principal> {
        if let Some(name) = &self.user_name {
            Some(Principal::User(name.clone()))
        } else if let Some(name) = &self.group_name {
            Some(Principal::Group(name.clone()))
        } else {
            self.service_principal_name
                .clone()
                .map(Principal::ServicePrincipal)
        }
    }
}

#[derive(Debug, Deserialize)]
struct HeldLevel {
    permission_level: PermissionLevel,
    #[serde(default)]
    inherited: bool,
}

#[derive(Debug, Serialize)]
struct AccessControlRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_principal_name: Option<&'a str>,
    permission_level: &'a PermissionLevel,
}

impl<'a> AccessControlRequest<'a> {
    fn new(entry: &'a PermissionEntry) -> Self {
        let mut req = Self {
            user_name: None,
            group_name: None,
            service_principal_name: None,
            permission_level: &entry.level,
        };
        match &entry.principal {
            Principal::User(name) => req.user_name = Some(name),
            Principal::Group(name) => req.group_name = Some(name),
            Principal::ServicePrincipal(name) => req.service_principal_name = Some(name),
        }
        req
    }
}

#[derive(Debug, Serialize)]
struct AccessControlPatch<'a> {
    access_control_list: Vec<AccessControlRequest<'a>>,
}

/// Permissions API target (`/permissions/{object_type}/{id}`).
///
/// Only direct grants count as held: a level inherited from a parent object
/// is granted explicitly so it survives changes to the parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclTarget {
    object: AclObject,
}

impl AclTarget {
    pub fn new(object: AclObject) -> Self {
        Self { object }
    }

    pub fn job(job_id: i64) -> Self {
        Self::new(AclObject::Job(job_id))
    }

    pub fn group(group_id: impl Into<String>) -> Self {
        Self::new(AclObject::Group(group_id.into()))
    }

    pub fn workspace() -> Self {
        Self::new(AclObject::Workspace)
    }
}

#[async_trait]
impl PermissionTarget for AclTarget {
    fn describe(&self) -> String {
        self.object.path().trim_start_matches("2.0/permissions/").to_string()
    }

    async fn held(&self, client: &WorkspaceClient) -> ProvisionResult<HeldPermissions> {
        let acl: AccessControlList = client.get(&self.object.path(), &[]).await?;
        let mut held = HeldPermissions::new();
        for entry in acl.access_control_list {
            let Some(principal) = entry.principal() else {
                continue;
            };
            for level in entry.all_permissions.into_iter().filter(|l| !l.inherited) {
                held.grant(principal.clone(), level.permission_level);
            }
        }
        Ok(held)
    }

    async fn grant(
        &self,
        client: &WorkspaceClient,
        missing: &PermissionSet,
    ) -> ProvisionResult<()> {
        let body = AccessControlPatch {
            access_control_list: missing.iter().map(AccessControlRequest::new).collect(),
        };
        client.send(Method::PATCH, &self.object.path(), &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str) -> Principal {
        Principal::Group(name.to_string())
    }

    #[test]
    fn test_level_parsing_is_case_insensitive_and_open() {
        assert_eq!(PermissionLevel::from("can_manage"), PermissionLevel::CanManage);
        assert_eq!(PermissionLevel::from("IS_OWNER"), PermissionLevel::IsOwner);
        let other = PermissionLevel::from("READ_VOLUME");
        assert_eq!(other, PermissionLevel::Other("READ_VOLUME".into()));
        assert_eq!(other.to_string(), "READ_VOLUME");
    }

    #[test]
    fn test_missing_from_only_returns_unheld_levels() {
        let desired: PermissionSet = [
            PermissionEntry::new(Principal::User("xyz".into()), "READ"),
            PermissionEntry::new(Principal::User("xyz".into()), "WRITE"),
            PermissionEntry::new(group("group A"), "READ"),
        ]
        .into_iter()
        .collect();

        let mut held = HeldPermissions::new();
        held.grant_by_name("xyz", "READ");
        held.grant_by_name("group A", "READ");

        let missing = desired.missing_from(&held);
        assert_eq!(missing.len(), 1);
        let entry = missing.iter().next().unwrap();
        assert_eq!(entry.principal.name(), "xyz");
        assert_eq!(entry.level, PermissionLevel::Write);
        // desired is untouched
        assert_eq!(desired.len(), 3);
    }

    #[test]
    fn test_missing_from_everything_held() {
        let desired: PermissionSet = [PermissionEntry::new(group("admins"), "CAN_MANAGE")]
            .into_iter()
            .collect();
        let mut held = HeldPermissions::new();
        held.grant(group("admins"), PermissionLevel::CanManage);
        held.grant(group("admins"), PermissionLevel::CanView);
        assert!(desired.missing_from(&held).is_empty());
    }

    #[test]
    fn test_same_name_of_another_kind_is_not_held() {
        let desired: PermissionSet = [PermissionEntry::new(group("ops"), "CAN_MANAGE")]
            .into_iter()
            .collect();
        let mut held = HeldPermissions::new();
        held.grant(Principal::User("ops".into()), "CAN_MANAGE");
        held.grant(Principal::ServicePrincipal("ops".into()), "CAN_MANAGE");

        let missing = desired.missing_from(&held);
        assert_eq!(missing, desired);
    }

    #[test]
    fn test_name_only_grant_matches_any_kind() {
        let mut held = HeldPermissions::new();
        held.grant_by_name("ops", "READ");
        assert!(held.holds(&group("ops"), &PermissionLevel::Read));
        assert!(held.holds(&Principal::User("ops".into()), &PermissionLevel::Read));
        assert!(!held.holds(&group("ops"), &PermissionLevel::Write));
    }

    #[test]
    fn test_unknown_level_is_normalized_to_upper_case() {
        let desired: PermissionSet =
            [PermissionEntry::new(Principal::User("a@b.com".into()), "read_volume")]
                .into_iter()
                .collect();
        let mut held = HeldPermissions::new();
        held.grant_by_name("a@b.com", "READ_VOLUME");

        assert!(desired.missing_from(&held).is_empty());
        let entry = desired.iter().next().unwrap();
        assert_eq!(entry.level.as_str(), "READ_VOLUME");
    }

    #[test]
    fn test_by_principal_groups_levels() {
        let desired: PermissionSet = [
            PermissionEntry::new(Principal::User("xyz".into()), "WRITE"),
            PermissionEntry::new(Principal::User("xyz".into()), "READ"),
            PermissionEntry::new(group("group A"), "READ"),
        ]
        .into_iter()
        .collect();
        let grouped = desired.by_principal();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&Principal::User("xyz".into())].len(), 2);
    }

    #[test]
    fn test_acl_request_uses_principal_specific_field() {
        let entry = PermissionEntry::new(Principal::ServicePrincipal("etl-bot".into()), "IS_OWNER");
        let json = serde_json::to_value(AccessControlRequest::new(&entry)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "service_principal_name": "etl-bot",
                "permission_level": "IS_OWNER"
            })
        );
    }

    #[test]
    fn test_principal_toml_shape() {
        #[derive(Deserialize)]
        struct Wrapper {
            permissions: Vec<PermissionEntry>,
        }
        let parsed: Wrapper = serde_json::from_value(serde_json::json!({
            "permissions": [
                { "principal": { "group": "engineering-admins" }, "level": "CAN_MANAGE" },
                { "principal": { "service_principal": "xvy" }, "level": "IS_OWNER" }
            ]
        }))
        .unwrap();
        assert_eq!(parsed.permissions[0].principal, group("engineering-admins"));
        assert_eq!(parsed.permissions[1].level, PermissionLevel::IsOwner);
    }

    #[test]
    fn test_acl_target_describe() {
        assert_eq!(AclTarget::job(42).describe(), "jobs/42");
        assert_eq!(AclTarget::workspace().describe(), "workspace");
    }
}
