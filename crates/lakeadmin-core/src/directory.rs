//! SCIM lookups for users, groups and service principals.

use futures_util::TryStreamExt;
use serde::Deserialize;

use crate::client::WorkspaceClient;
use crate::error::{LookupKind, ProvisionError, ProvisionResult};
use crate::paging::{PageRequest, paginate};
use crate::permissions::Principal;

pub(crate) const SCIM_USERS: &str = "2.0/preview/scim/v2/Users";
pub(crate) const SCIM_GROUPS: &str = "2.0/preview/scim/v2/Groups";
pub(crate) const SCIM_SERVICE_PRINCIPALS: &str = "2.0/preview/scim/v2/ServicePrincipals";

/// SCIM list envelope; `Resources` is omitted when nothing matched.
#[derive(Debug, Deserialize)]
pub(crate) struct ScimList<T> {
    #[serde(rename = "Resources", default = "Vec::new")]
    pub resources: Vec<T>,
}

/// A workspace group as SCIM reports it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroup {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub members: Vec<ScimRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScimRef {
    pub value: String,
    #[serde(default)]
    pub display: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScimId {
    id: String,
}

fn eq_filter(attribute: &str, value: &str) -> String {
    format!("{attribute} eq \"{}\"", value.replace('"', "\\\""))
}

async fn first_match(
    client: &WorkspaceClient,
    path: &str,
    attribute: &str,
    value: &str,
) -> ProvisionResult<Option<String>> {
    let list: ScimList<ScimId> = client
        .get(path, &[("filter", eq_filter(attribute, value))])
        .await?;
    Ok(list.resources.into_iter().next().map(|r| r.id))
}

/// Looks up a group by display name.
pub async fn find_group(client: &WorkspaceClient, name: &str) -> ProvisionResult<Option<String>> {
    first_match(client, SCIM_GROUPS, "displayName", name).await
}

pub async fn find_user(client: &WorkspaceClient, user_name: &str) -> ProvisionResult<Option<String>> {
    first_match(client, SCIM_USERS, "userName", user_name).await
}

pub async fn find_service_principal(
    client: &WorkspaceClient,
    name: &str,
) -> ProvisionResult<Option<String>> {
    first_match(client, SCIM_SERVICE_PRINCIPALS, "displayName", name).await
}

/// Resolves a principal to its SCIM id, failing with `NotFound` if absent.
pub async fn require(client: &WorkspaceClient, principal: &Principal) -> ProvisionResult<String> {
    let (found, kind) = match principal {
        Principal::User(name) => (find_user(client, name).await?, LookupKind::User),
        Principal::Group(name) => (find_group(client, name).await?, LookupKind::Group),
        Principal::ServicePrincipal(name) => (
            find_service_principal(client, name).await?,
            LookupKind::ServicePrincipal,
        ),
    };
    match found {
        Some(id) => {
            tracing::debug!(%principal, %id, "resolved principal");
            Ok(id)
        }
        None => Err(ProvisionError::not_found(kind, principal.name())),
    }
}

/// Resolves every principal, stopping at the first one that is missing.
pub async fn require_all<'a, I>(client: &WorkspaceClient, principals: I) -> ProvisionResult<Vec<String>>
where
    I: IntoIterator<Item = &'a Principal>,
{
    let mut ids = Vec::new();
    for principal in principals {
        ids.push(require(client, principal).await?);
    }
    Ok(ids)
}

/// Pages through every group in the workspace.
pub async fn list_groups(client: &WorkspaceClient) -> ProvisionResult<Vec<ScimGroup>> {
    let groups: Vec<ScimGroup> = paginate(client.page_size(), |page: PageRequest| async move {
        let list: ScimList<ScimGroup> = client
            .get(
                SCIM_GROUPS,
                &[
                    ("startIndex", page.start_index().to_string()),
                    ("count", page.limit.to_string()),
                ],
            )
            .await?;
        Ok::<_, ProvisionError>(list.resources)
    })
    .try_concat()
    .await?;
    tracing::info!(count = groups.len(), "listed workspace groups");
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_filter_escapes_quotes() {
        assert_eq!(
            eq_filter("displayName", "data-engineers"),
            "displayName eq \"data-engineers\""
        );
        assert_eq!(eq_filter("displayName", "a\"b"), "displayName eq \"a\\\"b\"");
    }

    #[test]
    fn test_scim_list_without_resources() {
        let list: ScimList<ScimId> =
            serde_json::from_value(serde_json::json!({"totalResults": 0})).unwrap();
        assert!(list.resources.is_empty());
    }

    #[test]
    fn test_scim_group_decodes_members() {
        let group: ScimGroup = serde_json::from_value(serde_json::json!({
            "id": "123",
            "displayName": "data-engineers",
            "members": [{"value": "9", "display": "manager@example.com"}]
        }))
        .unwrap();
        assert_eq!(group.display_name, "data-engineers");
        assert_eq!(group.members[0].value, "9");
    }
}
