//! Lookup-then-create-or-update, shared by every resource kind.

use std::fmt;

use async_trait::async_trait;

use crate::client::WorkspaceClient;
use crate::error::{LookupKind, ProvisionResult};

/// A desired-state descriptor for one remote resource.
///
/// The natural key is the only identity: the remote identifier is looked up
/// from it on every run and never stored.
#[async_trait]
pub trait Reconcilable: Send + Sync {
    /// Identifier the platform assigns to the resource.
    type Id: Clone + fmt::Display + Send + Sync;

    const KIND: LookupKind;

    fn natural_key(&self) -> String;

    /// Returns the identifier of the resource matching the natural key, if any.
    async fn find(&self, client: &WorkspaceClient) -> ProvisionResult<Option<Self::Id>>;

    async fn create(&self, client: &WorkspaceClient) -> ProvisionResult<Self::Id>;

    /// Brings an existing resource in line with the descriptor.
    ///
    /// Returns [`Action::Unchanged`] when the descriptor carries nothing the
    /// update call could change and no request was sent.
    async fn update(&self, client: &WorkspaceClient, id: &Self::Id) -> ProvisionResult<Action>;
}

/// What `create_or_update` did to the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Created,
    Updated,
    Unchanged,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled<Id> {
    pub id: Id,
    pub action: Action,
}

/// Updates the resource if the natural key already resolves, creates it otherwise.
pub async fn create_or_update<R: Reconcilable>(
    client: &WorkspaceClient,
    desired: &R,
) -> ProvisionResult<Reconciled<R::Id>> {
    let key = desired.natural_key();
    match desired.find(client).await? {
        Some(id) => {
            let action = desired.update(client, &id).await?;
            tracing::info!(kind = %R::KIND, key = %key, id = %id, %action, "reconciled existing resource");
            Ok(Reconciled { id, action })
        }
        None => {
            let id = desired.create(client).await?;
            tracing::info!(kind = %R::KIND, key = %key, id = %id, "created resource");
            Ok(Reconciled {
                id,
                action: Action::Created,
            })
        }
    }
}
