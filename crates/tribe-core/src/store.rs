//! Store collaborator
//!
//! The persistence layer is an external collaborator. Everything the
//! services need from it is expressed by the [`Store`] trait: lookup by
//! identifier, creation, update, deletion and an existence check.
//!
//! Updates are last-write-wins; no ordering is promised between concurrent
//! writers touching the same record.

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    Account, Association, Community, EntityProfile, MembershipChange, NewAccount, NewAssociation,
    ProfileChanges, RecordId,
};

/// Kind of record held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Account,
    Community,
    Association,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Account => "account",
            RecordKind::Community => "community",
            RecordKind::Association => "association",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} already exists: {detail}")]
    Duplicate { kind: RecordKind, detail: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: RecordId },

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Record lookup-and-mutate interface used by the services
#[async_trait]
pub trait Store: Send + Sync {
    /// Whether a record of `kind` with `id` exists
    async fn exists(&self, kind: RecordKind, id: RecordId) -> StoreResult<bool>;

    /// Cheap round trip used by the readiness probe
    async fn ping(&self) -> StoreResult<()>;

    // ---- accounts ----

    async fn find_account(&self, id: RecordId) -> StoreResult<Option<Account>>;

    /// Look up an account by its normalized email
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    /// Create an account; fails with `Duplicate` when the email is taken
    async fn create_account(&self, account: NewAccount) -> StoreResult<Account>;

    /// Overwrite one membership slot and return the updated account
    async fn update_membership(
        &self,
        id: RecordId,
        change: MembershipChange,
    ) -> StoreResult<Account>;

    // ---- communities ----

    async fn list_communities(&self) -> StoreResult<Vec<Community>>;

    async fn find_community(&self, id: RecordId) -> StoreResult<Option<Community>>;

    async fn create_community(&self, profile: EntityProfile) -> StoreResult<Community>;

    async fn update_community(
        &self,
        id: RecordId,
        changes: ProfileChanges,
    ) -> StoreResult<Community>;

    /// Delete a community together with its associations, clearing any
    /// memberships that pointed at them. Returns `false` when absent.
    async fn delete_community(&self, id: RecordId) -> StoreResult<bool>;

    // ---- associations ----

    async fn list_associations(&self) -> StoreResult<Vec<Association>>;

    async fn find_association(&self, id: RecordId) -> StoreResult<Option<Association>>;

    async fn create_association(&self, association: NewAssociation) -> StoreResult<Association>;

    async fn update_association(
        &self,
        id: RecordId,
        changes: ProfileChanges,
    ) -> StoreResult<Association>;

    /// Delete an association, clearing memberships that pointed at it.
    /// Returns `false` when absent.
    async fn delete_association(&self, id: RecordId) -> StoreResult<bool>;
}
