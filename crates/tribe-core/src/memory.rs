//! In-memory store
//!
//! Used by tests and by the server when no database URL is configured.
//! All tables sit behind one `tokio::sync::RwLock`, so each operation is
//! atomic with respect to the others.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::store::{RecordKind, Store, StoreError, StoreResult};
use crate::{
    Account, Association, Community, EntityProfile, MembershipChange, NewAccount, NewAssociation,
    ProfileChanges, RecordId,
};

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<RecordId, Account>,
    communities: BTreeMap<RecordId, Community>,
    associations: BTreeMap<RecordId, Association>,
    last_account_id: RecordId,
    last_community_id: RecordId,
    last_association_id: RecordId,
}

impl Tables {
    fn contains(&self, kind: RecordKind, id: RecordId) -> bool {
        match kind {
            RecordKind::Account => self.accounts.contains_key(&id),
            RecordKind::Community => self.communities.contains_key(&id),
            RecordKind::Association => self.associations.contains_key(&id),
        }
    }

    fn require(&self, kind: RecordKind, id: RecordId) -> StoreResult<()> {
        if self.contains(kind, id) {
            Ok(())
        } else {
            Err(StoreError::NotFound { kind, id })
        }
    }

    fn clear_association_memberships(&mut self, association_id: RecordId) {
        for account in self.accounts.values_mut() {
            if account.association_id == Some(association_id) {
                account.association_id = None;
                account.updated_at = Utc::now();
            }
        }
    }
}

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn exists(&self, kind: RecordKind, id: RecordId) -> StoreResult<bool> {
        Ok(self.tables.read().await.contains(kind, id))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_account(&self, id: RecordId) -> StoreResult<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .find(|account| account.email == email)
            .cloned())
    }

    async fn create_account(&self, account: NewAccount) -> StoreResult<Account> {
        let mut tables = self.tables.write().await;

        if tables.accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::Duplicate {
                kind: RecordKind::Account,
                detail: account.email,
            });
        }

        tables.last_account_id += 1;
        let now = Utc::now();
        let created = Account {
            id: tables.last_account_id,
            name: account.name,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            community_id: None,
            association_id: None,
            created_at: now,
            updated_at: now,
        };
        tables.accounts.insert(created.id, created.clone());

        Ok(created)
    }

    async fn update_membership(
        &self,
        id: RecordId,
        change: MembershipChange,
    ) -> StoreResult<Account> {
        let mut tables = self.tables.write().await;

        match change {
            MembershipChange::Community(target) => tables.require(RecordKind::Community, target)?,
            MembershipChange::Association(target) => {
                tables.require(RecordKind::Association, target)?
            }
        }

        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or(StoreError::NotFound {
                kind: RecordKind::Account,
                id,
            })?;

        match change {
            MembershipChange::Community(target) => account.community_id = Some(target),
            MembershipChange::Association(target) => account.association_id = Some(target),
        }
        account.updated_at = Utc::now();

        Ok(account.clone())
    }

    async fn list_communities(&self) -> StoreResult<Vec<Community>> {
        Ok(self.tables.read().await.communities.values().cloned().collect())
    }

    async fn find_community(&self, id: RecordId) -> StoreResult<Option<Community>> {
        Ok(self.tables.read().await.communities.get(&id).cloned())
    }

    async fn create_community(&self, profile: EntityProfile) -> StoreResult<Community> {
        let mut tables = self.tables.write().await;
        tables.last_community_id += 1;

        let now = Utc::now();
        let community = Community {
            id: tables.last_community_id,
            name: profile.name,
            description: profile.description,
            image: profile.image,
            created_at: now,
            updated_at: now,
        };
        tables.communities.insert(community.id, community.clone());

        Ok(community)
    }

    async fn update_community(
        &self,
        id: RecordId,
        changes: ProfileChanges,
    ) -> StoreResult<Community> {
        let mut tables = self.tables.write().await;
        let community = tables
            .communities
            .get_mut(&id)
            .ok_or(StoreError::NotFound {
                kind: RecordKind::Community,
                id,
            })?;

        let mut profile = community.profile();
        changes.apply(&mut profile);
        community.name = profile.name;
        community.description = profile.description;
        community.image = profile.image;
        community.updated_at = Utc::now();

        Ok(community.clone())
    }

    async fn delete_community(&self, id: RecordId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.communities.remove(&id).is_none() {
            return Ok(false);
        }

        let owned: Vec<RecordId> = tables
            .associations
            .values()
            .filter(|association| association.community_id == id)
            .map(|association| association.id)
            .collect();
        for association_id in owned {
            tables.associations.remove(&association_id);
            tables.clear_association_memberships(association_id);
        }

        let now = Utc::now();
        for account in tables.accounts.values_mut() {
            if account.community_id == Some(id) {
                account.community_id = None;
                account.updated_at = now;
            }
        }

        Ok(true)
    }

    async fn list_associations(&self) -> StoreResult<Vec<Association>> {
        Ok(self.tables.read().await.associations.values().cloned().collect())
    }

    async fn find_association(&self, id: RecordId) -> StoreResult<Option<Association>> {
        Ok(self.tables.read().await.associations.get(&id).cloned())
    }

    async fn create_association(&self, association: NewAssociation) -> StoreResult<Association> {
        let mut tables = self.tables.write().await;
        tables.require(RecordKind::Community, association.community_id)?;
        tables.last_association_id += 1;

        let now = Utc::now();
        let created = Association {
            id: tables.last_association_id,
            community_id: association.community_id,
            chairman: association.chairman,
            name: association.profile.name,
            description: association.profile.description,
            image: association.profile.image,
            created_at: now,
            updated_at: now,
        };
        tables.associations.insert(created.id, created.clone());

        Ok(created)
    }

    async fn update_association(
        &self,
        id: RecordId,
        changes: ProfileChanges,
    ) -> StoreResult<Association> {
        let mut tables = self.tables.write().await;
        let association = tables
            .associations
            .get_mut(&id)
            .ok_or(StoreError::NotFound {
                kind: RecordKind::Association,
                id,
            })?;

        let mut profile = association.profile();
        changes.apply(&mut profile);
        association.name = profile.name;
        association.description = profile.description;
        association.image = profile.image;
        association.updated_at = Utc::now();

        Ok(association.clone())
    }

    async fn delete_association(&self, id: RecordId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.associations.remove(&id).is_none() {
            return Ok(false);
        }
        tables.clear_association_memberships(id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            name: "John Doe".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Regular,
        }
    }

    fn profile(name: &str) -> EntityProfile {
        EntityProfile {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_account_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let first = store.create_account(new_account("a@example.com")).await.unwrap();
        let second = store.create_account(new_account("b@example.com")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.role, Role::Regular);
        assert!(first.community_id.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        store.create_account(new_account("a@example.com")).await.unwrap();

        let result = store.create_account(new_account("a@example.com")).await;
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));
        assert_eq!(store.tables.read().await.accounts.len(), 1);
    }

    #[tokio::test]
    async fn test_update_membership_requires_target() {
        let store = MemoryStore::new();
        let account = store.create_account(new_account("a@example.com")).await.unwrap();

        let result = store
            .update_membership(account.id, MembershipChange::Community(42))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::NotFound {
                kind: RecordKind::Community,
                id: 42
            })
        ));

        let community = store.create_community(profile("Lagos")).await.unwrap();
        let updated = store
            .update_membership(account.id, MembershipChange::Community(community.id))
            .await
            .unwrap();
        assert_eq!(updated.community_id, Some(community.id));
    }

    #[tokio::test]
    async fn test_update_membership_unknown_account() {
        let store = MemoryStore::new();
        let community = store.create_community(profile("Lagos")).await.unwrap();

        let result = store
            .update_membership(99, MembershipChange::Community(community.id))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::NotFound {
                kind: RecordKind::Account,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_create_association_requires_community() {
        let store = MemoryStore::new();
        let result = store
            .create_association(NewAssociation {
                community_id: 5,
                chairman: "John Doe".to_string(),
                profile: profile("Chess club"),
            })
            .await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_community_cascades() {
        let store = MemoryStore::new();
        let community = store.create_community(profile("Lagos")).await.unwrap();
        let association = store
            .create_association(NewAssociation {
                community_id: community.id,
                chairman: "John Doe".to_string(),
                profile: profile("Chess club"),
            })
            .await
            .unwrap();
        let account = store.create_account(new_account("a@example.com")).await.unwrap();
        store
            .update_membership(account.id, MembershipChange::Community(community.id))
            .await
            .unwrap();
        store
            .update_membership(account.id, MembershipChange::Association(association.id))
            .await
            .unwrap();

        assert!(store.delete_community(community.id).await.unwrap());
        assert!(!store.delete_community(community.id).await.unwrap());
        assert!(!store
            .exists(RecordKind::Association, association.id)
            .await
            .unwrap());

        let account = store.find_account(account.id).await.unwrap().unwrap();
        assert!(account.community_id.is_none());
        assert!(account.association_id.is_none());
    }

    #[tokio::test]
    async fn test_update_community_keeps_empty_fields() {
        let store = MemoryStore::new();
        let community = store
            .create_community(EntityProfile {
                name: "Lagos".to_string(),
                description: Some("City chapter".to_string()),
                image: None,
            })
            .await
            .unwrap();

        let updated = store
            .update_community(
                community.id,
                ProfileChanges {
                    name: Some(String::new()),
                    description: Some("Lagos chapter".to_string()),
                    image: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Lagos");
        assert_eq!(updated.description.as_deref(), Some("Lagos chapter"));
    }
}
