//! Membership service
//!
//! Joining a community or association overwrites the matching slot on the
//! account and mints a new credential from the updated record. Joining the
//! entity the account already belongs to succeeds the same way. An
//! association can only be joined from inside its own community.

use super::jwt::{Claims, CredentialCodec};
use super::service::AuthResponse;
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::AppError;
use std::sync::Arc;
use tribe_core::{MembershipChange, RecordId, RecordKind, Store, StoreError};

pub const COMMUNITY_NOT_FOUND: &str = "Community with that ID is not in our database";
pub const ASSOCIATION_NOT_FOUND: &str = "Association with that ID is not in our database";
pub const OUTSIDE_ASSOCIATION_COMMUNITY: &str =
    "You must be part of the association's community to join it";

pub struct MembershipService {
    store: Arc<dyn Store>,
    codec: CredentialCodec,
}

impl MembershipService {
    pub fn new(store: Arc<dyn Store>, codec: CredentialCodec) -> Self {
        Self { store, codec }
    }

    pub async fn join_community(
        &self,
        claims: &Claims,
        community_id: RecordId,
        context: &RequestContext,
    ) -> Result<AuthResponse, AppError> {
        self.join(claims, MembershipChange::Community(community_id), context)
            .await
    }

    pub async fn join_association(
        &self,
        claims: &Claims,
        association_id: RecordId,
        context: &RequestContext,
    ) -> Result<AuthResponse, AppError> {
        let association = self
            .store
            .find_association(association_id)
            .await?
            .ok_or_else(|| AppError::NotFound(ASSOCIATION_NOT_FOUND.to_string()))?;

        // The stored account, not the claims, carries the current community
        let account = self
            .store
            .find_account(claims.id)
            .await?
            .ok_or(AppError::InvalidCredential)?;

        if account.community_id != Some(association.community_id) {
            tracing::debug!(
                account_id = account.id,
                association_id,
                community_id = association.community_id,
                "Join refused outside the association's community"
            );
            return Err(AppError::BadRequest(
                OUTSIDE_ASSOCIATION_COMMUNITY.to_string(),
            ));
        }

        self.join(claims, MembershipChange::Association(association_id), context)
            .await
    }

    async fn join(
        &self,
        claims: &Claims,
        change: MembershipChange,
        context: &RequestContext,
    ) -> Result<AuthResponse, AppError> {
        let (kind, target_id, not_found) = match change {
            MembershipChange::Community(id) => (RecordKind::Community, id, COMMUNITY_NOT_FOUND),
            MembershipChange::Association(id) => {
                (RecordKind::Association, id, ASSOCIATION_NOT_FOUND)
            }
        };

        if !self.store.exists(kind, target_id).await? {
            return Err(AppError::NotFound(not_found.to_string()));
        }

        let account = match self.store.update_membership(claims.id, change).await {
            Ok(account) => account,
            // Target deleted between the check and the update
            Err(StoreError::NotFound { kind: missing, .. }) if missing == kind => {
                return Err(AppError::NotFound(not_found.to_string()));
            }
            // The credential outlived its account
            Err(StoreError::NotFound {
                kind: RecordKind::Account,
                ..
            }) => return Err(AppError::InvalidCredential),
            Err(e) => return Err(e.into()),
        };

        let token = self.codec.mint(&account)?;

        audit_log(&AuditEvent::membership_joined(
            account.id, kind, target_id, context,
        ));

        Ok(AuthResponse {
            token,
            user: account.to_view(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use tribe_core::{Account, EntityProfile, MemoryStore, NewAccount, NewAssociation, Role};

    struct Fixture {
        service: MembershipService,
        codec: CredentialCodec,
        store: Arc<MemoryStore>,
        claims: Claims,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let codec = CredentialCodec::new(b"secret", "tribe", Duration::from_secs(3600));

        let account = store
            .create_account(NewAccount {
                name: "John Doe".to_string(),
                email: "johndoe@example.com".to_string(),
                password_hash: String::new(),
                role: Role::Regular,
            })
            .await
            .unwrap();
        let claims = codec.verify(&codec.mint(&account).unwrap()).unwrap();

        Fixture {
            service: MembershipService::new(store.clone(), codec.clone()),
            codec,
            store,
            claims,
        }
    }

    fn profile(name: &str) -> EntityProfile {
        EntityProfile {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_join_community_reissues_credential() {
        let f = fixture().await;
        let community = f.store.create_community(profile("Makers")).await.unwrap();

        let response = f
            .service
            .join_community(&f.claims, community.id, &RequestContext::default())
            .await
            .unwrap();

        let claims = f.codec.verify(&response.token).unwrap();
        assert_eq!(claims.community_id, Some(community.id));
        assert_eq!(response.user.community_id, Some(community.id));
        assert_ne!(claims.jti, f.claims.jti);
    }

    #[tokio::test]
    async fn test_join_unknown_community() {
        let f = fixture().await;
        let result = f
            .service
            .join_community(&f.claims, 1000, &RequestContext::default())
            .await;
        assert_eq!(
            result.unwrap_err(),
            AppError::NotFound(COMMUNITY_NOT_FOUND.to_string())
        );
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let f = fixture().await;
        let community = f.store.create_community(profile("Makers")).await.unwrap();
        let context = RequestContext::default();

        let first = f.service.join_community(&f.claims, community.id, &context).await.unwrap();
        let second = f.service.join_community(&f.claims, community.id, &context).await.unwrap();

        assert_eq!(first.user.community_id, second.user.community_id);
        let account: Account = f.store.find_account(f.claims.id).await.unwrap().unwrap();
        assert_eq!(account.community_id, Some(community.id));
    }

    #[tokio::test]
    async fn test_join_association_keeps_community() {
        let f = fixture().await;
        let context = RequestContext::default();
        let community = f.store.create_community(profile("Makers")).await.unwrap();
        let association = f
            .store
            .create_association(NewAssociation {
                community_id: community.id,
                chairman: "Jane".to_string(),
                profile: profile("Woodworkers"),
            })
            .await
            .unwrap();

        f.service.join_community(&f.claims, community.id, &context).await.unwrap();
        let response = f
            .service
            .join_association(&f.claims, association.id, &context)
            .await
            .unwrap();

        let claims = f.codec.verify(&response.token).unwrap();
        assert_eq!(claims.community_id, Some(community.id));
        assert_eq!(claims.association_id, Some(association.id));
    }

    async fn association_in(f: &Fixture, community_id: RecordId) -> RecordId {
        f.store
            .create_association(NewAssociation {
                community_id,
                chairman: "Jane".to_string(),
                profile: profile("Woodworkers"),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_join_association_requires_community() {
        let f = fixture().await;
        let community = f.store.create_community(profile("Makers")).await.unwrap();
        let association_id = association_in(&f, community.id).await;

        let result = f
            .service
            .join_association(&f.claims, association_id, &RequestContext::default())
            .await;
        assert_eq!(
            result.unwrap_err(),
            AppError::BadRequest(OUTSIDE_ASSOCIATION_COMMUNITY.to_string())
        );
    }

    #[tokio::test]
    async fn test_join_association_of_other_community() {
        let f = fixture().await;
        let context = RequestContext::default();
        let home = f.store.create_community(profile("Makers")).await.unwrap();
        let other = f.store.create_community(profile("Bakers")).await.unwrap();
        let association_id = association_in(&f, other.id).await;

        f.service.join_community(&f.claims, home.id, &context).await.unwrap();
        let result = f
            .service
            .join_association(&f.claims, association_id, &context)
            .await;

        assert_eq!(
            result.unwrap_err(),
            AppError::BadRequest(OUTSIDE_ASSOCIATION_COMMUNITY.to_string())
        );
        let account = f.store.find_account(f.claims.id).await.unwrap().unwrap();
        assert_eq!(account.community_id, Some(home.id));
        assert_eq!(account.association_id, None);
    }

    #[tokio::test]
    async fn test_join_unknown_association() {
        let f = fixture().await;
        let result = f
            .service
            .join_association(&f.claims, 42, &RequestContext::default())
            .await;
        assert_eq!(
            result.unwrap_err(),
            AppError::NotFound(ASSOCIATION_NOT_FOUND.to_string())
        );
    }

    #[tokio::test]
    async fn test_credential_for_missing_account() {
        let f = fixture().await;
        let community = f.store.create_community(profile("Makers")).await.unwrap();
        let now = Utc::now();
        let ghost = Account {
            id: 999,
            name: "Ghost".to_string(),
            email: "ghost@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Regular,
            community_id: None,
            association_id: None,
            created_at: now,
            updated_at: now,
        };
        let claims = f.codec.verify(&f.codec.mint(&ghost).unwrap()).unwrap();

        let result = f
            .service
            .join_community(&claims, community.id, &RequestContext::default())
            .await;
        assert_eq!(result.unwrap_err(), AppError::InvalidCredential);
    }
}
