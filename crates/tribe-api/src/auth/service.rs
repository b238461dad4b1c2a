//! Identity service
//!
//! Sign-up creates a `regular` account and mints its first credential.
//! Sign-in verifies the password and mints a credential from the stored
//! account. Both sign-in failure paths (unknown email, wrong password) cost
//! one Argon2 verification and produce the same error.

use super::jwt::CredentialCodec;
use super::password::{
    hash_password_blocking, hash_password_with_config, verify_password_blocking, PasswordConfig,
    PasswordError,
};
use super::validation::{SignInRequest, SignUpRequest};
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::{AppError, DUPLICATE_ACCOUNT};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tribe_core::{Account, AccountView, NewAccount, Role, Store};
use utoipa::ToSchema;
use uuid::Uuid;

/// Credential plus the account it was minted from
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: AccountView,
}

/// Credential alone, returned by sign-in
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

pub struct IdentityService {
    store: Arc<dyn Store>,
    codec: CredentialCodec,
    password_config: PasswordConfig,
    /// Verified against when the email is unknown
    decoy_hash: String,
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn Store>,
        codec: CredentialCodec,
        password_config: PasswordConfig,
    ) -> Result<Self, PasswordError> {
        let decoy_hash =
            hash_password_with_config(&Uuid::new_v4().to_string(), &password_config)?;

        Ok(Self {
            store,
            codec,
            password_config,
            decoy_hash,
        })
    }

    /// Register a `regular` account and mint its first credential
    pub async fn sign_up(
        &self,
        request: SignUpRequest,
        context: &RequestContext,
    ) -> Result<AuthResponse, AppError> {
        let email = request.email.clone();

        let account = match self
            .create_account(request.name, request.email, request.password, Role::Regular)
            .await
        {
            Ok(account) => account,
            Err(e) => {
                audit_log(&AuditEvent::SignUpFailure {
                    email,
                    reason: e.to_string(),
                    ip_address: context.ip_address.clone(),
                    user_agent: context.user_agent.clone(),
                });
                return Err(e);
            }
        };

        let token = self.codec.mint(&account)?;

        audit_log(&AuditEvent::SignUpSuccess {
            account_id: account.id,
            email: account.email.clone(),
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
        });

        Ok(AuthResponse {
            token,
            user: account.to_view(),
        })
    }

    /// Verify email and password and mint a fresh credential
    pub async fn sign_in(
        &self,
        request: SignInRequest,
        context: &RequestContext,
    ) -> Result<TokenResponse, AppError> {
        let account = self.store.find_account_by_email(&request.email).await?;

        let (hash, reason) = match &account {
            Some(account) => (account.password_hash.clone(), "wrong password"),
            None => (self.decoy_hash.clone(), "unknown email"),
        };
        let password_matches = verify_password_blocking(request.password, hash).await?;

        let account = match account {
            Some(account) if password_matches => account,
            _ => {
                audit_log(&AuditEvent::SignInFailure {
                    email: request.email,
                    reason: reason.to_string(),
                    ip_address: context.ip_address.clone(),
                    user_agent: context.user_agent.clone(),
                });
                return Err(AppError::InvalidCredentials);
            }
        };

        let token = self.codec.mint(&account)?;

        audit_log(&AuditEvent::SignInSuccess {
            account_id: account.id,
            email: account.email,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
        });

        Ok(TokenResponse { token })
    }

    /// Hash the password and store a new account with `role`
    ///
    /// `name` and `email` are expected to be normalized already.
    pub async fn create_account(
        &self,
        name: String,
        email: String,
        password: String,
        role: Role,
    ) -> Result<Account, AppError> {
        if self.store.find_account_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(DUPLICATE_ACCOUNT.to_string()));
        }

        let password_hash = hash_password_blocking(password, self.password_config.clone()).await?;

        // A concurrent sign-up can still win the race; the store reports it as Duplicate
        let account = self
            .store
            .create_account(NewAccount {
                name,
                email,
                password_hash,
                role,
            })
            .await?;

        tracing::debug!(account_id = account.id, role = %account.role, "Account created");
        Ok(account)
    }
}
