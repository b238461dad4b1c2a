//! Credential codec
//!
//! Signs and verifies JWT credentials with HMAC-SHA256. A credential carries
//! the account identity, role and current memberships. Credentials are
//! immutable: a membership change produces a new credential minted from the
//! updated account, never an edited token.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tribe_core::{Account, AuthConfig, RecordId, Role};
use uuid::Uuid;

/// Claims embedded in every credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Unique credential identifier, recorded in audit events
    pub jti: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
    /// Account identifier
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_id: Option<RecordId>,
}

/// Credential encoding and verification errors
///
/// The three verification failures are kept apart for audit logging only;
/// callers outside this module report all of them as one invalid-credential
/// error.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode credential: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Malformed credential")]
    Malformed,

    #[error("Credential signature mismatch")]
    BadSignature,

    #[error("Credential has expired")]
    Expired,

    #[error("System time error: {0}")]
    SystemTime(#[from] std::time::SystemTimeError),
}

impl CodecError {
    /// Whether this error comes from verifying a presented credential
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CodecError::Malformed | CodecError::BadSignature | CodecError::Expired
        )
    }
}

/// Signs and verifies credentials with a secret fixed at construction
#[derive(Clone)]
pub struct CredentialCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CredentialCodec {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            config.issuer.clone(),
            Duration::from_secs(config.token_ttl_secs),
        )
    }

    /// Default credential lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a credential for `account` with the default lifetime
    pub fn mint(&self, account: &Account) -> Result<String, CodecError> {
        self.issue(account, self.ttl)
    }

    /// Mint a credential for `account` valid for `ttl`
    pub fn issue(&self, account: &Account, ttl: Duration) -> Result<String, CodecError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        self.issue_at(account, now, ttl)
    }

    pub(crate) fn issue_at(
        &self,
        account: &Account,
        issued_at: u64,
        ttl: Duration,
    ) -> Result<String, CodecError> {
        let claims = Claims {
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_at,
            exp: issued_at + ttl.as_secs(),
            id: account.id,
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role,
            community_id: account.community_id,
            association_id: account.association_id,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify a credential and extract its claims
    pub fn verify(&self, token: &str) -> Result<Claims, CodecError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => CodecError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => CodecError::BadSignature,
                _ => CodecError::Malformed,
            }
        })?;

        Ok(token_data.claims)
    }
}
