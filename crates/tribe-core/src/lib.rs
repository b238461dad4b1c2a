//! Tribe Core - Domain records, store collaborator, and shared types
//!
//! This crate defines the core abstractions used throughout tribe:
//! - Account, Community and Association records
//! - Roles and the capability set each role grants
//! - The `Store` collaborator trait and its error type
//! - In-memory and PostgreSQL store implementations
//! - Configuration management

pub mod config;
pub mod memory;
pub mod postgres;
pub mod store;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{RecordKind, Store, StoreError, StoreResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifier assigned by the store to every record
pub type RecordId = i64;

// ============================================================================
// Roles & Capabilities
// ============================================================================

/// Account role
///
/// Every account created through sign-up is `Regular`. `Admin` accounts are
/// provisioned out of band (see the `tribe create-admin` command).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Regular,
    Admin,
}

impl Role {
    const REGULAR_CAPABILITIES: &'static [Capability] = &[
        Capability::JoinCommunity,
        Capability::JoinAssociation,
        Capability::CreateAssociation,
    ];

    const ADMIN_CAPABILITIES: &'static [Capability] = &[
        Capability::JoinCommunity,
        Capability::JoinAssociation,
        Capability::CreateAssociation,
        Capability::CreateCommunity,
        Capability::ManageCommunities,
        Capability::ManageAssociations,
    ];

    /// Convert role to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Regular => "regular",
            Role::Admin => "admin",
        }
    }

    /// Capabilities granted to this role
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Regular => Self::REGULAR_CAPABILITIES,
            Role::Admin => Self::ADMIN_CAPABILITIES,
        }
    }

    /// Whether this role grants `capability`
    pub fn grants(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "regular" => Ok(Role::Regular),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Returned when a stored or configured role name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// An operation a role may be allowed to perform
///
/// Route guards ask for a capability rather than a role name, so adding a
/// role only means choosing its capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    JoinCommunity,
    JoinAssociation,
    CreateAssociation,
    CreateCommunity,
    ManageCommunities,
    ManageAssociations,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::JoinCommunity => "join_community",
            Capability::JoinAssociation => "join_association",
            Capability::CreateAssociation => "create_association",
            Capability::CreateCommunity => "create_community",
            Capability::ManageCommunities => "manage_communities",
            Capability::ManageAssociations => "manage_associations",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// Identity record
///
/// `community_id` and `association_id` are single-slot memberships: joining
/// replaces the previous value, nothing in this crate clears them except the
/// deletion of the referenced record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    /// Argon2id PHC string, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub community_id: Option<RecordId>,
    pub association_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Public representation (safe for API responses)
    pub fn to_view(&self) -> AccountView {
        AccountView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            community_id: self.community_id,
            association_id: self.association_id,
            created_at: self.created_at,
        }
    }
}

/// Public account representation, returned as `user` in auth responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub community_id: Option<RecordId>,
    pub association_id: Option<RecordId>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

/// Fields required to create an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Membership slot to overwrite on an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Community(RecordId),
    Association(RecordId),
}

// ============================================================================
// Organizational entities
// ============================================================================

/// Descriptive fields shared by communities and associations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityProfile {
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// Partial update for an entity profile
///
/// `None` or an empty string keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProfileChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl ProfileChanges {
    /// Apply the non-empty fields onto `profile`
    pub fn apply(self, profile: &mut EntityProfile) {
        if let Some(name) = non_empty(self.name) {
            profile.name = name;
        }
        if let Some(description) = non_empty(self.description) {
            profile.description = Some(description);
        }
        if let Some(image) = non_empty(self.image) {
            profile.image = Some(image);
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: RecordId,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl Community {
    pub fn profile(&self) -> EntityProfile {
        EntityProfile {
            name: self.name.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
        }
    }
}

/// Association owned by a community, chaired by the account that created it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    pub id: RecordId,
    pub community_id: RecordId,
    pub chairman: String,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl Association {
    pub fn profile(&self) -> EntityProfile {
        EntityProfile {
            name: self.name.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
        }
    }
}

/// Fields required to create an association
#[derive(Debug, Clone)]
pub struct NewAssociation {
    pub community_id: RecordId,
    pub chairman: String,
    pub profile: EntityProfile,
}

// ============================================================================
// Tests
// ============================================================================
