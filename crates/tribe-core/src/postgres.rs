//! PostgreSQL store
//!
//! Implements the [`Store`] collaborator with SQLx. Unique violations on the
//! account email surface as `StoreError::Duplicate`, foreign key violations
//! as `StoreError::NotFound` for the referenced record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;

use crate::store::{RecordKind, Store, StoreError, StoreResult};
use crate::{
    Account, Association, Community, EntityProfile, MembershipChange, NewAccount, NewAssociation,
    ProfileChanges, RecordId, Role,
};

/// Idempotent schema, applied by [`PgStore::ensure_schema`]
pub const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

const ACCOUNT_COLUMNS: &str =
    "id, name, email, password_hash, role, community_id, association_id, created_at, updated_at";
const COMMUNITY_COLUMNS: &str = "id, name, description, image, created_at, updated_at";
const ASSOCIATION_COLUMNS: &str =
    "id, community_id, chairman, name, description, image, created_at, updated_at";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to `database_url` with at most `max_connections` pooled connections
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Database schema ensured");
        Ok(())
    }

    fn table(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Account => "accounts",
            RecordKind::Community => "communities",
            RecordKind::Association => "associations",
        }
    }
}

/// Account row from database
#[derive(Debug, FromRow)]
struct AccountRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    community_id: Option<i64>,
    association_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| StoreError::Backend(format!("account {}: {e}", row.id)))?;

        Ok(Account {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            community_id: row.community_id,
            association_id: row.association_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CommunityRow {
    id: i64,
    name: String,
    description: Option<String>,
    image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommunityRow> for Community {
    fn from(row: CommunityRow) -> Self {
        Community {
            id: row.id,
            name: row.name,
            description: row.description,
            image: row.image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AssociationRow {
    id: i64,
    community_id: i64,
    chairman: String,
    name: String,
    description: Option<String>,
    image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AssociationRow> for Association {
    fn from(row: AssociationRow) -> Self {
        Association {
            id: row.id,
            community_id: row.community_id,
            chairman: row.chairman,
            name: row.name,
            description: row.description,
            image: row.image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Map a write error, translating constraint violations into domain errors
fn write_error(err: sqlx::Error, on_unique: StoreError, on_foreign_key: StoreError) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return on_unique;
        }
        if db.is_foreign_key_violation() {
            return on_foreign_key;
        }
    }
    StoreError::from(err)
}

#[async_trait]
impl Store for PgStore {
    async fn exists(&self, kind: RecordKind, id: RecordId) -> StoreResult<bool> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            Self::table(kind)
        );
        let found = sqlx::query_scalar::<_, bool>(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_account(&self, id: RecordId) -> StoreResult<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, AccountRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        sqlx::query_as::<_, AccountRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn create_account(&self, account: NewAccount) -> StoreResult<Account> {
        let query = format!(
            "INSERT INTO accounts (name, email, password_hash, role) VALUES ($1, $2, $3, $4) \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                write_error(
                    e,
                    StoreError::Duplicate {
                        kind: RecordKind::Account,
                        detail: account.email.clone(),
                    },
                    StoreError::Backend("unexpected foreign key violation".to_string()),
                )
            })?;

        Account::try_from(row)
    }

    async fn update_membership(
        &self,
        id: RecordId,
        change: MembershipChange,
    ) -> StoreResult<Account> {
        let (column, target, kind) = match change {
            MembershipChange::Community(target) => ("community_id", target, RecordKind::Community),
            MembershipChange::Association(target) => {
                ("association_id", target, RecordKind::Association)
            }
        };

        let query = format!(
            "UPDATE accounts SET {column} = $1, updated_at = NOW() WHERE id = $2 \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(target)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                write_error(
                    e,
                    StoreError::Backend("unexpected unique violation".to_string()),
                    StoreError::NotFound { kind, id: target },
                )
            })?
            .ok_or(StoreError::NotFound {
                kind: RecordKind::Account,
                id,
            })?;

        Account::try_from(row)
    }

    async fn list_communities(&self) -> StoreResult<Vec<Community>> {
        let query = format!("SELECT {COMMUNITY_COLUMNS} FROM communities ORDER BY id");
        let rows = sqlx::query_as::<_, CommunityRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Community::from).collect())
    }

    async fn find_community(&self, id: RecordId) -> StoreResult<Option<Community>> {
        let query = format!("SELECT {COMMUNITY_COLUMNS} FROM communities WHERE id = $1");
        let row = sqlx::query_as::<_, CommunityRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Community::from))
    }

    async fn create_community(&self, profile: EntityProfile) -> StoreResult<Community> {
        let query = format!(
            "INSERT INTO communities (name, description, image) VALUES ($1, $2, $3) \
             RETURNING {COMMUNITY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommunityRow>(&query)
            .bind(&profile.name)
            .bind(&profile.description)
            .bind(&profile.image)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn update_community(
        &self,
        id: RecordId,
        changes: ProfileChanges,
    ) -> StoreResult<Community> {
        let mut tx = self.pool.begin().await?;

        let select = format!("SELECT {COMMUNITY_COLUMNS} FROM communities WHERE id = $1 FOR UPDATE");
        let current: Community = sqlx::query_as::<_, CommunityRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound {
                kind: RecordKind::Community,
                id,
            })?
            .into();

        let mut profile = current.profile();
        changes.apply(&mut profile);

        let update = format!(
            "UPDATE communities SET name = $1, description = $2, image = $3, updated_at = NOW() \
             WHERE id = $4 RETURNING {COMMUNITY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommunityRow>(&update)
            .bind(&profile.name)
            .bind(&profile.description)
            .bind(&profile.image)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn delete_community(&self, id: RecordId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM communities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_associations(&self) -> StoreResult<Vec<Association>> {
        let query = format!("SELECT {ASSOCIATION_COLUMNS} FROM associations ORDER BY id");
        let rows = sqlx::query_as::<_, AssociationRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Association::from).collect())
    }

    async fn find_association(&self, id: RecordId) -> StoreResult<Option<Association>> {
        let query = format!("SELECT {ASSOCIATION_COLUMNS} FROM associations WHERE id = $1");
        let row = sqlx::query_as::<_, AssociationRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Association::from))
    }

    async fn create_association(&self, association: NewAssociation) -> StoreResult<Association> {
        let query = format!(
            "INSERT INTO associations (community_id, chairman, name, description, image) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ASSOCIATION_COLUMNS}"
        );
        let community_id = association.community_id;
        let row = sqlx::query_as::<_, AssociationRow>(&query)
            .bind(community_id)
            .bind(&association.chairman)
            .bind(&association.profile.name)
            .bind(&association.profile.description)
            .bind(&association.profile.image)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                write_error(
                    e,
                    StoreError::Backend("unexpected unique violation".to_string()),
                    StoreError::NotFound {
                        kind: RecordKind::Community,
                        id: community_id,
                    },
                )
            })?;
        Ok(row.into())
    }

    async fn update_association(
        &self,
        id: RecordId,
        changes: ProfileChanges,
    ) -> StoreResult<Association> {
        let mut tx = self.pool.begin().await?;

        let select =
            format!("SELECT {ASSOCIATION_COLUMNS} FROM associations WHERE id = $1 FOR UPDATE");
        let current: Association = sqlx::query_as::<_, AssociationRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound {
                kind: RecordKind::Association,
                id,
            })?
            .into();

        let mut profile = current.profile();
        changes.apply(&mut profile);

        let update = format!(
            "UPDATE associations SET name = $1, description = $2, image = $3, updated_at = NOW() \
             WHERE id = $4 RETURNING {ASSOCIATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AssociationRow>(&update)
            .bind(&profile.name)
            .bind(&profile.description)
            .bind(&profile.image)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn delete_association(&self, id: RecordId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM associations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_declares_all_tables() {
        for table in ["accounts", "communities", "associations"] {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")),
                "missing {table}"
            );
        }
        assert!(SCHEMA.contains("NOT NULL UNIQUE"));
    }

    #[test]
    fn test_account_row_with_unknown_role_is_rejected() {
        let now = Utc::now();
        let row = AccountRow {
            id: 1,
            name: "John Doe".to_string(),
            email: "johndoe@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: "superuser".to_string(),
            community_id: None,
            association_id: None,
            created_at: now,
            updated_at: now,
        };

        assert!(matches!(Account::try_from(row), Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database at DATABASE_URL"]
    async fn test_round_trip_against_database() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
        let store = PgStore::connect(&url, 2).await.unwrap();
        store.ensure_schema().await.unwrap();

        let community = store
            .create_community(EntityProfile {
                name: "Integration".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(store.exists(RecordKind::Community, community.id).await.unwrap());
        assert!(store.delete_community(community.id).await.unwrap());
    }
}
