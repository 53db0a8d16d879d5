use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. `password_hash` and `refresh_token_hash`
/// never leave the process in JSON.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Fields required to insert a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: String,
}

/// Store failures the auth service cares about distinguishing.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence seam for user records. All operations are point
/// lookups/writes by unique key.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Insert a user. The database unique index on `email` is the arbiter
    /// of the signup race, surfaced as [`StoreError::Duplicate`].
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// Overwrite the stored refresh hash. Clearing (`None`) only touches
    /// rows whose hash is currently non-null, so logging out an already
    /// logged-out user updates zero rows.
    async fn set_refresh_hash(&self, id: Uuid, hash: Option<&str>) -> anyhow::Result<()>;

    /// Compare-and-swap rotation: replace the stored refresh hash only if
    /// it still equals `prev`. Returns whether a row changed; two racing
    /// rotations on the same token see at most one `true`.
    async fn swap_refresh_hash(&self, id: Uuid, prev: &str, next: &str) -> anyhow::Result<bool>;
}

/// Postgres-backed credential store.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, first_name, last_name, password_hash, refresh_token_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, first_name, last_name, password_hash, refresh_token_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, first_name, last_name, password_hash, refresh_token_hash, created_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(classify_insert_error)?;
        Ok(row)
    }

    async fn set_refresh_hash(&self, id: Uuid, hash: Option<&str>) -> anyhow::Result<()> {
        match hash {
            Some(h) => {
                sqlx::query("UPDATE users SET refresh_token_hash = $2 WHERE id = $1")
                    .bind(id)
                    .bind(h)
                    .execute(&self.db)
                    .await?;
            }
            None => {
                sqlx::query(
                    "UPDATE users SET refresh_token_hash = NULL \
                     WHERE id = $1 AND refresh_token_hash IS NOT NULL",
                )
                .bind(id)
                .execute(&self.db)
                .await?;
            }
        }
        Ok(())
    }

    async fn swap_refresh_hash(&self, id: Uuid, prev: &str, next: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $3 \
             WHERE id = $1 AND refresh_token_hash = $2",
        )
        .bind(id)
        .bind(prev)
        .bind(next)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

// PostgreSQL unique constraint violation: error code 23505
fn classify_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::Duplicate;
        }
    }
    StoreError::Other(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_json_never_leaks_hashes() {
        let user = User {
            id: Uuid::new_v4(),
            email: "u@example.com".into(),
            first_name: Some("Ada".into()),
            last_name: None,
            password_hash: "$argon2id$v=19$secret".into(),
            refresh_token_hash: Some("$argon2id$v=19$refresh".into()),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("refresh_token_hash"));
        assert!(!json.contains("argon2id"));
        assert!(json.contains("u@example.com"));
    }
}
