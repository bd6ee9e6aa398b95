//! User store repository
//!
//! The identity records are owned by an external store; this module is the
//! seam the rest of the crate talks through. `SqliteUserStore` is the
//! shipped implementation, tests substitute their own.

use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::auth::models::User;
use crate::common::safe_email_log;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection pool exhausted; the one error class callers may retry.
    #[error("user store connection pool exhausted")]
    PoolExhausted,

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("user store error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

/// Fields for a new identity row. The store owns id and timestamps.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub profile_image: Option<String>,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub google_email: Option<String>,
    pub google_refresh_token: Option<String>,
    pub tier: String,
    pub credits: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError>;

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Attaches a Google identity to an existing local account. The password
    /// hash is untouched; the profile image is filled in only when the row
    /// has none.
    async fn attach_google(
        &self,
        id: &str,
        google_id: &str,
        google_email: &str,
        refresh_token: Option<&str>,
        profile_image: Option<&str>,
    ) -> Result<User, StoreError>;

    /// Refreshes the stored provider refresh token on an already-linked
    /// account, backfilling the profile image only when the row has none.
    async fn update_google_session(
        &self,
        id: &str,
        refresh_token: Option<&str>,
        profile_image: Option<&str>,
    ) -> Result<User, StoreError>;
}

pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_by_id(&self, id: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE google_id = ?")
            .bind(google_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let id = Uuid::new_v4().to_string();
        let email = new_user.email.to_lowercase();

        debug!(
            user_id = %id,
            email = %safe_email_log(&email),
            "Inserting new user record"
        );

        sqlx::query(
            r#"
            INSERT INTO users
                (id, email, name, profile_image, password_hash,
                 google_id, google_email, google_refresh_token, tier, credits)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&email)
        .bind(new_user.name.as_deref())
        .bind(new_user.profile_image.as_deref())
        .bind(new_user.password_hash.as_deref())
        .bind(new_user.google_id.as_deref())
        .bind(new_user.google_email.as_deref())
        .bind(new_user.google_refresh_token.as_deref())
        .bind(&new_user.tier)
        .bind(&new_user.credits)
        .execute(&self.pool)
        .await?;

        self.fetch_by_id(&id).await
    }

    async fn attach_google(
        &self,
        id: &str,
        google_id: &str,
        google_email: &str,
        refresh_token: Option<&str>,
        profile_image: Option<&str>,
    ) -> Result<User, StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET google_id = ?,
                google_email = ?,
                google_refresh_token = ?,
                profile_image = COALESCE(profile_image, ?),
                updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(google_id)
        .bind(google_email)
        .bind(refresh_token)
        .bind(profile_image)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.fetch_by_id(id).await
    }

    async fn update_google_session(
        &self,
        id: &str,
        refresh_token: Option<&str>,
        profile_image: Option<&str>,
    ) -> Result<User, StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET google_refresh_token = COALESCE(?, google_refresh_token),
                profile_image = COALESCE(profile_image, ?),
                updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(refresh_token)
        .bind(profile_image)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.fetch_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> SqliteUserStore {
        // Single connection so the in-memory database is shared
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::common::migrations::run_migrations(&pool).await.unwrap();
        SqliteUserStore::new(pool)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: Some("Test User".to_string()),
            tier: "Free".to_string(),
            credits: "10".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn email_lookup_is_case_insensitive() {
        let store = test_store().await;
        store.create(new_user("User@Example.com")).await.unwrap();

        let found = store.find_by_email("uSeR@eXaMpLe.CoM").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().email, "user@example.com");
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let store = test_store().await;
        store.create(new_user("dup@example.com")).await.unwrap();

        let err = store.create(new_user("DUP@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn attach_google_preserves_password_and_backfills_image() {
        let store = test_store().await;
        let mut seed = new_user("local@example.com");
        seed.password_hash = Some("hash".to_string());
        let user = store.create(seed).await.unwrap();

        let linked = store
            .attach_google(
                &user.id,
                "google-123",
                "local@example.com",
                Some("rt-1"),
                Some("https://img.example/p.png"),
            )
            .await
            .unwrap();

        assert_eq!(linked.google_id.as_deref(), Some("google-123"));
        assert_eq!(linked.password_hash.as_deref(), Some("hash"));
        assert_eq!(
            linked.profile_image.as_deref(),
            Some("https://img.example/p.png")
        );
    }

    #[tokio::test]
    async fn update_google_session_never_overwrites_existing_image() {
        let store = test_store().await;
        let mut seed = new_user("pic@example.com");
        seed.profile_image = Some("user-chosen.png".to_string());
        seed.google_id = Some("google-9".to_string());
        let user = store.create(seed).await.unwrap();

        let updated = store
            .update_google_session(&user.id, Some("rt-2"), Some("provider.png"))
            .await
            .unwrap();

        assert_eq!(updated.profile_image.as_deref(), Some("user-chosen.png"));
        assert_eq!(updated.google_refresh_token.as_deref(), Some("rt-2"));
    }
}
