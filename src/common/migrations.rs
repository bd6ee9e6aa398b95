// Database migrations, run once at startup

use sqlx::SqlitePool;
use tracing::info;

/// Creates the schema if it does not exist yet.
///
/// Email uniqueness is case-insensitive (COLLATE NOCASE) so the unique
/// index stays the single arbiter for duplicate accounts no matter which
/// credential path writes the row.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            name TEXT,
            profile_image TEXT,
            password_hash TEXT,
            google_id TEXT UNIQUE,
            google_email TEXT,
            google_refresh_token TEXT,
            tier TEXT NOT NULL DEFAULT 'Free',
            credits TEXT NOT NULL DEFAULT '10',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_google_id ON users(google_id)")
        .execute(pool)
        .await?;

    info!("Database migrations complete");
    Ok(())
}
