//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL)
        .execute(pool)
        .await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Preview sessions (key = documentpreview:<session id>, value = session JSON).
-- Rows live until a viewer clears them; there is no expiry. Mounted viewers
-- are likewise kept in memory until disposed (see preview::registry).
CREATE TABLE IF NOT EXISTS preview_sessions (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
