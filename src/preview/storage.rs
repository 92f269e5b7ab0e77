//! Durable key-value storage for preview sessions
//!
//! Sessions are stored as JSON strings under `documentpreview:<id>` keys.
//! SQLite is the production backend; the in-memory backend is the fallback
//! when no database is available.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use super::PreviewResult;

/// String key-value store
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get(&self, key: &str) -> PreviewResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PreviewResult<()>;

    /// Remove a key; absent keys are not an error
    async fn remove(&self, key: &str) -> PreviewResult<()>;
}

// ============================================================================
// SQLite
// ============================================================================

/// Sessions persisted in the `preview_sessions` table
#[derive(Clone)]
pub struct SqliteSessionStorage {
    pool: SqlitePool,
}

impl SqliteSessionStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStorage for SqliteSessionStorage {
    async fn get(&self, key: &str) -> PreviewResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM preview_sessions WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> PreviewResult<()> {
        sqlx::query(
            r#"
            INSERT INTO preview_sessions (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> PreviewResult<()> {
        sqlx::query("DELETE FROM preview_sessions WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Memory
// ============================================================================

/// Process-local storage; does not survive a restart
#[derive(Clone, Default)]
pub struct MemorySessionStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn get(&self, key: &str) -> PreviewResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PreviewResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PreviewResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
