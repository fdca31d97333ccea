//! Persistence layer.
//!
//! The [`ChatStore`] is the single source of truth for chats, participants,
//! messages and read markers. All mutation goes through the methods here;
//! nothing else in the crate writes these tables.

mod chats;
mod messages;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

pub use chats::{ChatSort, ChatSummary};
pub use messages::{HistoryEntry, MessagePreview, StoredMessage};

#[derive(Clone)]
pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    /// Connect to the database and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open a fresh private in-memory database, pinned to one pooled
    /// connection so the data survives pool checkouts. Useful for tests and
    /// local experiments.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(include_str!("schema.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// External identity entity, read-only from this core's perspective.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub nickname: String,
    pub email: String,
    pub description: Option<String>,
    pub profile_image: Option<String>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::ChatStore;

    /// Fresh in-memory store with a couple of seeded users.
    pub async fn memory_store() -> ChatStore {
        let store = ChatStore::in_memory().await.unwrap();
        for (nickname, email) in [
            ("amelia", "amelia@example.com"),
            ("bruno", "bruno@example.com"),
            ("chiyo", "chiyo@example.com"),
        ] {
            sqlx::query("INSERT INTO users (nickname, email) VALUES (?, ?)")
                .bind(nickname)
                .bind(email)
                .execute(store.pool())
                .await
                .unwrap();
        }
        store
    }
}
