//! SQLite-backed entity store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::traits::{AccessLink, Channel, ChannelStore, LinkStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(db_path: &str) -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        migrate(&pool).await?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn in_memory() -> anyhow::Result<Self> {
        // A single connection keeps the one shared in-memory database alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        migrate(&pool).await?;
        Ok(Self { pool })
    }
}

/// Idempotent schema setup, safe to run on every start.
async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS channels (
            id TEXT PRIMARY KEY,
            channel_id TEXT NOT NULL UNIQUE,
            added_by INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_channels_created_at ON channels(created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS access_links (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            updated_by INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_access_links_created_at ON access_links(created_at)",
    )
    .execute(pool)
    .await?;

    info!("Database migrations complete");
    Ok(())
}

fn channel_from_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Channel> {
    let created_at: String = row.get("created_at");
    Ok(Channel {
        id: row.get("id"),
        channel_id: row.get("channel_id"),
        added_by: row.get::<i64, _>("added_by") as u64,
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
    })
}

fn link_from_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<AccessLink> {
    let created_at: String = row.get("created_at");
    Ok(AccessLink {
        id: row.get("id"),
        url: row.get("url"),
        updated_by: row.get::<i64, _>("updated_by") as u64,
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
    })
}

#[async_trait]
impl ChannelStore for SqliteStore {
    async fn list_channels(&self) -> anyhow::Result<Vec<Channel>> {
        let rows = sqlx::query("SELECT * FROM channels ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(channel_from_row).collect()
    }

    async fn find_channel(&self, channel_id: &str) -> anyhow::Result<Option<Channel>> {
        let row = sqlx::query("SELECT * FROM channels WHERE channel_id = ?")
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(channel_from_row).transpose()
    }

    async fn get_channel(&self, id: &str) -> anyhow::Result<Option<Channel>> {
        let row = sqlx::query("SELECT * FROM channels WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(channel_from_row).transpose()
    }

    async fn create_channel(&self, channel_id: &str, added_by: u64) -> anyhow::Result<Channel> {
        let channel = Channel {
            id: uuid::Uuid::new_v4().to_string(),
            channel_id: channel_id.to_string(),
            added_by,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO channels (id, channel_id, added_by, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&channel.id)
        .bind(&channel.channel_id)
        .bind(channel.added_by as i64)
        .bind(channel.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(channel)
    }

    async fn delete_channel(&self, id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM channels WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LinkStore for SqliteStore {
    async fn list_links(&self) -> anyhow::Result<Vec<AccessLink>> {
        let rows = sqlx::query("SELECT * FROM access_links ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(link_from_row).collect()
    }

    async fn find_link(&self, url: &str) -> anyhow::Result<Option<AccessLink>> {
        let row = sqlx::query("SELECT * FROM access_links WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(link_from_row).transpose()
    }

    async fn get_link(&self, id: &str) -> anyhow::Result<Option<AccessLink>> {
        let row = sqlx::query("SELECT * FROM access_links WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(link_from_row).transpose()
    }

    async fn create_link(&self, url: &str, updated_by: u64) -> anyhow::Result<AccessLink> {
        let link = AccessLink {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            updated_by,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO access_links (id, url, updated_by, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&link.id)
        .bind(&link.url)
        .bind(link.updated_by as i64)
        .bind(link.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(link)
    }

    async fn delete_link(&self, id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM access_links WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
