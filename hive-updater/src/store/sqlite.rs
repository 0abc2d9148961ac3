//! SQLite leaderboard store.
//!
//! Rows live in a single `leaderboard_entries` table keyed by
//! `(board, player)`; the property map is stored as a JSON object.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hive_api::PlayerId;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::info;

use super::{LeaderboardEntry, LeaderboardFields, LeaderboardStore};
use crate::{Error, Result};

/// Database connection pool type alias.
pub type DbPool = Pool<Sqlite>;

const DEFAULT_POOL_SIZE: u32 = 5;

/// Default busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;

/// Initialize the connection pool with WAL mode.
///
/// In-memory URLs get a single connection so every query sees the same
/// database.
pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
    let max_connections = if in_memory { 1 } else { DEFAULT_POOL_SIZE };

    let mut connect_options = SqliteConnectOptions::from_str(database_url)?
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
        .create_if_missing(true);
    if !in_memory {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(connect_options)
        .await?;

    info!(max_connections, "Database pool initialized");
    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

#[derive(sqlx::FromRow)]
struct LeaderboardRow {
    player: String,
    name: String,
    data: String,
    updated_at: i64,
}

impl TryFrom<LeaderboardRow> for LeaderboardEntry {
    type Error = Error;

    fn try_from(row: LeaderboardRow) -> Result<Self> {
        Ok(Self {
            player: PlayerId::new(row.player),
            fields: LeaderboardFields {
                name: row.name,
                values: serde_json::from_str(&row.data)?,
            },
            updated_at: DateTime::<Utc>::from_timestamp_millis(row.updated_at)
                .unwrap_or_default(),
        })
    }
}

/// SQLx implementation of [`LeaderboardStore`].
pub struct SqliteLeaderboardStore {
    pool: DbPool,
}

impl SqliteLeaderboardStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open the database at `database_url` and apply pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = init_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl LeaderboardStore for SqliteLeaderboardStore {
    async fn upsert(
        &self,
        board: &str,
        player: &PlayerId,
        fields: LeaderboardFields,
    ) -> Result<()> {
        let data = serde_json::to_string(&fields.values)?;
        sqlx::query(
            r#"
            INSERT INTO leaderboard_entries (board, player, name, data, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(board, player) DO UPDATE SET
                name = excluded.name,
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(board)
        .bind(player.as_str())
        .bind(&fields.name)
        .bind(data)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, board: &str, player: &PlayerId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM leaderboard_entries WHERE board = ? AND player = ?")
            .bind(board)
            .bind(player.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, board: &str, player: &PlayerId) -> Result<Option<LeaderboardEntry>> {
        let row = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT player, name, data, updated_at FROM leaderboard_entries
            WHERE board = ? AND player = ?
            "#,
        )
        .bind(board)
        .bind(player.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(LeaderboardEntry::try_from).transpose()
    }

    async fn top(
        &self,
        board: &str,
        property: &str,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>> {
        let path = format!("$.\"{}\"", property.replace('"', ""));
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT player, name, data, updated_at FROM leaderboard_entries
            WHERE board = ?
              AND json_extract(data, ?) IS NOT NULL
            ORDER BY json_extract(data, ?) DESC, player ASC
            LIMIT ?
            "#,
        )
        .bind(board)
        .bind(&path)
        .bind(&path)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LeaderboardEntry::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteLeaderboardStore {
        SqliteLeaderboardStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = memory_store().await;
        let player = PlayerId::new("p1");

        for (name, tokens) in [("Alice", 10), ("Alicia", 42)] {
            let fields = LeaderboardFields::new(name).with("tokens", tokens);
            store.upsert("tokenLeaderboard", &player, fields).await.unwrap();
        }

        let entry = store.get("tokenLeaderboard", &player).await.unwrap().unwrap();
        assert_eq!(entry.fields.name, "Alicia");
        assert_eq!(entry.fields.get("tokens"), Some(42));
    }

    #[tokio::test]
    async fn test_top_and_remove() {
        let store = memory_store().await;
        for (id, kills) in [("a", 5), ("b", 20), ("c", 10)] {
            let fields = LeaderboardFields::new(id).with("kills", kills);
            store.upsert("kills", &PlayerId::new(id), fields).await.unwrap();
        }
        store
            .upsert("other", &PlayerId::new("z"), LeaderboardFields::new("z").with("kills", 99))
            .await
            .unwrap();

        let top = store.top("kills", "kills", 2).await.unwrap();
        let ids: Vec<_> = top.iter().map(|e| e.player.as_str().to_string()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        assert!(store.remove("kills", &PlayerId::new("b")).await.unwrap());
        assert!(!store.remove("kills", &PlayerId::new("b")).await.unwrap());
        assert_eq!(store.top("kills", "kills", 10).await.unwrap().len(), 2);
    }
}
