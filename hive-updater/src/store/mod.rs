//! Leaderboard persistence.
//!
//! Boards are named collections of per-player rows. Each row carries the
//! player's display name and a set of integer properties (`kills`,
//! `tokens`, ...) that boards are ordered by.

mod memory;
mod sqlite;

pub use memory::MemoryLeaderboardStore;
pub use sqlite::{DbPool, SqliteLeaderboardStore, init_pool, run_migrations};

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hive_api::PlayerId;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Values written for one player on one board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardFields {
    pub name: String,
    pub values: BTreeMap<String, i64>,
}

impl LeaderboardFields {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, property: impl Into<String>, value: i64) -> Self {
        self.values.insert(property.into(), value);
        self
    }

    pub fn get(&self, property: &str) -> Option<i64> {
        self.values.get(property).copied()
    }
}

/// A stored leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player: PlayerId,
    pub fields: LeaderboardFields,
    pub updated_at: DateTime<Utc>,
}

/// Leaderboard storage trait.
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Insert or replace the player's row on `board`.
    async fn upsert(&self, board: &str, player: &PlayerId, fields: LeaderboardFields) -> Result<()>;

    /// Remove the player's row. Returns whether a row existed.
    async fn remove(&self, board: &str, player: &PlayerId) -> Result<bool>;

    async fn get(&self, board: &str, player: &PlayerId) -> Result<Option<LeaderboardEntry>>;

    /// Rows with the highest `property`, descending. Rows without the
    /// property are excluded.
    async fn top(&self, board: &str, property: &str, limit: usize) -> Result<Vec<LeaderboardEntry>>;
}
