use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use hive_api::PlayerId;

use super::{LeaderboardEntry, LeaderboardFields, LeaderboardStore};
use crate::Result;

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryLeaderboardStore {
    boards: DashMap<String, DashMap<PlayerId, LeaderboardEntry>>,
}

impl MemoryLeaderboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, board: &str) -> usize {
        self.boards.get(board).map_or(0, |b| b.len())
    }
}

#[async_trait]
impl LeaderboardStore for MemoryLeaderboardStore {
    async fn upsert(
        &self,
        board: &str,
        player: &PlayerId,
        fields: LeaderboardFields,
    ) -> Result<()> {
        self.boards.entry(board.to_string()).or_default().insert(
            player.clone(),
            LeaderboardEntry {
                player: player.clone(),
                fields,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn remove(&self, board: &str, player: &PlayerId) -> Result<bool> {
        Ok(self
            .boards
            .get(board)
            .is_some_and(|b| b.remove(player).is_some()))
    }

    async fn get(&self, board: &str, player: &PlayerId) -> Result<Option<LeaderboardEntry>> {
        Ok(self
            .boards
            .get(board)
            .and_then(|b| b.get(player).map(|e| e.value().clone())))
    }

    async fn top(
        &self,
        board: &str,
        property: &str,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>> {
        let Some(rows) = self.boards.get(board) else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<LeaderboardEntry> = rows
            .iter()
            .filter(|e| e.fields.get(property).is_some())
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| {
            b.fields
                .get(property)
                .cmp(&a.fields.get(property))
                .then_with(|| a.player.cmp(&b.player))
        });
        entries.truncate(limit);
        Ok(entries)
    }
}
