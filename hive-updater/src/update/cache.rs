//! Composite cache of the latest known records per player.
//!
//! Each player entry holds the last fetched player info and the last fetched
//! record of every game type fetched so far. Records are replaced wholesale
//! on merge and are never partially applied.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hive_api::{GameType, GameTypeRecord, PlayerId, PlayerInfo};
use tracing::debug;

use super::clock::Clock;

/// Merged view of one player's fetched data.
#[derive(Debug, Clone)]
pub struct CompositeEntry {
    player_info: Option<Arc<PlayerInfo>>,
    game_types: HashMap<GameType, Arc<GameTypeRecord>>,
    updated_at: DateTime<Utc>,
}

impl CompositeEntry {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            player_info: None,
            game_types: HashMap::new(),
            updated_at: now,
        }
    }

    pub fn player_info(&self) -> Option<&Arc<PlayerInfo>> {
        self.player_info.as_ref()
    }

    pub fn game_type(&self, game_type: GameType) -> Option<&Arc<GameTypeRecord>> {
        self.game_types.get(&game_type)
    }

    pub fn game_types(&self) -> impl Iterator<Item = GameType> + '_ {
        self.game_types.keys().copied()
    }

    pub fn game_type_count(&self) -> usize {
        self.game_types.len()
    }

    /// Required game types that have not been fetched yet.
    pub fn missing(&self, required: &BTreeSet<GameType>) -> Vec<GameType> {
        required
            .iter()
            .filter(|t| !self.game_types.contains_key(*t))
            .copied()
            .collect()
    }

    pub fn has_all(&self, required: &BTreeSet<GameType>) -> bool {
        required.iter().all(|t| self.game_types.contains_key(t))
    }

    /// When the entry last received a merge.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Thread-safe store of composite entries keyed by player.
///
/// Merges for different players never contend; merges for one player are
/// serialized by the map's per-key locking. Readers get copies.
pub struct CompositeCache {
    entries: DashMap<PlayerId, CompositeEntry>,
    clock: Arc<dyn Clock>,
}

impl CompositeCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Replace the player info of `player`, creating the entry if needed.
    pub fn merge_player_info(&self, player: &PlayerId, info: PlayerInfo) {
        let now = self.clock.now();
        let mut entry = self
            .entries
            .entry(player.clone())
            .or_insert_with(|| CompositeEntry::new(now));
        entry.player_info = Some(Arc::new(info));
        entry.updated_at = now;
    }

    /// Replace the record of `record.game_type` for `player`, creating the
    /// entry if needed.
    pub fn merge_game_type(&self, player: &PlayerId, record: GameTypeRecord) {
        let now = self.clock.now();
        let mut entry = self
            .entries
            .entry(player.clone())
            .or_insert_with(|| CompositeEntry::new(now));
        entry.game_types.insert(record.game_type, Arc::new(record));
        entry.updated_at = now;
    }

    /// Point-in-time copy of a player's entry.
    pub fn snapshot(&self, player: &PlayerId) -> Option<CompositeEntry> {
        self.entries.get(player).map(|entry| entry.value().clone())
    }

    pub fn has_player_info(&self, player: &PlayerId) -> bool {
        self.entries
            .get(player)
            .is_some_and(|entry| entry.player_info.is_some())
    }

    pub fn contains(&self, player: &PlayerId) -> bool {
        self.entries.contains_key(player)
    }

    pub fn remove(&self, player: &PlayerId) -> Option<CompositeEntry> {
        self.entries.remove(player).map(|(_, entry)| entry)
    }

    pub fn players(&self) -> Vec<PlayerId> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries that have not been merged into for at least `max_idle`.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = self.clock.now();
        let before = self.len();
        self.entries.retain(|_, entry| {
            let idle = (now - entry.updated_at).to_std().unwrap_or(Duration::ZERO);
            idle < max_idle
        });
        let evicted = before.saturating_sub(self.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.len(), "evicted idle cache entries");
        }
        evicted
    }
}
