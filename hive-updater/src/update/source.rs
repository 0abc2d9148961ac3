use std::time::Duration;

use async_trait::async_trait;
use hive_api::{GameType, GameTypeRecord, HiveClient, PlayerId, PlayerInfo};

use crate::Result;

/// Asynchronous source of player records.
///
/// `max_cache_age` is a hint the source may use for its own caching; results
/// are treated as fresh once received.
#[async_trait]
pub trait FetchSource: Send + Sync {
    async fn fetch_player_info(
        &self,
        player: &PlayerId,
        max_cache_age: Duration,
    ) -> Result<PlayerInfo>;

    async fn fetch_game_type_info(
        &self,
        player: &PlayerId,
        game_type: GameType,
        max_cache_age: Duration,
    ) -> Result<GameTypeRecord>;

    /// Drop source-side cached responses at least `max_age` old. Sources
    /// without a cache have nothing to evict.
    fn evict_expired(&self, _max_age: Duration) -> usize {
        0
    }
}

#[async_trait]
impl FetchSource for HiveClient {
    async fn fetch_player_info(
        &self,
        player: &PlayerId,
        max_cache_age: Duration,
    ) -> Result<PlayerInfo> {
        Ok(self.player_info(player, max_cache_age).await?)
    }

    async fn fetch_game_type_info(
        &self,
        player: &PlayerId,
        game_type: GameType,
        max_cache_age: Duration,
    ) -> Result<GameTypeRecord> {
        Ok(self.game_info(player, game_type, max_cache_age).await?)
    }

    fn evict_expired(&self, max_age: Duration) -> usize {
        self.evict_expired_responses(max_age)
    }
}
