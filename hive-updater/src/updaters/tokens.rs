use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hive_api::{PlayerInfo, Rank};
use tracing::trace;

use super::{PollTarget, UpdateRequest};
use crate::Result;
use crate::store::{LeaderboardFields, LeaderboardStore};
use crate::update::{Consumer, PlayerUpdate, RegistrationId, UpdateService};

/// Players at or above this balance are treated as bogus accounts.
const MAX_TOKENS: i64 = 100_000_000;

/// Keeps the token leaderboard, excluding special ranks.
pub struct TokenUpdater {
    store: Arc<dyn LeaderboardStore>,
    interval: Duration,
}

impl TokenUpdater {
    pub const ID: &'static str = "leaderboard_tokens";
    pub const BOARD: &'static str = "tokenLeaderboard";
    pub const PROPERTY: &'static str = "tokens";
    pub const LIMIT: usize = 200;
    pub const TICK: Duration = Duration::from_secs(10);

    /// Ranks never listed on the board.
    pub const BLOCKED_RANKS: [Rank; 7] = [
        Rank::Vip,
        Rank::Developer,
        Rank::Owner,
        Rank::StaffManager,
        Rank::Youtuber,
        Rank::Streamer,
        Rank::Contributor,
    ];

    pub fn new(store: Arc<dyn LeaderboardStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    pub fn register(
        self: &Arc<Self>,
        service: &UpdateService,
        min_interval: Duration,
    ) -> RegistrationId {
        service.register_player_info(Self::ID, Arc::clone(self) as Arc<dyn Consumer>, min_interval)
    }

    pub fn poll_target(&self) -> PollTarget {
        PollTarget {
            name: Self::ID,
            board: Self::BOARD,
            property: Self::PROPERTY,
            limit: Self::LIMIT,
            interval: self.interval,
            tick: Self::TICK,
            request: UpdateRequest::PlayerInfo,
        }
    }

    pub fn is_listed(info: &PlayerInfo) -> bool {
        !Self::BLOCKED_RANKS.contains(&info.rank) && info.tokens < MAX_TOKENS
    }
}

#[async_trait]
impl Consumer for TokenUpdater {
    async fn consume(&self, update: PlayerUpdate) -> Result<()> {
        let info = &update.player_info;
        if Self::is_listed(info) {
            trace!(player = %update.player, tokens = info.tokens, "Updating tokens");
            self.store
                .upsert(
                    Self::BOARD,
                    &update.player,
                    LeaderboardFields::new(info.name.clone()).with(Self::PROPERTY, info.tokens),
                )
                .await
        } else {
            trace!(player = %update.player, rank = %info.rank, "Removing player from token board");
            self.store.remove(Self::BOARD, &update.player).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_api::PlayerId;

    fn info(rank: Rank, tokens: i64) -> PlayerInfo {
        PlayerInfo {
            uuid: PlayerId::new("p1"),
            name: "p1".to_string(),
            rank,
            tokens,
            extra: Default::default(),
        }
    }

    #[test]
    fn test_is_listed() {
        assert!(TokenUpdater::is_listed(&info(Rank::Gold, 5_000)));
        assert!(TokenUpdater::is_listed(&info(Rank::Moderator, 5_000)));
        assert!(!TokenUpdater::is_listed(&info(Rank::Youtuber, 5_000)));
        assert!(!TokenUpdater::is_listed(&info(Rank::Regular, MAX_TOKENS)));
        assert!(TokenUpdater::is_listed(&info(Rank::Regular, MAX_TOKENS - 1)));
    }
}
