use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hive_api::GameType;
use tracing::trace;

use super::{PollTarget, UpdateRequest};
use crate::Result;
use crate::store::{LeaderboardFields, LeaderboardStore};
use crate::update::{Consumer, PlayerUpdate, RegistrationId, UpdateService};

/// Sums kills over every game type that tracks them.
pub struct TotalKillsUpdater {
    store: Arc<dyn LeaderboardStore>,
    interval: Duration,
}

impl TotalKillsUpdater {
    pub const ID: &'static str = "leaderboard_kills";
    pub const BOARD: &'static str = "totalKillsLeaderboard";
    pub const PROPERTY: &'static str = "kills";
    pub const LIMIT: usize = 100;
    pub const TICK: Duration = Duration::from_secs(30);

    pub fn new(store: Arc<dyn LeaderboardStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    pub fn register(
        self: &Arc<Self>,
        service: &UpdateService,
        min_interval: Duration,
    ) -> RegistrationId {
        service.register(
            Self::ID,
            GameType::kill_game_types(),
            Arc::clone(self) as Arc<dyn Consumer>,
            min_interval,
        )
    }

    pub fn poll_target(&self) -> PollTarget {
        PollTarget {
            name: Self::ID,
            board: Self::BOARD,
            property: Self::PROPERTY,
            limit: Self::LIMIT,
            interval: self.interval,
            tick: Self::TICK,
            request: UpdateRequest::GameTypes(GameType::kill_game_types()),
        }
    }
}

#[async_trait]
impl Consumer for TotalKillsUpdater {
    async fn consume(&self, update: PlayerUpdate) -> Result<()> {
        let kills: i64 = update
            .game_infos
            .values()
            .map(|record| record.stats.total_kills())
            .sum();

        trace!(player = %update.player, kills, "Updating total kills");
        self.store
            .upsert(
                Self::BOARD,
                &update.player,
                LeaderboardFields::new(update.player_info.name.clone()).with(Self::PROPERTY, kills),
            )
            .await
    }
}
