use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use hive_api::{PlayerId, Rank};
use tracing::info;

use crate::Result;
use crate::notification::{NotificationEvent, NotificationService};
use crate::update::{Consumer, PlayerUpdate, RegistrationId, UpdateService};

/// Emits a notification when a player's rank differs from the one last seen.
///
/// The first rank seen for a player is only remembered.
pub struct RankChangeNotifier {
    notifications: Arc<NotificationService>,
    last_seen: DashMap<PlayerId, Rank>,
}

impl RankChangeNotifier {
    pub const ID: &'static str = "rank_change";

    pub fn new(notifications: Arc<NotificationService>) -> Self {
        Self {
            notifications,
            last_seen: DashMap::new(),
        }
    }

    pub fn register(
        self: &Arc<Self>,
        service: &UpdateService,
        min_interval: Duration,
    ) -> RegistrationId {
        service.register_player_info(Self::ID, Arc::clone(self) as Arc<dyn Consumer>, min_interval)
    }

    pub fn last_seen(&self, player: &PlayerId) -> Option<Rank> {
        self.last_seen.get(player).map(|r| r.value().clone())
    }
}

#[async_trait]
impl Consumer for RankChangeNotifier {
    async fn consume(&self, update: PlayerUpdate) -> Result<()> {
        let new_rank = update.player_info.rank.clone();
        let previous = self.last_seen.insert(update.player.clone(), new_rank.clone());

        let Some(old_rank) = previous.filter(|old| *old != new_rank) else {
            return Ok(());
        };

        info!(
            player = %update.player,
            name = %update.player_info.name,
            old_rank = %old_rank,
            new_rank = %new_rank,
            "Rank changed"
        );
        self.notifications
            .notify(NotificationEvent::rank_changed(
                update.player,
                update.player_info.name.clone(),
                old_rank,
                new_rank,
            ))
            .await;
        Ok(())
    }
}
