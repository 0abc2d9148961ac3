//! Consumers registered with the update service.
//!
//! Leaderboard updaters write derived values to a [`LeaderboardStore`]
//! board and describe how their board should be polled through a
//! [`PollTarget`]. The rank change notifier turns player info updates into
//! notification events.
//!
//! [`LeaderboardStore`]: crate::store::LeaderboardStore

mod rank_change;
mod tokens;
mod total_kills;

pub use rank_change::RankChangeNotifier;
pub use tokens::TokenUpdater;
pub use total_kills::TotalKillsUpdater;

use std::time::Duration;

use hive_api::GameType;

/// Which records a poll requests for each player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateRequest {
    PlayerInfo,
    GameTypes(Vec<GameType>),
}

/// How a leaderboard is kept fresh by the polling scheduler.
#[derive(Debug, Clone)]
pub struct PollTarget {
    /// Updater id, used in logs.
    pub name: &'static str,
    pub board: &'static str,
    /// Property the board is ordered by.
    pub property: &'static str,
    /// Number of top rows that are polled.
    pub limit: usize,
    /// Minimum time between two polls of the same player. Also passed as
    /// the max cache age of the request.
    pub interval: Duration,
    /// Time between two polls of any player.
    pub tick: Duration,
    pub request: UpdateRequest,
}
