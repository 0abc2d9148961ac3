use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use hive_api::{GameType, GameTypeRecord, PlayerId, PlayerInfo};

/// The kinds of data fetched for a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataKind {
    PlayerInfo,
    GameType(GameType),
}

impl DataKind {
    /// Context tag used when reporting failures for this kind of data.
    pub fn context_tag(&self, player: &PlayerId) -> String {
        match self {
            Self::PlayerInfo => format!("player/{player}"),
            Self::GameType(game_type) => format!("player/{player}/{}", game_type.id()),
        }
    }

    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PlayerInfo => "player-info",
            Self::GameType(_) => "player-info-gametype",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayerInfo => f.write_str("player-info"),
            Self::GameType(game_type) => write!(f, "game-type/{}", game_type.id()),
        }
    }
}

/// A successfully fetched record, tagged by kind.
#[derive(Debug, Clone)]
pub enum FetchedRecord {
    PlayerInfo(PlayerInfo),
    GameType(GameTypeRecord),
}

impl FetchedRecord {
    pub fn kind(&self) -> DataKind {
        match self {
            Self::PlayerInfo(_) => DataKind::PlayerInfo,
            Self::GameType(record) => DataKind::GameType(record.game_type),
        }
    }
}

/// Immutable view of a player's composite data handed to a consumer.
///
/// `game_infos` holds exactly the game types the consumer registered for.
#[derive(Debug, Clone)]
pub struct PlayerUpdate {
    pub player: PlayerId,
    pub player_info: Arc<PlayerInfo>,
    pub game_infos: BTreeMap<GameType, Arc<GameTypeRecord>>,
    /// The fetch completion that caused this dispatch.
    pub trigger: DataKind,
}

impl PlayerUpdate {
    pub fn game_info(&self, game_type: GameType) -> Option<&GameTypeRecord> {
        self.game_infos.get(&game_type).map(Arc::as_ref)
    }
}
