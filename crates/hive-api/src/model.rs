//! Records served by the statistics API.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::GameType;

/// Unique player key (the UUID the API reports, or a name before it is resolved).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Player rank as reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Rank {
    #[default]
    Regular,
    Gold,
    Diamond,
    Emerald,
    Ultimate,
    Vip,
    Youtuber,
    Streamer,
    Contributor,
    Moderator,
    SeniorModerator,
    Developer,
    Owner,
    StaffManager,
    Other(String),
}

impl Rank {
    /// Parse the upstream rank name leniently; unknown names are kept verbatim.
    pub fn from_name(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" | "regular" | "regular hive member" => Self::Regular,
            "gold" | "gold hive member" => Self::Gold,
            "diamond" | "diamond hive member" => Self::Diamond,
            "emerald" | "lifetime emerald hive member" | "emerald hive member" => Self::Emerald,
            "ultimate" | "ultimate hive member" => Self::Ultimate,
            "vip" | "vip player" => Self::Vip,
            "youtuber" => Self::Youtuber,
            "streamer" => Self::Streamer,
            "contributor" => Self::Contributor,
            "moderator" | "hive moderator" => Self::Moderator,
            "senior moderator" | "senior hive moderator" | "srmoderator" => {
                Self::SeniorModerator
            }
            "developer" | "hive developer" => Self::Developer,
            "owner" | "hive founder and owner" => Self::Owner,
            "staff manager" | "staffmanager" => Self::StaffManager,
            _ => Self::Other(name.trim().to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Regular => "Regular",
            Self::Gold => "Gold",
            Self::Diamond => "Diamond",
            Self::Emerald => "Emerald",
            Self::Ultimate => "Ultimate",
            Self::Vip => "VIP",
            Self::Youtuber => "YouTuber",
            Self::Streamer => "Streamer",
            Self::Contributor => "Contributor",
            Self::Moderator => "Moderator",
            Self::SeniorModerator => "Senior Moderator",
            Self::Developer => "Developer",
            Self::Owner => "Owner",
            Self::StaffManager => "Staff Manager",
            Self::Other(name) => name,
        }
    }

    /// Whether the rank belongs to the server team.
    pub fn is_staff(&self) -> bool {
        matches!(
            self,
            Self::Moderator
                | Self::SeniorModerator
                | Self::Developer
                | Self::Owner
                | Self::StaffManager
        )
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for Rank {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<Rank> for String {
    fn from(value: Rank) -> Self {
        value.name().to_string()
    }
}

/// General profile of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    #[serde(rename = "UUID")]
    pub uuid: PlayerId,
    #[serde(rename = "username")]
    pub name: String,
    #[serde(rename = "rankName", default)]
    pub rank: Rank,
    #[serde(default)]
    pub tokens: i64,
    /// Remaining upstream fields, kept untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Statistics of one player in one game type.
///
/// Game types report different counters, so everything besides the shared
/// fields is optional and anything unknown lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    #[serde(rename = "total_points", default)]
    pub points: Option<i64>,
    #[serde(default)]
    pub victories: Option<i64>,
    #[serde(default)]
    pub games_played: Option<i64>,
    #[serde(default)]
    pub kills: Option<i64>,
    #[serde(default)]
    pub deaths: Option<i64>,
    #[serde(rename = "hiderkills", default)]
    pub hider_kills: Option<i64>,
    #[serde(rename = "seekerkills", default)]
    pub seeker_kills: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GameStats {
    /// Kills in this game type, summing hider and seeker kills where reported.
    pub fn total_kills(&self) -> i64 {
        match (self.hider_kills, self.seeker_kills) {
            (Some(hider), Some(seeker)) => hider + seeker,
            _ => self.kills.unwrap_or(0),
        }
    }
}

/// Per-(player, game type) statistics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameTypeRecord {
    pub game_type: GameType,
    pub stats: GameStats,
}

impl GameTypeRecord {
    pub fn new(game_type: GameType, stats: GameStats) -> Self {
        Self { game_type, stats }
    }
}
