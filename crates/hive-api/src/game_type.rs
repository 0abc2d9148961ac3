use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Game modes whose per-player statistics the API serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameType {
    Bp,
    Dr,
    Hide,
    Sp,
    Timv,
    Draw,
    Grav,
    Bed,
    Sky,
    Gnt,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown game type: {0}")]
pub struct ParseGameTypeError(pub String);

impl GameType {
    pub const ALL: [GameType; 10] = [
        GameType::Bp,
        GameType::Dr,
        GameType::Hide,
        GameType::Sp,
        GameType::Timv,
        GameType::Draw,
        GameType::Grav,
        GameType::Bed,
        GameType::Sky,
        GameType::Gnt,
    ];

    /// The game types the "all game infos" updaters track.
    pub const STATS_GAME_TYPES: [GameType; 8] = [
        GameType::Bp,
        GameType::Dr,
        GameType::Hide,
        GameType::Sp,
        GameType::Timv,
        GameType::Draw,
        GameType::Grav,
        GameType::Bed,
    ];

    /// Upstream identifier, used in request paths.
    pub fn id(self) -> &'static str {
        match self {
            Self::Bp => "BP",
            Self::Dr => "DR",
            Self::Hide => "HIDE",
            Self::Sp => "SP",
            Self::Timv => "TIMV",
            Self::Draw => "DRAW",
            Self::Grav => "GRAV",
            Self::Bed => "BED",
            Self::Sky => "SKY",
            Self::Gnt => "GNT",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bp => "BlockParty",
            Self::Dr => "DeathRun",
            Self::Hide => "Hide and Seek",
            Self::Sp => "Splegg",
            Self::Timv => "Trouble in Mineville",
            Self::Draw => "Draw It",
            Self::Grav => "Gravity",
            Self::Bed => "BedWars",
            Self::Sky => "SkyWars",
            Self::Gnt => "SkyGiants",
        }
    }

    /// Whether the game's stats carry a plain `kills` counter.
    ///
    /// HIDE reports kills split into hider and seeker kills instead.
    pub fn has_kills(self) -> bool {
        matches!(self, Self::Dr | Self::Bed | Self::Sky | Self::Gnt)
    }

    /// Tracked game types that contribute to a total kill count.
    pub fn kill_game_types() -> Vec<GameType> {
        let mut types: Vec<GameType> = Self::STATS_GAME_TYPES
            .into_iter()
            .filter(|t| t.has_kills())
            .collect();
        types.push(GameType::Hide);
        types
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for GameType {
    type Err = ParseGameTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.id().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseGameTypeError(trimmed.to_string()))
    }
}
