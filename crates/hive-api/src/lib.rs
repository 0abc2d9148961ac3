//! Typed client for the Hive game statistics API.
//!
//! The crate exposes the player and per-game-type records served by the
//! upstream API together with [`HiveClient`], a small HTTP client that keeps
//! a per-URL response cache so callers can pass a "max cache age" hint on
//! every request.

mod cache;
mod client;
mod error;
mod game_type;
mod model;

pub use cache::ResponseCache;
pub use client::{DEFAULT_BASE_URL, HiveClient, HiveClientConfig, install_rustls_provider};
pub use error::ApiError;
pub use game_type::{GameType, ParseGameTypeError};
pub use model::{GameStats, GameTypeRecord, PlayerId, PlayerInfo, Rank};
