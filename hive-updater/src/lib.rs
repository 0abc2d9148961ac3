//! hive-updater library crate.
//!
//! Coordinates asynchronous player statistics fetches with the leaderboard
//! and notification updaters that consume them.

pub mod config;
pub mod error;
pub mod logging;
pub mod notification;
pub mod scheduler;
pub mod services;
pub mod store;
pub mod update;
pub mod updaters;

pub use error::{Error, Result};
