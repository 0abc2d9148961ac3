//! Counters for fetch completions and consumer dispatches.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::types::DataKind;

#[derive(Debug, Default)]
pub struct UpdateStats {
    player_info_fetched: AtomicU64,
    game_type_fetched: AtomicU64,
    fetch_errors: DashMap<String, AtomicU64>,
    transient_fetch_errors: AtomicU64,
    dispatched: AtomicU64,
    rate_limited: AtomicU64,
    unsatisfied: AtomicU64,
    consumer_failures: DashMap<String, AtomicU64>,
}

/// Serializable copy of [`UpdateStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatsSnapshot {
    pub player_info_fetched: u64,
    pub game_type_fetched: u64,
    pub fetch_errors: BTreeMap<String, u64>,
    pub transient_fetch_errors: u64,
    pub dispatched: u64,
    pub rate_limited: u64,
    pub unsatisfied: u64,
    pub consumer_failures: BTreeMap<String, u64>,
}

impl UpdateStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetched(&self, kind: DataKind) {
        match kind {
            DataKind::PlayerInfo => self.player_info_fetched.fetch_add(1, Ordering::Relaxed),
            DataKind::GameType(_) => self.game_type_fetched.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_fetch_error(&self, kind: DataKind, transient: bool) {
        if transient {
            self.transient_fetch_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.fetch_errors
            .entry(format!("fetch-error-{}", kind.label()))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_outcome(
        &self,
        dispatched: usize,
        rate_limited: usize,
        unsatisfied: usize,
    ) {
        self.dispatched.fetch_add(dispatched as u64, Ordering::Relaxed);
        self.rate_limited.fetch_add(rate_limited as u64, Ordering::Relaxed);
        self.unsatisfied.fetch_add(unsatisfied as u64, Ordering::Relaxed);
    }

    pub fn record_consumer_failure(&self, consumer: &str) {
        self.consumer_failures
            .entry(consumer.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UpdateStatsSnapshot {
        let collect = |map: &DashMap<String, AtomicU64>| {
            map.iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect()
        };

        UpdateStatsSnapshot {
            player_info_fetched: self.player_info_fetched.load(Ordering::Relaxed),
            game_type_fetched: self.game_type_fetched.load(Ordering::Relaxed),
            fetch_errors: collect(&self.fetch_errors),
            transient_fetch_errors: self.transient_fetch_errors.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            unsatisfied: self.unsatisfied.load(Ordering::Relaxed),
            consumer_failures: collect(&self.consumer_failures),
        }
    }
}
