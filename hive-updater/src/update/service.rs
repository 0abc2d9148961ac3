//! Update service implementation.
//!
//! The UpdateService receives fetch completions one at a time, merges them
//! into the composite cache and dispatches the consumers they satisfy.
//!
//! Callers must not issue overlapping fetches for the same (player, data
//! kind) pair; merges for one field are applied in completion order.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use hive_api::{GameType, GameTypeRecord, PlayerId, PlayerInfo};
use tracing::{debug, trace};

use super::cache::{CompositeCache, CompositeEntry};
use super::clock::{Clock, SystemClock};
use super::gate::{DispatchGate, GateDecision};
use super::registry::{Consumer, ConsumerRegistry, Registration, RegistrationId};
use super::report::ErrorReporter;
use super::source::FetchSource;
use super::stats::UpdateStats;
use super::types::{DataKind, FetchedRecord};
use crate::Error;

/// Default max cache age passed to the fetch source (1 hour).
const DEFAULT_MAX_CACHE_AGE: Duration = Duration::from_secs(60 * 60);

/// Max cache age for the player info fetch that accompanies game type
/// requests (30 days); it only has to be present in the cache. The fetch is
/// skipped when the composite cache already holds player info: a cached
/// answer arriving ahead of the game types would dispatch multi-game
/// consumers with the previous round's records and stamp them, rate limiting
/// the fresh merges that follow.
const PLAYER_INFO_PRESENCE_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 30);

#[derive(Debug, Clone)]
pub struct UpdateServiceConfig {
    pub default_max_cache_age: Duration,
    pub player_info_presence_age: Duration,
}

impl Default for UpdateServiceConfig {
    fn default() -> Self {
        Self {
            default_max_cache_age: DEFAULT_MAX_CACHE_AGE,
            player_info_presence_age: PLAYER_INFO_PRESENCE_AGE,
        }
    }
}

/// What happened to the registrations evaluated for one fetch completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub dispatched: usize,
    pub rate_limited: usize,
    pub unsatisfied: usize,
    /// Consumers that were invoked but failed.
    pub failed: usize,
    /// Fetches that failed before anything could be merged.
    pub fetch_failures: usize,
}

impl DispatchReport {
    fn fetch_failed() -> Self {
        Self {
            fetch_failures: 1,
            ..Default::default()
        }
    }

    pub fn merge(mut self, other: DispatchReport) -> Self {
        self.dispatched += other.dispatched;
        self.rate_limited += other.rate_limited;
        self.unsatisfied += other.unsatisfied;
        self.failed += other.failed;
        self.fetch_failures += other.fetch_failures;
        self
    }
}

/// What one [`UpdateService::run_maintenance`] pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub evicted_players: usize,
    pub pruned_stamps: usize,
    pub evicted_responses: usize,
}

/// Population state of a player's composite entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Empty,
    PartiallyPopulated,
    /// At least one registered consumer is satisfiable.
    Populated { satisfied: usize },
}

/// The update coordinator.
///
/// Constructed once at startup and shared as `Arc<UpdateService>` with the
/// schedulers that request updates and the updaters that register consumers.
pub struct UpdateService {
    cache: CompositeCache,
    registry: ConsumerRegistry,
    gate: DispatchGate,
    source: Arc<dyn FetchSource>,
    reporter: Arc<dyn ErrorReporter>,
    clock: Arc<dyn Clock>,
    stats: Arc<UpdateStats>,
    config: UpdateServiceConfig,
}

impl UpdateService {
    pub fn new(source: Arc<dyn FetchSource>, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self::with_config(
            source,
            reporter,
            Arc::new(SystemClock),
            UpdateServiceConfig::default(),
        )
    }

    pub fn with_config(
        source: Arc<dyn FetchSource>,
        reporter: Arc<dyn ErrorReporter>,
        clock: Arc<dyn Clock>,
        config: UpdateServiceConfig,
    ) -> Self {
        Self {
            cache: CompositeCache::new(Arc::clone(&clock)),
            registry: ConsumerRegistry::new(),
            gate: DispatchGate::new(Arc::clone(&clock)),
            source,
            reporter,
            clock,
            stats: Arc::new(UpdateStats::new()),
            config,
        }
    }

    pub fn cache(&self) -> &CompositeCache {
        &self.cache
    }

    pub fn registry(&self) -> &ConsumerRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<UpdateStats> {
        &self.stats
    }

    pub fn config(&self) -> &UpdateServiceConfig {
        &self.config
    }

    pub fn snapshot(&self, player: &PlayerId) -> Option<CompositeEntry> {
        self.cache.snapshot(player)
    }

    // ========== Registration ==========

    pub fn register(
        &self,
        name: impl Into<String>,
        required: impl IntoIterator<Item = GameType>,
        consumer: Arc<dyn Consumer>,
        min_interval: Duration,
    ) -> RegistrationId {
        self.registry.register(name, required, consumer, min_interval)
    }

    pub fn register_player_info(
        &self,
        name: impl Into<String>,
        consumer: Arc<dyn Consumer>,
        min_interval: Duration,
    ) -> RegistrationId {
        self.registry.register_player_info(name, consumer, min_interval)
    }

    // ========== Fetch completions ==========

    /// Merge fetched player info and dispatch every consumer it satisfies.
    pub async fn on_player_info_fetched(
        &self,
        player: &PlayerId,
        info: PlayerInfo,
    ) -> DispatchReport {
        self.stats.record_fetched(DataKind::PlayerInfo);
        self.cache.merge_player_info(player, info);
        self.dispatch(player, DataKind::PlayerInfo).await
    }

    /// Merge a fetched game type record and dispatch the consumers that need
    /// that game type and are now satisfied.
    pub async fn on_game_type_fetched(
        &self,
        player: &PlayerId,
        record: GameTypeRecord,
    ) -> DispatchReport {
        let kind = DataKind::GameType(record.game_type);
        self.stats.record_fetched(kind);
        self.cache.merge_game_type(player, record);
        self.dispatch(player, kind).await
    }

    pub async fn on_fetched(&self, player: &PlayerId, record: FetchedRecord) -> DispatchReport {
        match record {
            FetchedRecord::PlayerInfo(info) => self.on_player_info_fetched(player, info).await,
            FetchedRecord::GameType(record) => self.on_game_type_fetched(player, record).await,
        }
    }

    /// Report a failed fetch. The cache is left untouched and nothing is
    /// dispatched.
    pub fn on_fetch_failed(&self, player: &PlayerId, kind: DataKind, error: &Error) {
        self.stats.record_fetch_error(kind, error.is_transient_fetch());
        self.reporter.report(error, &kind.context_tag(player));
    }

    // ========== Update requests ==========

    pub async fn request_player_info_update(
        &self,
        player: &PlayerId,
        max_cache_age: Duration,
    ) -> DispatchReport {
        match self.source.fetch_player_info(player, max_cache_age).await {
            Ok(info) => self.on_player_info_fetched(player, info).await,
            Err(e) => {
                self.on_fetch_failed(player, DataKind::PlayerInfo, &e);
                DispatchReport::fetch_failed()
            }
        }
    }

    pub async fn request_game_type_update(
        &self,
        player: &PlayerId,
        game_type: GameType,
        max_cache_age: Duration,
    ) -> DispatchReport {
        match self
            .source
            .fetch_game_type_info(player, game_type, max_cache_age)
            .await
        {
            Ok(record) if record.game_type == game_type => {
                self.on_game_type_fetched(player, record).await
            }
            Ok(record) => {
                let error = Error::Other(format!(
                    "fetch source returned {} record for {} request",
                    record.game_type, game_type
                ));
                self.on_fetch_failed(player, DataKind::GameType(game_type), &error);
                DispatchReport::fetch_failed()
            }
            Err(e) => {
                self.on_fetch_failed(player, DataKind::GameType(game_type), &e);
                DispatchReport::fetch_failed()
            }
        }
    }

    /// Request the given game types for a player, together with the player
    /// info when it is not cached yet, so it is present when the game types
    /// arrive.
    pub async fn request_game_types_update(
        &self,
        player: &PlayerId,
        game_types: &[GameType],
        max_cache_age: Duration,
    ) -> DispatchReport {
        let info = async {
            if self.cache.has_player_info(player) {
                DispatchReport::default()
            } else {
                self.request_player_info_update(player, self.config.player_info_presence_age)
                    .await
            }
        };
        let games = join_all(
            game_types
                .iter()
                .map(|t| self.request_game_type_update(player, *t, max_cache_age)),
        );

        let (info_report, game_reports) = futures::join!(info, games);
        game_reports
            .into_iter()
            .fold(info_report, DispatchReport::merge)
    }

    pub async fn request_all_game_types_update(
        &self,
        player: &PlayerId,
        max_cache_age: Duration,
    ) -> DispatchReport {
        self.request_game_types_update(player, &GameType::STATS_GAME_TYPES, max_cache_age)
            .await
    }

    // ========== Maintenance ==========

    /// Bound the service's long-lived state.
    ///
    /// Rate-limit stamps that can no longer limit anything are always
    /// pruned, and source responses older than `response_max_age` are
    /// dropped. Composite entries idle for `max_idle` are evicted only when
    /// it is set.
    pub fn run_maintenance(
        &self,
        max_idle: Option<Duration>,
        response_max_age: Duration,
    ) -> MaintenanceReport {
        let report = MaintenanceReport {
            evicted_players: max_idle.map_or(0, |idle| self.cache.evict_idle(idle)),
            pruned_stamps: self.registry.prune_ledgers(self.clock.now()),
            evicted_responses: self.source.evict_expired(response_max_age),
        };
        if report != MaintenanceReport::default() {
            debug!(
                evicted_players = report.evicted_players,
                pruned_stamps = report.pruned_stamps,
                evicted_responses = report.evicted_responses,
                "update service maintenance"
            );
        }
        report
    }

    // ========== Inspection ==========

    pub fn player_state(&self, player: &PlayerId) -> PlayerState {
        let Some(entry) = self.cache.snapshot(player) else {
            return PlayerState::Empty;
        };
        if entry.player_info().is_none() {
            return PlayerState::PartiallyPopulated;
        }

        let satisfied = self
            .registry
            .affected_by(DataKind::PlayerInfo)
            .iter()
            .filter(|r| entry.has_all(r.required()))
            .count();

        if satisfied == 0 {
            PlayerState::PartiallyPopulated
        } else {
            PlayerState::Populated { satisfied }
        }
    }

    // ========== Dispatch ==========

    async fn dispatch(&self, player: &PlayerId, trigger: DataKind) -> DispatchReport {
        let mut report = DispatchReport::default();
        let Some(entry) = self.cache.snapshot(player) else {
            return report;
        };

        let mut pending: Vec<(Arc<Registration>, _)> = Vec::new();
        for registration in self.registry.affected_by(trigger) {
            match self.gate.evaluate(player, &registration, &entry, trigger) {
                GateDecision::Dispatch(update) => pending.push((registration, update)),
                GateDecision::Unsatisfied { missing, .. } => {
                    trace!(
                        consumer = %registration.name(),
                        player = %player,
                        missing = ?missing,
                        "consumer not satisfied"
                    );
                    report.unsatisfied += 1;
                }
                GateDecision::RateLimited { .. } => report.rate_limited += 1,
            }
        }

        let results = join_all(pending.into_iter().map(|(registration, update)| async move {
            let result = self.gate.invoke(&registration, update).await;
            (registration, result)
        }))
        .await;

        for (registration, result) in results {
            match result {
                Ok(()) => report.dispatched += 1,
                Err(e) => {
                    report.failed += 1;
                    self.stats.record_consumer_failure(registration.name());
                    self.reporter.report(
                        &e,
                        &format!("consumer/{}/{}", registration.name(), player),
                    );
                }
            }
        }

        self.stats.record_dispatch_outcome(
            report.dispatched + report.failed,
            report.rate_limited,
            report.unsatisfied,
        );

        if report.dispatched + report.failed > 0 {
            debug!(
                player = %player,
                trigger = %trigger,
                dispatched = report.dispatched,
                failed = report.failed,
                rate_limited = report.rate_limited,
                "dispatched player update"
            );
        }

        report
    }
}
