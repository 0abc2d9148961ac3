//! Service container for dependency injection.
//!
//! The ServiceContainer wires the update service to its fetch source, error
//! reporter, updaters and pollers, and manages their lifecycle.

use std::sync::Arc;
use std::time::Duration;

use hive_api::HiveClient;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::config::AppConfig;
use crate::notification::{
    NotificationEvent, NotificationService, NotificationStats, NotifyingReporter,
};
use crate::scheduler::PollingScheduler;
use crate::store::{DbPool, LeaderboardStore, SqliteLeaderboardStore, init_pool, run_migrations};
use crate::update::{
    FetchSource, SystemClock, UpdateService, UpdateServiceConfig, UpdateStatsSnapshot,
};
use crate::updaters::{PollTarget, RankChangeNotifier, TokenUpdater, TotalKillsUpdater};

/// Default shutdown timeout.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the cache eviction period.
const MAX_EVICTION_PERIOD: Duration = Duration::from_secs(60);

/// Service container holding all application services.
pub struct ServiceContainer {
    pub config: AppConfig,
    pub pool: DbPool,
    pub store: Arc<dyn LeaderboardStore>,
    pub update_service: Arc<UpdateService>,
    pub notifications: Arc<NotificationService>,
    pub kills: Arc<TotalKillsUpdater>,
    pub tokens: Arc<TokenUpdater>,
    pub rank_changes: Arc<RankChangeNotifier>,
    cancellation_token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ServiceContainer {
    /// Connect to the database and the statistics API described by `config`.
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing service container");

        let pool = init_pool(&config.database_url).await?;
        run_migrations(&pool).await?;

        let client = HiveClient::new(&config.api_base_url)?;
        Self::with_source(config, pool, Arc::new(client))
    }

    /// Build the container around an already migrated pool and an arbitrary
    /// fetch source.
    pub fn with_source(
        config: AppConfig,
        pool: DbPool,
        source: Arc<dyn FetchSource>,
    ) -> Result<Self> {
        let store: Arc<dyn LeaderboardStore> = Arc::new(SqliteLeaderboardStore::new(pool.clone()));

        let notifications = Arc::new(NotificationService::from_urls(
            config.discord_webhook_url.as_deref(),
            config.webhook_url.as_deref(),
        ));
        let reporter = Arc::new(NotifyingReporter::new(Arc::clone(&notifications)));

        let update_service = Arc::new(UpdateService::with_config(
            source,
            reporter,
            Arc::new(SystemClock),
            UpdateServiceConfig::default(),
        ));

        let kills = Arc::new(TotalKillsUpdater::new(Arc::clone(&store), config.kills_interval));
        let tokens = Arc::new(TokenUpdater::new(Arc::clone(&store), config.tokens_interval));
        let rank_changes = Arc::new(RankChangeNotifier::new(Arc::clone(&notifications)));

        kills.register(&update_service, config.consumer_min_interval);
        tokens.register(&update_service, config.consumer_min_interval);
        rank_changes.register(&update_service, config.consumer_min_interval);

        info!(
            consumers = update_service.registry().len(),
            channels = notifications.channel_count(),
            "Service container initialized"
        );

        Ok(Self {
            config,
            pool,
            store,
            update_service,
            notifications,
            kills,
            tokens,
            rank_changes,
            cancellation_token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Poll targets with the configured tick override applied.
    pub fn poll_targets(&self) -> Vec<PollTarget> {
        [self.kills.poll_target(), self.tokens.poll_target()]
            .into_iter()
            .map(|mut target| {
                if let Some(tick) = self.config.poll_tick {
                    target.tick = tick;
                }
                target
            })
            .collect()
    }

    /// Start the pollers and background maintenance.
    pub async fn start(&self) -> Result<()> {
        let mut tasks = Vec::new();

        for target in self.poll_targets() {
            let scheduler = PollingScheduler::new(
                Arc::clone(&self.update_service),
                Arc::clone(&self.store),
                target,
            );
            tasks.push(scheduler.spawn(self.cancellation_token.child_token()));
        }

        tasks.push(self.spawn_cache_eviction());
        self.tasks.lock().extend(tasks);

        self.notifications
            .notify(NotificationEvent::SystemStartup {
                version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: chrono::Utc::now(),
            })
            .await;

        info!("Services started");
        Ok(())
    }

    /// Oldest source response still worth keeping: no request asks for
    /// anything older than the longest poll interval or the default max age.
    pub fn response_max_age(&self) -> Duration {
        [
            self.config.kills_interval,
            self.config.tokens_interval,
            self.update_service.config().default_max_cache_age,
        ]
        .into_iter()
        .max()
        .unwrap_or_default()
    }

    /// Periodically prune rate-limit stamps and expired source responses,
    /// and evict idle composite entries when `cache_max_idle` is set.
    fn spawn_cache_eviction(&self) -> JoinHandle<()> {
        let service = Arc::clone(&self.update_service);
        let cancel = self.cancellation_token.child_token();
        let max_idle = self.config.cache_max_idle;
        let response_max_age = self.response_max_age();
        let period = max_idle
            .map_or(MAX_EVICTION_PERIOD, |idle| idle / 2)
            .clamp(Duration::from_secs(1), MAX_EVICTION_PERIOD);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        service.run_maintenance(max_idle, response_max_age);
                    }
                }
            }
        })
    }

    /// Shutdown all services gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown all services gracefully with a custom timeout.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<()> {
        info!("Shutting down services (timeout: {:?})", timeout);

        self.notifications
            .notify(NotificationEvent::SystemShutdown {
                reason: "shutdown requested".to_string(),
                timestamp: chrono::Utc::now(),
            })
            .await;

        self.cancellation_token.cancel();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        let joined = tokio::time::timeout(timeout, futures::future::join_all(tasks)).await;
        if joined.is_err() {
            warn!("Shutdown timeout reached, forcing shutdown");
        }

        info!("Closing database pool...");
        self.pool.close().await;

        info!("Services shut down");
        Ok(())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            cached_players: self.update_service.cache().len(),
            consumers: self.update_service.registry().len(),
            updates: self.update_service.stats().snapshot(),
            notifications: self.notifications.stats(),
        }
    }
}

/// Service statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    /// Players with a composite cache entry.
    pub cached_players: usize,
    pub consumers: usize,
    pub updates: UpdateStatsSnapshot,
    pub notifications: NotificationStats,
}
