//! Integration tests for the leaderboard updaters, the polling scheduler
//! and the service container.
//!
//! Leaderboards are backed by either the in-memory store or an in-memory
//! SQLite database with migrations applied.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hive_api::{GameStats, GameType, GameTypeRecord, PlayerId, PlayerInfo, Rank};
use hive_updater::config::AppConfig;
use hive_updater::notification::{NotificationEvent, NotificationService};
use hive_updater::scheduler::PollingScheduler;
use hive_updater::services::ServiceContainer;
use hive_updater::store::{
    LeaderboardFields, LeaderboardStore, MemoryLeaderboardStore, SqliteLeaderboardStore,
    init_pool, run_migrations,
};
use hive_updater::update::{FetchSource, TracingReporter, UpdateService};
use hive_updater::updaters::{RankChangeNotifier, TokenUpdater, TotalKillsUpdater};
use hive_updater::{Error, Result};
use parking_lot::Mutex;

/// Fetch source backed by mutable maps. Missing records are fetch errors.
#[derive(Default)]
struct FakeHive {
    infos: Mutex<HashMap<PlayerId, PlayerInfo>>,
    games: Mutex<HashMap<(PlayerId, GameType), GameStats>>,
}

impl FakeHive {
    fn player(&self, uuid: &str, rank: Rank, tokens: i64) {
        let info = PlayerInfo {
            uuid: PlayerId::new(uuid),
            name: format!("{uuid}_name"),
            rank,
            tokens,
            extra: Default::default(),
        };
        self.infos.lock().insert(info.uuid.clone(), info);
    }

    fn game(&self, uuid: &str, game_type: GameType, stats: GameStats) {
        self.games
            .lock()
            .insert((PlayerId::new(uuid), game_type), stats);
    }
}

#[async_trait]
impl FetchSource for FakeHive {
    async fn fetch_player_info(
        &self,
        player: &PlayerId,
        _max_cache_age: Duration,
    ) -> Result<PlayerInfo> {
        self.infos
            .lock()
            .get(player)
            .cloned()
            .ok_or_else(|| Error::Other(format!("unknown player {player}")))
    }

    async fn fetch_game_type_info(
        &self,
        player: &PlayerId,
        game_type: GameType,
        _max_cache_age: Duration,
    ) -> Result<GameTypeRecord> {
        self.games
            .lock()
            .get(&(player.clone(), game_type))
            .cloned()
            .map(|stats| GameTypeRecord::new(game_type, stats))
            .ok_or_else(|| Error::Other(format!("no {game_type} stats for {player}")))
    }
}

fn kills(kills: i64) -> GameStats {
    GameStats {
        kills: Some(kills),
        ..Default::default()
    }
}

/// A player with kills in every game type the kills board needs: 10 + 5 + (2 + 3).
fn killer(hive: &FakeHive, uuid: &str) {
    hive.player(uuid, Rank::Gold, 100);
    hive.game(uuid, GameType::Dr, kills(10));
    hive.game(uuid, GameType::Bed, kills(5));
    hive.game(
        uuid,
        GameType::Hide,
        GameStats {
            hider_kills: Some(2),
            seeker_kills: Some(3),
            ..Default::default()
        },
    );
}

async fn setup_sqlite_store() -> Arc<dyn LeaderboardStore> {
    let pool = init_pool("sqlite::memory:")
        .await
        .expect("Failed to create pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    Arc::new(SqliteLeaderboardStore::new(pool))
}

fn setup_service(hive: &Arc<FakeHive>) -> UpdateService {
    UpdateService::new(
        Arc::clone(hive) as Arc<dyn FetchSource>,
        Arc::new(TracingReporter),
    )
}

mod updater_tests {
    use super::*;

    #[tokio::test]
    async fn test_total_kills_written_once_all_games_arrive() {
        let hive = Arc::new(FakeHive::default());
        killer(&hive, "p1");
        let service = setup_service(&hive);
        let store = setup_sqlite_store().await;

        let updater = Arc::new(TotalKillsUpdater::new(
            Arc::clone(&store),
            Duration::from_secs(3600),
        ));
        updater.register(&service, Duration::ZERO);

        let report = service
            .request_game_types_update(
                &PlayerId::new("p1"),
                &GameType::kill_game_types(),
                Duration::ZERO,
            )
            .await;
        assert_eq!(report.fetch_failures, 0);
        assert_eq!(report.dispatched, 1);

        let entry = store
            .get(TotalKillsUpdater::BOARD, &PlayerId::new("p1"))
            .await
            .unwrap()
            .expect("kills row written");
        assert_eq!(entry.fields.name, "p1_name");
        assert_eq!(entry.fields.get(TotalKillsUpdater::PROPERTY), Some(20));
    }

    #[tokio::test]
    async fn test_total_kills_skips_incomplete_player() {
        let hive = Arc::new(FakeHive::default());
        hive.player("p1", Rank::Regular, 0);
        hive.game("p1", GameType::Dr, kills(4));
        let service = setup_service(&hive);
        let store = Arc::new(MemoryLeaderboardStore::new());

        let updater = Arc::new(TotalKillsUpdater::new(
            Arc::clone(&store) as Arc<dyn LeaderboardStore>,
            Duration::from_secs(3600),
        ));
        updater.register(&service, Duration::ZERO);

        let report = service
            .request_game_types_update(
                &PlayerId::new("p1"),
                &GameType::kill_game_types(),
                Duration::ZERO,
            )
            .await;

        assert_eq!(report.fetch_failures, 2);
        assert_eq!(report.dispatched, 0);
        assert_eq!(store.len(TotalKillsUpdater::BOARD), 0);
    }

    #[tokio::test]
    async fn test_tokens_board_drops_blocked_ranks() {
        let hive = Arc::new(FakeHive::default());
        hive.player("regular", Rank::Emerald, 1_500);
        hive.player("famous", Rank::Youtuber, 9_000);
        let service = setup_service(&hive);
        let store = setup_sqlite_store().await;

        store
            .upsert(
                TokenUpdater::BOARD,
                &PlayerId::new("famous"),
                LeaderboardFields::new("famous_name").with(TokenUpdater::PROPERTY, 8_000),
            )
            .await
            .unwrap();

        let updater = Arc::new(TokenUpdater::new(
            Arc::clone(&store),
            Duration::from_secs(3600),
        ));
        updater.register(&service, Duration::ZERO);

        for uuid in ["regular", "famous"] {
            service
                .request_player_info_update(&PlayerId::new(uuid), Duration::ZERO)
                .await;
        }

        let top = store
            .top(TokenUpdater::BOARD, TokenUpdater::PROPERTY, TokenUpdater::LIMIT)
            .await
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].player.as_str(), "regular");
        assert_eq!(top[0].fields.get(TokenUpdater::PROPERTY), Some(1_500));
    }

    #[tokio::test]
    async fn test_rank_change_notification() {
        let hive = Arc::new(FakeHive::default());
        hive.player("p1", Rank::Gold, 0);
        let service = setup_service(&hive);
        let notifications = Arc::new(NotificationService::new());
        let mut events = notifications.subscribe();

        let notifier = Arc::new(RankChangeNotifier::new(Arc::clone(&notifications)));
        notifier.register(&service, Duration::ZERO);

        let p1 = PlayerId::new("p1");
        service.request_player_info_update(&p1, Duration::ZERO).await;
        assert_eq!(notifier.last_seen(&p1), Some(Rank::Gold));
        assert!(events.try_recv().is_err());

        // Same rank again: nothing to announce.
        service.request_player_info_update(&p1, Duration::ZERO).await;
        assert!(events.try_recv().is_err());

        hive.player("p1", Rank::Moderator, 0);
        service.request_player_info_update(&p1, Duration::ZERO).await;

        match events.try_recv().expect("rank change event") {
            NotificationEvent::RankChanged {
                player,
                player_name,
                old_rank,
                new_rank,
                ..
            } => {
                assert_eq!(player, p1);
                assert_eq!(player_name, "p1_name");
                assert_eq!(old_rank, Rank::Gold);
                assert_eq!(new_rank, Rank::Moderator);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(notifier.last_seen(&p1), Some(Rank::Moderator));
    }
}

mod scheduler_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_polls_board_in_rounds() {
        let hive = Arc::new(FakeHive::default());
        hive.player("a", Rank::Regular, 700);
        hive.player("b", Rank::Regular, 1_200);
        let service = Arc::new(setup_service(&hive));
        let store = Arc::new(MemoryLeaderboardStore::new());

        for (uuid, tokens) in [("a", 500), ("b", 900)] {
            store
                .upsert(
                    TokenUpdater::BOARD,
                    &PlayerId::new(uuid),
                    LeaderboardFields::new(uuid).with(TokenUpdater::PROPERTY, tokens),
                )
                .await
                .unwrap();
        }

        let updater = Arc::new(TokenUpdater::new(
            Arc::clone(&store) as Arc<dyn LeaderboardStore>,
            Duration::from_secs(60),
        ));
        updater.register(&service, Duration::ZERO);

        let mut scheduler = PollingScheduler::new(
            Arc::clone(&service),
            Arc::clone(&store) as Arc<dyn LeaderboardStore>,
            updater.poll_target(),
        );

        let (first, report) = scheduler.tick().await.expect("first poll");
        assert_eq!(first.as_str(), "b");
        assert_eq!(report.dispatched, 1);
        assert_eq!(scheduler.tracked(), 2);
        assert_eq!(scheduler.waiting(), 1);

        let (second, _) = scheduler.tick().await.expect("second poll");
        assert_eq!(second.as_str(), "a");

        // Everyone is cooling down.
        assert!(scheduler.tick().await.is_none());

        let b = store
            .get(TokenUpdater::BOARD, &PlayerId::new("b"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(b.fields.get(TokenUpdater::PROPERTY), Some(1_200));
        assert_eq!(b.fields.name, "b_name");

        tokio::time::advance(Duration::from_secs(60)).await;
        let (again, _) = scheduler.tick().await.expect("next round");
        assert_eq!(again.as_str(), "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_is_retried_next_round() {
        let hive = Arc::new(FakeHive::default());
        let service = Arc::new(setup_service(&hive));
        let store = Arc::new(MemoryLeaderboardStore::new());

        let updater = Arc::new(TokenUpdater::new(
            Arc::clone(&store) as Arc<dyn LeaderboardStore>,
            Duration::from_secs(30),
        ));
        updater.register(&service, Duration::ZERO);

        let mut scheduler = PollingScheduler::new(
            Arc::clone(&service),
            Arc::clone(&store) as Arc<dyn LeaderboardStore>,
            updater.poll_target(),
        );
        assert!(scheduler.enqueue(PlayerId::new("late")));
        assert!(!scheduler.enqueue(PlayerId::new("late")));

        let (player, report) = scheduler.tick().await.expect("poll");
        assert_eq!(player.as_str(), "late");
        assert_eq!(report.fetch_failures, 1);
        assert_eq!(store.len(TokenUpdater::BOARD), 0);

        hive.player("late", Rank::Regular, 42);
        tokio::time::advance(Duration::from_secs(30)).await;

        let (player, report) = scheduler.tick().await.expect("retry");
        assert_eq!(player.as_str(), "late");
        assert_eq!(report.dispatched, 1);
        assert_eq!(store.len(TokenUpdater::BOARD), 1);
    }
}

mod container_tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            consumer_min_interval: Duration::ZERO,
            ..AppConfig::default()
        }
    }

    async fn setup_container(hive: &Arc<FakeHive>) -> ServiceContainer {
        let config = test_config();
        let pool = init_pool(&config.database_url)
            .await
            .expect("Failed to create pool");
        run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        ServiceContainer::with_source(config, pool, Arc::clone(hive) as Arc<dyn FetchSource>)
            .expect("Failed to build container")
    }

    #[tokio::test]
    async fn test_response_retention_covers_longest_interval() {
        let hive = Arc::new(FakeHive::default());
        let container = setup_container(&hive).await;
        assert_eq!(
            container.response_max_age(),
            container.update_service.config().default_max_cache_age
        );

        let config = AppConfig {
            kills_interval: Duration::from_secs(3 * 60 * 60),
            ..test_config()
        };
        let pool = init_pool(&config.database_url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let container =
            ServiceContainer::with_source(config, pool, Arc::clone(&hive) as Arc<dyn FetchSource>)
                .unwrap();
        assert_eq!(container.response_max_age(), Duration::from_secs(3 * 60 * 60));
    }

    #[tokio::test]
    async fn test_container_wires_updaters() {
        let hive = Arc::new(FakeHive::default());
        killer(&hive, "p1");
        let container = setup_container(&hive).await;

        assert_eq!(container.update_service.registry().len(), 3);

        container
            .update_service
            .request_game_types_update(
                &PlayerId::new("p1"),
                &GameType::kill_game_types(),
                Duration::ZERO,
            )
            .await;

        let p1 = PlayerId::new("p1");
        let kills = container
            .store
            .get(TotalKillsUpdater::BOARD, &p1)
            .await
            .unwrap()
            .expect("kills row");
        assert_eq!(kills.fields.get(TotalKillsUpdater::PROPERTY), Some(20));

        let tokens = container
            .store
            .get(TokenUpdater::BOARD, &p1)
            .await
            .unwrap()
            .expect("tokens row");
        assert_eq!(tokens.fields.get(TokenUpdater::PROPERTY), Some(100));
        assert_eq!(container.rank_changes.last_seen(&p1), Some(Rank::Gold));

        let stats = container.stats();
        assert_eq!(stats.cached_players, 1);
        assert_eq!(stats.consumers, 3);
        assert_eq!(stats.updates.player_info_fetched, 1);
        assert_eq!(stats.updates.game_type_fetched, 3);
    }

    #[tokio::test]
    async fn test_poll_tick_override() {
        let hive = Arc::new(FakeHive::default());
        let mut container = setup_container(&hive).await;

        let ticks: Vec<_> = container.poll_targets().iter().map(|t| t.tick).collect();
        assert_eq!(ticks, vec![TotalKillsUpdater::TICK, TokenUpdater::TICK]);

        container.config.poll_tick = Some(Duration::from_secs(1));
        assert!(
            container
                .poll_targets()
                .iter()
                .all(|t| t.tick == Duration::from_secs(1))
        );
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let hive = Arc::new(FakeHive::default());
        let container = setup_container(&hive).await;
        let mut events = container.notifications.subscribe();

        container.start().await.unwrap();
        assert!(!container.is_shutting_down());
        assert!(matches!(
            events.recv().await.unwrap(),
            NotificationEvent::SystemStartup { .. }
        ));

        container
            .shutdown_with_timeout(Duration::from_secs(5))
            .await
            .unwrap();
        assert!(container.is_shutting_down());
        assert!(matches!(
            events.recv().await.unwrap(),
            NotificationEvent::SystemShutdown { .. }
        ));
    }
}

mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_rows_survive_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("boards.db").display());
        let player = PlayerId::new("p1");

        let store = SqliteLeaderboardStore::connect(&url).await.unwrap();
        store
            .upsert(
                TotalKillsUpdater::BOARD,
                &player,
                LeaderboardFields::new("p1_name").with(TotalKillsUpdater::PROPERTY, 77),
            )
            .await
            .unwrap();
        store.pool().close().await;

        let reopened = SqliteLeaderboardStore::connect(&url).await.unwrap();
        let entry = reopened
            .get(TotalKillsUpdater::BOARD, &player)
            .await
            .unwrap()
            .expect("row persisted");
        assert_eq!(entry.fields.get(TotalKillsUpdater::PROPERTY), Some(77));
    }
}
