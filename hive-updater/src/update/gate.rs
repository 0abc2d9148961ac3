//! Dispatch gate: completeness check, per-player rate limit, isolated invocation.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use hive_api::{GameType, PlayerId};
use tracing::trace;

use super::cache::CompositeEntry;
use super::clock::Clock;
use super::registry::Registration;
use super::types::{DataKind, PlayerUpdate};
use crate::{Error, Result};

/// Outcome of evaluating one registration for one player.
#[derive(Debug)]
pub enum GateDecision {
    /// Satisfied and not rate limited; the invocation has been stamped.
    Dispatch(PlayerUpdate),
    /// Required data is not cached yet.
    Unsatisfied {
        missing_player_info: bool,
        missing: Vec<GameType>,
    },
    /// Invoked for this player too recently.
    RateLimited { remaining: Duration },
}

pub struct DispatchGate {
    clock: Arc<dyn Clock>,
}

impl DispatchGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Decide whether `registration` should be invoked for `player` given the
    /// composite snapshot `entry`.
    ///
    /// A `Dispatch` decision records the invocation time before returning, so
    /// the check and the stamp are atomic per (registration, player). Skipped
    /// invocations are dropped, not queued.
    pub fn evaluate(
        &self,
        player: &PlayerId,
        registration: &Registration,
        entry: &CompositeEntry,
        trigger: DataKind,
    ) -> GateDecision {
        let missing = entry.missing(registration.required());
        let Some(player_info) = entry.player_info() else {
            return GateDecision::Unsatisfied {
                missing_player_info: true,
                missing,
            };
        };
        if !missing.is_empty() {
            return GateDecision::Unsatisfied {
                missing_player_info: false,
                missing,
            };
        }

        if let Err(remaining) = self.try_stamp(player, registration) {
            trace!(
                consumer = %registration.name(),
                player = %player,
                remaining = ?remaining,
                "rate limited"
            );
            return GateDecision::RateLimited { remaining };
        }

        let game_infos: BTreeMap<_, _> = registration
            .required()
            .iter()
            .filter_map(|t| entry.game_type(*t).map(|record| (*t, Arc::clone(record))))
            .collect();

        GateDecision::Dispatch(PlayerUpdate {
            player: player.clone(),
            player_info: Arc::clone(player_info),
            game_infos,
            trigger,
        })
    }

    /// Invoke the registration's consumer, converting errors and panics into
    /// a consumer-local error.
    ///
    /// The rate-limit stamp is kept whatever the outcome.
    pub async fn invoke(&self, registration: &Registration, update: PlayerUpdate) -> Result<()> {
        let consumer = Arc::clone(registration.consumer());
        match AssertUnwindSafe(consumer.consume(update))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(Error::consumer(
                registration.name(),
                format!("panicked: {}", panic_message(panic.as_ref())),
            )),
        }
    }

    fn try_stamp(
        &self,
        player: &PlayerId,
        registration: &Registration,
    ) -> std::result::Result<(), Duration> {
        let now = self.clock.now();
        let interval = registration.min_interval();

        match registration.ledger().entry(player.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                Ok(())
            }
            Entry::Occupied(mut occupied) => {
                let elapsed = (now - *occupied.get()).to_std().unwrap_or(Duration::ZERO);
                if elapsed >= interval {
                    occupied.insert(now);
                    Ok(())
                } else {
                    Err(interval - elapsed)
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::{CompositeCache, ConsumerRegistry, FnConsumer, ManualClock};
    use hive_api::{GameStats, GameTypeRecord, PlayerInfo};

    fn info(uuid: &str) -> PlayerInfo {
        PlayerInfo {
            uuid: PlayerId::new(uuid),
            name: uuid.to_string(),
            rank: Default::default(),
            tokens: 0,
            extra: Default::default(),
        }
    }

    struct Fixture {
        clock: Arc<ManualClock>,
        cache: CompositeCache,
        registry: ConsumerRegistry,
        gate: DispatchGate,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::at_epoch());
        Fixture {
            cache: CompositeCache::new(clock.clone()),
            registry: ConsumerRegistry::new(),
            gate: DispatchGate::new(clock.clone()),
            clock,
        }
    }

    fn noop() -> Arc<dyn crate::update::Consumer> {
        Arc::new(FnConsumer(|_update: PlayerUpdate| async {
            Ok::<(), Error>(())
        }))
    }

    #[test]
    fn test_unsatisfied_without_player_info() {
        let f = fixture();
        let player = PlayerId::new("p1");
        let id = f
            .registry
            .register_game_type("dr", GameType::Dr, noop(), Duration::ZERO);
        let registration = f.registry.get(id).unwrap();

        f.cache
            .merge_game_type(&player, GameTypeRecord::new(GameType::Dr, GameStats::default()));
        let entry = f.cache.snapshot(&player).unwrap();

        match f
            .gate
            .evaluate(&player, &registration, &entry, DataKind::GameType(GameType::Dr))
        {
            GateDecision::Unsatisfied {
                missing_player_info,
                missing,
            } => {
                assert!(missing_player_info);
                assert!(missing.is_empty());
            }
            other => panic!("unexpected decision: {other:?}"),
        }
        assert!(registration.last_invoked_at(&player).is_none());
    }

    #[test]
    fn test_dispatch_contains_only_required_types() {
        let f = fixture();
        let player = PlayerId::new("p1");
        let id = f
            .registry
            .register_game_type("dr", GameType::Dr, noop(), Duration::ZERO);
        let registration = f.registry.get(id).unwrap();

        f.cache.merge_player_info(&player, info("p1"));
        f.cache
            .merge_game_type(&player, GameTypeRecord::new(GameType::Dr, GameStats::default()));
        f.cache
            .merge_game_type(&player, GameTypeRecord::new(GameType::Bed, GameStats::default()));
        let entry = f.cache.snapshot(&player).unwrap();

        match f
            .gate
            .evaluate(&player, &registration, &entry, DataKind::PlayerInfo)
        {
            GateDecision::Dispatch(update) => {
                assert_eq!(update.game_infos.len(), 1);
                assert!(update.game_info(GameType::Dr).is_some());
                assert_eq!(update.trigger, DataKind::PlayerInfo);
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn test_rate_limit_window() {
        let f = fixture();
        let player = PlayerId::new("p1");
        let id = f
            .registry
            .register_player_info("info", noop(), Duration::from_millis(5000));
        let registration = f.registry.get(id).unwrap();
        f.cache.merge_player_info(&player, info("p1"));
        let entry = f.cache.snapshot(&player).unwrap();

        assert!(matches!(
            f.gate.evaluate(&player, &registration, &entry, DataKind::PlayerInfo),
            GateDecision::Dispatch(_)
        ));

        f.clock.advance(Duration::from_millis(1000));
        match f
            .gate
            .evaluate(&player, &registration, &entry, DataKind::PlayerInfo)
        {
            GateDecision::RateLimited { remaining } => {
                assert_eq!(remaining, Duration::from_millis(4000));
            }
            other => panic!("unexpected decision: {other:?}"),
        }

        f.clock.advance(Duration::from_millis(4000));
        assert!(matches!(
            f.gate.evaluate(&player, &registration, &entry, DataKind::PlayerInfo),
            GateDecision::Dispatch(_)
        ));
        assert_eq!(
            registration
                .last_invoked_at(&player)
                .unwrap()
                .timestamp_millis(),
            5000
        );
    }

    #[test]
    fn test_rate_limit_is_per_player() {
        let f = fixture();
        let p1 = PlayerId::new("p1");
        let p2 = PlayerId::new("p2");
        let id = f
            .registry
            .register_player_info("info", noop(), Duration::from_secs(60));
        let registration = f.registry.get(id).unwrap();
        f.cache.merge_player_info(&p1, info("p1"));
        f.cache.merge_player_info(&p2, info("p2"));

        let e1 = f.cache.snapshot(&p1).unwrap();
        let e2 = f.cache.snapshot(&p2).unwrap();
        assert!(matches!(
            f.gate.evaluate(&p1, &registration, &e1, DataKind::PlayerInfo),
            GateDecision::Dispatch(_)
        ));
        assert!(matches!(
            f.gate.evaluate(&p2, &registration, &e2, DataKind::PlayerInfo),
            GateDecision::Dispatch(_)
        ));
    }

    #[tokio::test]
    async fn test_invoke_catches_panics() {
        let f = fixture();
        let player = PlayerId::new("p1");
        let consumer: Arc<dyn crate::update::Consumer> =
            Arc::new(FnConsumer(|_update: PlayerUpdate| async {
                if true {
                    panic!("consumer blew up");
                }
                Ok::<(), Error>(())
            }));
        let id = f
            .registry
            .register_player_info("panicky", consumer, Duration::ZERO);
        let registration = f.registry.get(id).unwrap();
        f.cache.merge_player_info(&player, info("p1"));
        let entry = f.cache.snapshot(&player).unwrap();

        let GateDecision::Dispatch(update) =
            f.gate
                .evaluate(&player, &registration, &entry, DataKind::PlayerInfo)
        else {
            panic!("expected dispatch");
        };

        let err = f.gate.invoke(&registration, update).await.unwrap_err();
        assert!(err.to_string().contains("consumer blew up"), "{err}");
        assert!(registration.last_invoked_at(&player).is_some());
    }
}
