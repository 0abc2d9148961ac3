//! Consumer registrations.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hive_api::{GameType, PlayerId};
use parking_lot::RwLock;
use tracing::info;

use super::types::{DataKind, PlayerUpdate};
use crate::Result;

/// Receiver of composite player updates.
///
/// Failures are reported and isolated; they never reach the fetch path or
/// other consumers.
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn consume(&self, update: PlayerUpdate) -> Result<()>;
}

/// Adapter turning an async closure into a [`Consumer`].
pub struct FnConsumer<F>(pub F);

#[async_trait]
impl<F, Fut> Consumer for FnConsumer<F>
where
    F: Fn(PlayerUpdate) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn consume(&self, update: PlayerUpdate) -> Result<()> {
        (self.0)(update).await
    }
}

/// Opaque handle returned by [`ConsumerRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered consumer together with its rate-limit ledger.
pub struct Registration {
    id: RegistrationId,
    name: String,
    required: BTreeSet<GameType>,
    consumer: Arc<dyn Consumer>,
    min_interval: Duration,
    /// Last invocation time per player.
    last_invoked: DashMap<PlayerId, DateTime<Utc>>,
}

impl Registration {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> &BTreeSet<GameType> {
        &self.required
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn is_player_info_only(&self) -> bool {
        self.required.is_empty()
    }

    /// Whether a fetch completion of `kind` can change this consumer's
    /// satisfaction.
    pub fn is_affected_by(&self, kind: DataKind) -> bool {
        match kind {
            DataKind::PlayerInfo => true,
            DataKind::GameType(game_type) => self.required.contains(&game_type),
        }
    }

    pub fn last_invoked_at(&self, player: &PlayerId) -> Option<DateTime<Utc>> {
        self.last_invoked.get(player).map(|at| *at)
    }

    pub(crate) fn consumer(&self) -> &Arc<dyn Consumer> {
        &self.consumer
    }

    pub(crate) fn ledger(&self) -> &DashMap<PlayerId, DateTime<Utc>> {
        &self.last_invoked
    }

    /// Drop stamps at least `min_interval` old. Such a stamp no longer rate
    /// limits anything, so pruning never changes a dispatch decision.
    pub fn prune_ledger(&self, now: DateTime<Utc>) -> usize {
        let before = self.last_invoked.len();
        self.last_invoked.retain(|_, at| match (now - *at).to_std() {
            Ok(elapsed) => elapsed < self.min_interval,
            // Stamped ahead of `now`; still limiting.
            Err(_) => true,
        });
        before.saturating_sub(self.last_invoked.len())
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("required", &self.required)
            .field("min_interval", &self.min_interval)
            .finish_non_exhaustive()
    }
}

/// Append-only set of consumer registrations.
#[derive(Default)]
pub struct ConsumerRegistry {
    registrations: RwLock<Vec<Arc<Registration>>>,
    next_id: AtomicU64,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer for the given game types.
    ///
    /// An empty `required` set registers a player-info-only consumer.
    pub fn register(
        &self,
        name: impl Into<String>,
        required: impl IntoIterator<Item = GameType>,
        consumer: Arc<dyn Consumer>,
        min_interval: Duration,
    ) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Registration {
            id,
            name: name.into(),
            required: required.into_iter().collect(),
            consumer,
            min_interval,
            last_invoked: DashMap::new(),
        };

        info!(
            id = %id,
            name = %registration.name,
            required = ?registration.required,
            min_interval = ?min_interval,
            "Registered consumer"
        );

        self.registrations.write().push(Arc::new(registration));
        id
    }

    pub fn register_player_info(
        &self,
        name: impl Into<String>,
        consumer: Arc<dyn Consumer>,
        min_interval: Duration,
    ) -> RegistrationId {
        self.register(name, Vec::new(), consumer, min_interval)
    }

    pub fn register_game_type(
        &self,
        name: impl Into<String>,
        game_type: GameType,
        consumer: Arc<dyn Consumer>,
        min_interval: Duration,
    ) -> RegistrationId {
        self.register(name, [game_type], consumer, min_interval)
    }

    pub fn register_all_game_types(
        &self,
        name: impl Into<String>,
        consumer: Arc<dyn Consumer>,
        min_interval: Duration,
    ) -> RegistrationId {
        self.register(name, GameType::STATS_GAME_TYPES, consumer, min_interval)
    }

    pub fn get(&self, id: RegistrationId) -> Option<Arc<Registration>> {
        self.registrations
            .read()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Registrations whose satisfaction a fetch of `kind` can change.
    pub fn affected_by(&self, kind: DataKind) -> Vec<Arc<Registration>> {
        self.registrations
            .read()
            .iter()
            .filter(|r| r.is_affected_by(kind))
            .cloned()
            .collect()
    }

    /// Prune every registration's rate-limit ledger. Returns the number of
    /// stamps dropped.
    pub fn prune_ledgers(&self, now: DateTime<Utc>) -> usize {
        self.registrations
            .read()
            .iter()
            .map(|r| r.prune_ledger(now))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }
}
