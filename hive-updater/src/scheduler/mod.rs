//! Leaderboard polling.
//!
//! A [`PollingScheduler`] keeps one board fresh: it seeds a waiting queue
//! from the top rows of the board, requests an update for one player every
//! tick, and puts the player back into the queue once the per-player
//! interval has passed, whether the request succeeded or not. Players that
//! enter the top rows later are picked up whenever the queue runs dry.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use hive_api::PlayerId;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::store::LeaderboardStore;
use crate::update::{DispatchReport, UpdateService};
use crate::updaters::{PollTarget, UpdateRequest};

/// Players waiting for a poll plus those cooling down after one.
#[derive(Debug, Default)]
struct WaitQueue {
    waiting: VecDeque<PlayerId>,
    cooling: VecDeque<(Instant, PlayerId)>,
    members: HashSet<PlayerId>,
}

impl WaitQueue {
    fn offer(&mut self, player: PlayerId) -> bool {
        if self.members.insert(player.clone()) {
            self.waiting.push_back(player);
            true
        } else {
            false
        }
    }

    /// Move players whose cooldown has elapsed back to the waiting queue.
    /// Cooldowns share one interval, so `cooling` is ordered by ready time.
    fn release(&mut self, now: Instant) {
        while let Some((ready_at, _)) = self.cooling.front() {
            if *ready_at > now {
                break;
            }
            if let Some((_, player)) = self.cooling.pop_front() {
                self.waiting.push_back(player);
            }
        }
    }

    fn next(&mut self) -> Option<PlayerId> {
        self.waiting.pop_front()
    }

    fn cool_down(&mut self, player: PlayerId, ready_at: Instant) {
        self.cooling.push_back((ready_at, player));
    }
}

pub struct PollingScheduler {
    service: Arc<UpdateService>,
    store: Arc<dyn LeaderboardStore>,
    target: PollTarget,
    queue: WaitQueue,
}

impl PollingScheduler {
    pub fn new(
        service: Arc<UpdateService>,
        store: Arc<dyn LeaderboardStore>,
        target: PollTarget,
    ) -> Self {
        Self {
            service,
            store,
            target,
            queue: WaitQueue::default(),
        }
    }

    pub fn target(&self) -> &PollTarget {
        &self.target
    }

    /// Number of players waiting for a poll right now.
    pub fn waiting(&self) -> usize {
        self.queue.waiting.len()
    }

    /// Number of players known to the scheduler.
    pub fn tracked(&self) -> usize {
        self.queue.members.len()
    }

    /// Add a player to the queue. Returns false if it is already tracked.
    pub fn enqueue(&mut self, player: PlayerId) -> bool {
        self.queue.offer(player)
    }

    /// Add the board's top players that are not tracked yet.
    pub async fn seed(&mut self) -> Result<usize> {
        let entries = self
            .store
            .top(self.target.board, self.target.property, self.target.limit)
            .await?;

        let added = entries
            .into_iter()
            .filter(|entry| self.queue.offer(entry.player.clone()))
            .count();
        if added > 0 {
            debug!(board = self.target.board, added, "Seeded poll queue");
        }
        Ok(added)
    }

    /// Poll the next waiting player, if any.
    pub async fn tick(&mut self) -> Option<(PlayerId, DispatchReport)> {
        self.queue.release(Instant::now());

        if self.queue.waiting.is_empty()
            && let Err(e) = self.seed().await
        {
            warn!(board = self.target.board, error = %e, "Failed to read poll seed");
        }

        let player = self.queue.next()?;
        let report = self.request(&player).await;
        if report.fetch_failures > 0 {
            debug!(
                updater = self.target.name,
                player = %player,
                failures = report.fetch_failures,
                "Poll request failed"
            );
        }

        self.queue
            .cool_down(player.clone(), Instant::now() + self.target.interval);
        Some((player, report))
    }

    async fn request(&self, player: &PlayerId) -> DispatchReport {
        match &self.target.request {
            UpdateRequest::PlayerInfo => {
                self.service
                    .request_player_info_update(player, self.target.interval)
                    .await
            }
            UpdateRequest::GameTypes(types) => {
                self.service
                    .request_game_types_update(player, types, self.target.interval)
                    .await
            }
        }
    }

    /// Run until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            updater = self.target.name,
            board = self.target.board,
            tick = ?self.target.tick,
            interval = ?self.target.interval,
            "Starting leaderboard polling"
        );

        let mut ticker = tokio::time::interval(self.target.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(updater = self.target.name, "Polling stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
