//! Skip coordinator: the shared, async front of the registry.
//!
//! Workers on any task submit challenges through a cloned handle. The
//! registry sits behind one mutex, so skip passes never overlap and no
//! challenge changes while a pass iterates over it. A sweeper loop expires
//! timed-out challenges until shutdown.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info};

use crate::config::Config;
use crate::error::Result;
use crate::event::Event;
use crate::model::{AnyChallenge, ChallengeId, ChallengeState, ChallengeSummary, SkipScope, SolverId};
use crate::registry::{Registry, SkipOutcome, SubmitResult};

/// Configuration for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How often the sweeper expires timed-out challenges.
    pub sweep_interval: Duration,
    /// Timeout given to challenges submitted without one.
    pub default_timeout_ms: i64,
    /// How long terminal challenges survive sweeps.
    pub retention: Duration,
    pub event_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CoordinatorConfig {
    fn from(config: &Config) -> Self {
        Self {
            sweep_interval: config.sweep_interval,
            default_timeout_ms: config.default_timeout_ms,
            retention: config.retention,
            event_capacity: config.event_capacity,
        }
    }
}

/// Cloneable handle to the shared registry.
#[derive(Clone)]
pub struct SkipCoordinator {
    registry: Arc<Mutex<Registry>>,
    config: CoordinatorConfig,
    shutdown: Arc<Notify>,
}

impl std::fmt::Debug for SkipCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SkipCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        let registry = Registry::new()
            .with_default_timeout(config.default_timeout_ms)
            .with_event_capacity(config.event_capacity);
        Self {
            registry: Arc::new(Mutex::new(registry)),
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Register a challenge built by a worker.
    pub async fn submit<C>(&self, challenge: C) -> Result<SubmitResult>
    where
        C: AnyChallenge + 'static,
    {
        self.registry.lock().await.submit(Box::new(challenge))
    }

    pub async fn answer(
        &self,
        id: ChallengeId,
        solver: &SolverId,
        raw: &str,
    ) -> Result<ChallengeState> {
        self.registry.lock().await.answer(id, solver, raw)
    }

    /// Run one skip pass. Concurrent calls are serialized.
    pub async fn skip(
        &self,
        id: ChallengeId,
        scope: Option<SkipScope>,
        solver: Option<&SolverId>,
    ) -> Result<SkipOutcome> {
        self.registry.lock().await.skip(id, scope, solver)
    }

    pub async fn state(&self, id: ChallengeId) -> Result<ChallengeState> {
        self.registry.lock().await.state(id)
    }

    pub async fn list_by_state(&self, state: ChallengeState) -> Vec<ChallengeSummary> {
        self.registry.lock().await.list_by_state(state)
    }

    pub async fn events_since(&self, since_seq: u64) -> Vec<Event> {
        self.registry.lock().await.events_since(since_seq)
    }

    /// End the skip session: later challenges are no longer matched against
    /// earlier intents.
    pub async fn clear_skip_rules(&self) -> usize {
        self.registry.lock().await.clear_skip_rules()
    }

    /// Expire timed-out challenges once, then drop terminal challenges
    /// older than the retention window. Returns the newly expired ids.
    pub async fn sweep(&self) -> Result<Vec<ChallengeId>> {
        let now = Utc::now();
        let mut registry = self.registry.lock().await;
        let expired = registry.expire(now)?;
        let cutoff = chrono::Duration::from_std(self.config.retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention));
        if let Some(cutoff) = cutoff {
            registry.prune(cutoff);
        }
        Ok(expired)
    }

    /// Drop events a consumer has processed.
    pub async fn prune_events(&self, through_seq: u64) -> usize {
        self.registry.lock().await.prune_events(through_seq)
    }

    /// Number of challenges held, terminal ones included.
    pub async fn challenge_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Signal the sweeper to stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Expire timed-out challenges every `sweep_interval` until shutdown.
    pub async fn run_sweeper(&self) -> Result<()> {
        info!(interval_ms = self.config.sweep_interval.as_millis() as u64, "sweeper started");
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("sweeper shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.sweep_interval) => {}
            }

            if let Err(e) = self.sweep().await {
                error!("sweep error: {e}");
            }
        }
    }
}
