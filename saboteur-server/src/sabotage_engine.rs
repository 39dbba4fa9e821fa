//! Sabotage lifecycle across sessions.
//!
//! At most one sabotage is active per session. Critical sabotages arm a
//! timer; if the crew does not fix them in time the timeout callback runs
//! exactly once. Firing, fixing and cancelling all remove the entry under
//! the same lock, so whichever gets there first wins and the others become
//! no-ops.

use chrono::{DateTime, Utc};
use saboteur_core::{PlayerId, Sabotage, SabotageKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::ids::SessionId;
use crate::scheduler::{Scheduler, TimerHandle, TimerTask};

/// Invoked when a critical sabotage times out. Receives the expired sabotage.
pub type TimeoutCallback = Box<dyn FnOnce(Sabotage) -> TimerTask + Send>;

/// Outcome of a fix attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    NoActiveSabotage,
    /// Contribution counted; more players are needed.
    Progress {
        kind: SabotageKind,
        fixers: usize,
        required: usize,
    },
    Fixed(Sabotage),
}

struct ActiveSabotage {
    sabotage: Sabotage,
    generation: u64,
    timer: Option<TimerHandle>,
    on_timeout: Option<TimeoutCallback>,
}

impl ActiveSabotage {
    fn disarm(&self) {
        if let Some(timer) = &self.timer {
            timer.cancel();
        }
    }
}

#[derive(Default)]
struct Entries {
    next_generation: u64,
    active: HashMap<SessionId, ActiveSabotage>,
}

pub struct SabotageEngine {
    entries: Arc<Mutex<Entries>>,
    scheduler: Arc<dyn Scheduler>,
    critical_timeout: Duration,
    fix_quorum: usize,
}

impl SabotageEngine {
    pub fn new(scheduler: Arc<dyn Scheduler>, critical_timeout: Duration, fix_quorum: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries::default())),
            scheduler,
            critical_timeout,
            fix_quorum,
        }
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn critical_timeout(&self) -> Duration {
        self.critical_timeout
    }

    pub fn fix_quorum(&self) -> usize {
        self.fix_quorum
    }

    /// Starts a sabotage unless the session already has one.
    ///
    /// `on_timeout` only matters for critical kinds.
    pub async fn initiate(
        &self,
        session: SessionId,
        kind: SabotageKind,
        initiator: PlayerId,
        now: DateTime<Utc>,
        on_timeout: Option<TimeoutCallback>,
    ) -> Option<Sabotage> {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.active.get(&session) {
            debug!(
                "Rejecting {} sabotage for {}: {} already active",
                kind, session, existing.sabotage.kind
            );
            return None;
        }

        entries.next_generation += 1;
        let generation = entries.next_generation;
        let sabotage = Sabotage::new(kind, initiator, now);
        let timer = kind
            .is_critical()
            .then(|| self.arm_timeout(session, generation));

        entries.active.insert(
            session,
            ActiveSabotage {
                sabotage: sabotage.clone(),
                generation,
                timer,
                on_timeout,
            },
        );
        info!("Sabotage {} started in {} by player {}", kind, session, initiator);
        Some(sabotage)
    }

    fn arm_timeout(&self, session: SessionId, generation: u64) -> TimerHandle {
        let entries = Arc::clone(&self.entries);
        self.scheduler.after(
            self.critical_timeout,
            Box::pin(async move {
                let expired = {
                    let mut entries = entries.lock().await;
                    let still_armed = entries
                        .active
                        .get(&session)
                        .is_some_and(|e| e.generation == generation && !e.sabotage.fixed);
                    if still_armed {
                        entries.active.remove(&session)
                    } else {
                        None
                    }
                };
                // Lock released before the callback so it may re-enter the engine.
                if let Some(entry) = expired {
                    info!("Critical sabotage {} timed out in {}", entry.sabotage.kind, session);
                    if let Some(callback) = entry.on_timeout {
                        callback(entry.sabotage).await;
                    }
                }
            }),
        )
    }

    /// Records a fix by `player`. Reaching the quorum removes the sabotage
    /// and disarms its timer.
    pub async fn attempt_fix(&self, session: SessionId, player: PlayerId, now: DateTime<Utc>) -> FixOutcome {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.active.get_mut(&session) else {
            return FixOutcome::NoActiveSabotage;
        };

        if !entry.sabotage.record_fix(player, self.fix_quorum, now) {
            return FixOutcome::Progress {
                kind: entry.sabotage.kind,
                fixers: entry.sabotage.fixers.len(),
                required: self.fix_quorum,
            };
        }

        let Some(entry) = entries.active.remove(&session) else {
            return FixOutcome::NoActiveSabotage;
        };
        entry.disarm();
        info!("Sabotage {} fixed in {}", entry.sabotage.kind, session);
        FixOutcome::Fixed(entry.sabotage)
    }

    /// Drops the session's sabotage without running its timeout callback.
    pub async fn cancel(&self, session: SessionId) -> Option<Sabotage> {
        let mut entries = self.entries.lock().await;
        let entry = entries.active.remove(&session)?;
        entry.disarm();
        debug!("Sabotage {} cancelled in {}", entry.sabotage.kind, session);
        Some(entry.sabotage)
    }

    pub async fn active(&self, session: SessionId) -> Option<Sabotage> {
        let entries = self.entries.lock().await;
        entries.active.get(&session).map(|e| e.sabotage.clone())
    }

    pub async fn is_active(&self, session: SessionId) -> bool {
        self.entries.lock().await.active.contains_key(&session)
    }

    /// Task lists are readable unless communications are down.
    pub async fn can_view_tasks(&self, session: SessionId) -> bool {
        !self
            .active(session)
            .await
            .is_some_and(|s| s.kind.blocks_task_list())
    }

    /// Photos are accepted unless the lights are out.
    pub async fn can_submit_photos(&self, session: SessionId) -> bool {
        !self
            .active(session)
            .await
            .is_some_and(|s| s.kind.blocks_task_submission())
    }
}
