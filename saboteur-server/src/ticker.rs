//! Periodic driver for lazily evaluated timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::state_machine::store::SessionStore;

/// Ticks every session each `period` and closes sessions idle for longer
/// than `idle_timeout`. Runs until the task is aborted.
pub async fn tick_loop(store: Arc<SessionStore>, period: Duration, idle_timeout: Duration) {
    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let idle_timeout = chrono::Duration::from_std(idle_timeout).unwrap_or(chrono::Duration::MAX);

    loop {
        interval.tick().await;

        store.tick_all().await;

        let expired = store.expire_idle(idle_timeout).await;
        if !expired.is_empty() {
            info!("Expired {} idle sessions", expired.len());
        }
    }
}
