//! One-shot delayed tasks with cancellation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Work to run once a timer expires.
pub type TimerTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handle to a pending timer. Dropping it leaves the timer running.
#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

pub trait Scheduler: Send + Sync {
    fn after(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

/// Runs timers on the tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        TimerHandle {
            abort: handle.abort_handle(),
        }
    }
}
