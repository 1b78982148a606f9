//! Cooperative scheduling primitives.
//!
//! The work loop does not own a thread. It runs as a task on the host's tokio
//! runtime and gives control back at explicit points. On the current-thread
//! runtime the binary uses, nothing else runs between two yield points, which
//! is what makes the pause flag and the position bookkeeping single-writer.

use futures::future::BoxFuture;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Handle to a scheduled unit of work.
#[derive(Debug)]
pub struct WorkTimer {
    handle: JoinHandle<()>,
}

impl WorkTimer {
    /// Drops the work without waiting for it to reach a yield point of its own
    /// choosing. Only meant for process shutdown.
    pub fn unregister(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Schedules `work` to run at the next opportunity.
pub fn register_timer(work: BoxFuture<'static, ()>) -> WorkTimer {
    WorkTimer {
        handle: tokio::spawn(work),
    }
}

pub fn monotonic() -> Instant {
    Instant::now()
}

/// Yields until `deadline`.
pub async fn pause_until(deadline: Instant) {
    tokio::time::sleep_until(deadline).await;
}

/// Yields for `duration`.
pub async fn pause_for(duration: Duration) {
    pause_until(monotonic() + duration).await;
}

/// Yields once and resumes as soon as the scheduler gets back to us.
pub async fn yield_now() {
    tokio::task::yield_now().await;
}
