//! Print statistics tracker.
//!
//! Follows the lifecycle notifications from the stream and keeps the state,
//! file name, last error and the accumulated printing time.

use crate::backend::PrintStats;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::info;

/// Print job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintState {
    #[default]
    Standby,
    Printing,
    Paused,
    Complete,
    Error,
    Cancelled,
}

impl PrintState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standby => "standby",
            Self::Printing => "printing",
            Self::Paused => "paused",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Point-in-time copy of the tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintStatsSnapshot {
    pub state: PrintState,
    pub filename: String,
    pub message: String,
    /// Seconds spent printing, pauses excluded.
    pub print_duration: f64,
}

#[derive(Debug, Default)]
struct Tracked {
    state: PrintState,
    filename: String,
    message: String,
    printing_since: Option<Instant>,
    accumulated: Duration,
}

impl Tracked {
    fn stop_clock(&mut self) {
        if let Some(since) = self.printing_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    fn print_duration(&self) -> Duration {
        self.accumulated + self.printing_since.map(|s| s.elapsed()).unwrap_or_default()
    }

    fn finish(&mut self, state: PrintState) {
        self.stop_clock();
        self.state = state;
        info!(state = state.as_str(), file = %self.filename, "Print state changed");
    }
}

#[derive(Debug, Default)]
pub struct PrintStatsTracker {
    tracked: Mutex<Tracked>,
}

impl PrintStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PrintStatsSnapshot {
        let tracked = self.lock();
        PrintStatsSnapshot {
            state: tracked.state,
            filename: tracked.filename.clone(),
            message: tracked.message.clone(),
            print_duration: tracked.print_duration().as_secs_f64(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tracked> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PrintStats for PrintStatsTracker {
    fn reset(&self) {
        *self.lock() = Tracked::default();
    }

    fn set_current_file(&self, name: &str) {
        let mut tracked = self.lock();
        *tracked = Tracked::default();
        tracked.filename = name.to_string();
    }

    fn note_start(&self) {
        let mut tracked = self.lock();
        if tracked.printing_since.is_none() {
            tracked.printing_since = Some(Instant::now());
        }
        tracked.state = PrintState::Printing;
        tracked.message.clear();
    }

    fn note_pause(&self) {
        self.lock().finish(PrintState::Paused);
    }

    fn note_complete(&self) {
        self.lock().finish(PrintState::Complete);
    }

    fn note_error(&self, message: &str) {
        let mut tracked = self.lock();
        tracked.message = message.to_string();
        tracked.finish(PrintState::Error);
    }

    fn note_cancel(&self) {
        self.lock().finish(PrintState::Cancelled);
    }
}
