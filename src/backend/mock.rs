//! Recording collaborators for testing.
//!
//! `RecordingBackend` stores every dispatched line and can be scripted to
//! react to specific lines the way real commands would (fail, jump, pause).
//! `RecordingStats` stores every statistics notification.

use super::{CommandBackend, DispatchError, PrintStats};
use crate::sdcard::WeakSd;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

/// Reaction to a scripted line. Each action fires once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAction {
    /// Reject the line with a user-facing message.
    Fail(String),
    /// Fail with an internal error.
    Crash(String),
    /// Jump the stream to the given byte offset.
    Jump(u64),
    /// Pause the stream from inside the dispatch.
    Pause,
    /// Cancel the stream from inside the dispatch.
    Cancel,
}

/// A command backend that records what it was asked to run.
#[derive(Default)]
pub struct RecordingBackend {
    sd: OnceLock<WeakSd>,
    executed: Mutex<Vec<String>>,
    responses: Mutex<Vec<String>>,
    actions: Mutex<HashMap<String, MockAction>>,
    external_pending: AtomicBool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects the backend to the stream it serves, for scripted callbacks.
    pub fn attach(&self, sd: WeakSd) {
        let _ = self.sd.set(sd);
    }

    /// Scripts a reaction for the next time `line` is executed.
    pub fn on_line(&self, line: impl Into<String>, action: MockAction) {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(line.into(), action);
    }

    /// Simulates other command traffic holding the command queue.
    pub fn set_external_pending(&self, pending: bool) {
        self.external_pending.store(pending, Ordering::SeqCst);
    }

    /// Lines executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages sent through `respond_raw`.
    pub fn responses(&self) -> Vec<String> {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CommandBackend for RecordingBackend {
    async fn execute(&self, line: &str) -> Result<(), DispatchError> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());

        let action = self
            .actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(line);
        let Some(action) = action else {
            return Ok(());
        };

        let sd = self.sd.get().and_then(WeakSd::upgrade);
        match action {
            MockAction::Fail(msg) => Err(DispatchError::user(msg)),
            MockAction::Crash(msg) => Err(DispatchError::internal(msg)),
            MockAction::Jump(position) => {
                let sd = sd.ok_or_else(|| DispatchError::internal("backend not attached"))?;
                sd.set_file_position(position);
                Ok(())
            }
            MockAction::Pause => {
                let sd = sd.ok_or_else(|| DispatchError::internal("backend not attached"))?;
                sd.pause().await;
                Ok(())
            }
            MockAction::Cancel => {
                let sd = sd.ok_or_else(|| DispatchError::internal("backend not attached"))?;
                sd.cancel().await;
                Ok(())
            }
        }
    }

    fn has_pending_external_work(&self) -> bool {
        self.external_pending.load(Ordering::SeqCst)
    }

    fn respond_raw(&self, msg: &str) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(msg.to_string());
    }
}

/// A statistics notification, as recorded by [`RecordingStats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsEvent {
    Reset,
    CurrentFile(String),
    Start,
    Pause,
    Complete,
    Error(String),
    Cancel,
}

/// Print statistics sink that records every notification.
#[derive(Debug, Default)]
pub struct RecordingStats {
    events: Mutex<Vec<StatsEvent>>,
}

impl RecordingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatsEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent notification, if any.
    pub fn last(&self) -> Option<StatsEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    fn push(&self, event: StatsEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl PrintStats for RecordingStats {
    fn reset(&self) {
        self.push(StatsEvent::Reset);
    }

    fn set_current_file(&self, name: &str) {
        self.push(StatsEvent::CurrentFile(name.to_string()));
    }

    fn note_start(&self) {
        self.push(StatsEvent::Start);
    }

    fn note_pause(&self) {
        self.push(StatsEvent::Pause);
    }

    fn note_complete(&self) {
        self.push(StatsEvent::Complete);
    }

    fn note_error(&self, message: &str) {
        self.push(StatsEvent::Error(message.to_string()));
    }

    fn note_cancel(&self) {
        self.push(StatsEvent::Cancel);
    }
}
