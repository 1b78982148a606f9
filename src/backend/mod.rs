//! Collaborator interfaces the stream talks to.
//!
//! The command backend executes one line at a time; the print statistics
//! sink receives fire-and-forget lifecycle notifications.

pub mod mock;

pub use mock::{MockAction, RecordingBackend, RecordingStats, StatsEvent};

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by the command backend for a single line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The command was rejected with a message meant for the user.
    #[error("{0}")]
    User(String),

    /// Anything else went wrong while executing the command.
    #[error("internal dispatch failure: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Executes command lines on behalf of the stream.
///
/// Implementations may call back into the stream while executing a line
/// (pause, jump, suppress), so they must not hold locks that the stream
/// also takes.
#[async_trait]
pub trait CommandBackend: Send + Sync {
    /// Executes a single command line.
    async fn execute(&self, line: &str) -> Result<(), DispatchError>;

    /// Returns true while commands from another source are waiting or running.
    fn has_pending_external_work(&self) -> bool;

    /// Sends an unsolicited message to whoever is watching the console.
    fn respond_raw(&self, msg: &str);
}

/// Receives print lifecycle notifications.
pub trait PrintStats: Send + Sync {
    fn reset(&self);
    fn set_current_file(&self, name: &str);
    fn note_start(&self);
    fn note_pause(&self);
    fn note_complete(&self);
    fn note_error(&self, message: &str);
    fn note_cancel(&self);
}
