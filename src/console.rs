//! Console command backend.
//!
//! Routes every line, whether typed by the operator or streamed off the card,
//! through the command router. SD commands act on the card; anything else is
//! machine g-code and goes to the output channel. Lines typed by the operator
//! count as pending external work while they run, which is what throttles the
//! card stream.

use crate::backend::{CommandBackend, DispatchError};
use crate::commands::{dispatch, CommandContext, CommandOutput, CommandRouter, LoopStack};
use crate::error::{Result, SdError};
use crate::sdcard::{VirtualSd, WeakSd};
use crate::stats::PrintStatsTracker;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One line of console output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    /// Response to a command.
    Response(String),
    /// Machine command to execute.
    Machine(String),
    /// A command failed.
    Error(String),
}

impl std::fmt::Display for ConsoleLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Response(line) | Self::Machine(line) => write!(f, "{}", line),
            Self::Error(msg) => write!(f, "!! {}", msg),
        }
    }
}

/// Decrements the pending counter when an external command finishes.
struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Console {
    sd: OnceLock<WeakSd>,
    loops: LoopStack,
    stats: Option<Arc<PrintStatsTracker>>,
    external_pending: AtomicUsize,
    output: mpsc::UnboundedSender<ConsoleLine>,
    shutdown: CancellationToken,
}

impl Console {
    /// Creates a console writing to `output`. Call [`Console::attach`] once the
    /// card exists.
    pub fn new(
        stats: Option<Arc<PrintStatsTracker>>,
        output: mpsc::UnboundedSender<ConsoleLine>,
    ) -> Self {
        Self {
            sd: OnceLock::new(),
            loops: LoopStack::default(),
            stats,
            external_pending: AtomicUsize::new(0),
            output,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn attach(&self, sd: WeakSd) {
        if self.sd.set(sd).is_err() {
            warn!("Console already attached to a card");
        }
    }

    /// Token cancelled when the host shuts down. No line runs after that.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs a line typed by the operator.
    pub async fn run_external(&self, line: &str) -> Result<()> {
        let _pending = PendingGuard::enter(&self.external_pending);
        self.run_line(line).await
    }

    pub fn pending_external(&self) -> usize {
        self.external_pending.load(Ordering::SeqCst)
    }

    fn card(&self) -> Result<VirtualSd> {
        self.sd
            .get()
            .and_then(WeakSd::upgrade)
            .ok_or_else(|| SdError::internal("console is not attached to a card"))
    }

    async fn run_line(&self, line: &str) -> Result<()> {
        let result = self.route(line).await;
        if let Err(e) = &result {
            self.send(ConsoleLine::Error(e.to_string()));
        }
        result
    }

    async fn route(&self, line: &str) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(SdError::dispatch("Printer is shutdown"));
        }
        let command = CommandRouter::parse(line)
            .map_err(|e| SdError::invalid_argument(e.to_string()))?;
        let sd = self.card()?;
        let ctx = CommandContext {
            sd: &sd,
            loops: &self.loops,
            stats: self.stats.as_deref(),
        };
        let output = dispatch(&ctx, command).await?;
        for item in output.flatten() {
            match item {
                CommandOutput::Info(text) => self.send(ConsoleLine::Response(text)),
                CommandOutput::Forward(gcode) => self.send(ConsoleLine::Machine(gcode)),
                CommandOutput::Multiple(_) | CommandOutput::None => {}
            }
        }
        Ok(())
    }

    fn send(&self, line: ConsoleLine) {
        if self.output.send(line).is_err() {
            debug!("Console output closed");
        }
    }
}

#[async_trait]
impl CommandBackend for Console {
    async fn execute(&self, line: &str) -> std::result::Result<(), DispatchError> {
        self.run_line(line).await.map_err(|e| match e {
            SdError::Internal(msg) => DispatchError::internal(msg),
            other => DispatchError::user(other.to_string()),
        })
    }

    fn has_pending_external_work(&self) -> bool {
        self.pending_external() > 0
    }

    fn respond_raw(&self, msg: &str) {
        self.send(ConsoleLine::Response(msg.to_string()));
    }
}
