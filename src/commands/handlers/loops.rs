//! In-file loops (SDCARD_LOOP_BEGIN / _END / _DESIST).
//!
//! Loops are built on the jump API: BEGIN remembers the position of the line
//! after it, END sends the stream back there until the count runs out.

use super::{CommandContext, CommandResult};
use crate::commands::output::CommandOutput;
use crate::error::SdError;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoopFrame {
    /// Passes left, 0 meaning forever.
    remaining: u32,
    /// Position of the first line of the loop body.
    position: u64,
}

/// Stack of open loops, innermost last.
#[derive(Debug, Default)]
pub struct LoopStack {
    frames: Mutex<Vec<LoopFrame>>,
}

impl LoopStack {
    pub fn depth(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LoopFrame>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle SDCARD_LOOP_BEGIN.
pub fn handle_loop_begin(ctx: &CommandContext<'_>, count: u32) -> CommandResult {
    if !ctx.sd.is_cmd_from_sd() {
        return Err(SdError::invalid_argument("Only permitted in SD file"));
    }
    let position = ctx.sd.get_file_position();
    ctx.loops.lock().push(LoopFrame {
        remaining: count,
        position,
    });
    debug!(count, position, "Loop begin");
    Ok(CommandOutput::None)
}

/// Handle SDCARD_LOOP_END.
pub fn handle_loop_end(ctx: &CommandContext<'_>) -> CommandResult {
    if !ctx.sd.is_cmd_from_sd() {
        return Err(SdError::invalid_argument("Only permitted in SD file"));
    }
    let mut frames = ctx.loops.lock();
    let Some(frame) = frames.pop() else {
        return Ok(CommandOutput::None);
    };
    match frame.remaining {
        1 => debug!(position = frame.position, "Loop done"),
        remaining => {
            frames.push(LoopFrame {
                remaining: remaining.saturating_sub(1),
                ..frame
            });
            ctx.sd.set_file_position(frame.position);
        }
    }
    Ok(CommandOutput::None)
}

/// Handle SDCARD_LOOP_DESIST.
pub fn handle_loop_desist(ctx: &CommandContext<'_>) -> CommandOutput {
    ctx.loops.clear();
    CommandOutput::None
}
