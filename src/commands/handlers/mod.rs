//! Command handlers.
//!
//! Each handler takes the command context and returns the output to report.
//! Handlers may run re-entrantly, from a line the card itself is streaming.

pub mod card;
pub mod loops;
pub mod parts;
pub mod system;

pub use loops::LoopStack;

use super::definitions::find_command;
use super::output::CommandOutput;
use super::router::Command;
use crate::error::SdError;
use crate::sdcard::VirtualSd;
use crate::stats::PrintStatsTracker;

/// Context provided to command handlers.
pub struct CommandContext<'a> {
    /// The card the commands act on.
    pub sd: &'a VirtualSd,
    /// In-file loop state.
    pub loops: &'a LoopStack,
    /// Print statistics, when the host keeps them.
    pub stats: Option<&'a PrintStatsTracker>,
}

/// Result of executing a command.
pub type CommandResult = Result<CommandOutput, SdError>;

/// Runs a parsed command.
pub async fn dispatch(ctx: &CommandContext<'_>, command: Command) -> CommandResult {
    if let Some(def) = command.name().and_then(find_command) {
        if !def.allowed_from_sd && ctx.sd.is_cmd_from_sd() {
            return Err(SdError::invalid_argument(format!(
                "{} cannot be run from the sdcard",
                def.name
            )));
        }
    }

    match command {
        Command::ListFiles { recursive } => card::handle_list_files(ctx, recursive),
        Command::InitCard => Ok(CommandOutput::info("SD card ok")),
        Command::SelectFile(name) => card::handle_select_file(ctx, &name).await,
        Command::Resume => card::handle_resume(ctx),
        Command::Pause => card::handle_pause(ctx).await,
        Command::SetPosition(position) => card::handle_set_position(ctx, position),
        Command::ReportPosition => Ok(card::handle_report_position(ctx)),
        Command::WriteUnsupported(_) => Err(SdError::invalid_argument("SD write not supported")),
        Command::ResetFile => card::handle_reset_file(ctx).await,
        Command::PrintFile(name) => card::handle_print_file(ctx, &name).await,
        Command::CancelPrint => card::handle_cancel(ctx).await,
        Command::ListParts => Ok(parts::handle_list_parts(ctx)),
        Command::SuppressPart(reference) => Ok(parts::handle_suppress_part(ctx, reference.as_deref())),
        Command::LoopBegin { count } => loops::handle_loop_begin(ctx, count),
        Command::LoopEnd => loops::handle_loop_end(ctx),
        Command::LoopDesist => Ok(loops::handle_loop_desist(ctx)),
        Command::Status => system::handle_status(ctx),
        Command::Help => Ok(system::handle_help()),
        Command::Gcode(line) => Ok(CommandOutput::Forward(line)),
        Command::Empty => Ok(CommandOutput::None),
    }
}
