//! Card and file command handlers (M20-M27, SDCARD_*, CANCEL_PRINT).

use super::{CommandContext, CommandResult};
use crate::commands::output::CommandOutput;
use crate::error::SdError;
use crate::sdcard::SelectedFile;
use tracing::info;

/// Handle M20.
pub fn handle_list_files(ctx: &CommandContext<'_>, recursive: bool) -> CommandResult {
    let files = ctx.sd.file_list(recursive)?;
    let mut lines = Vec::with_capacity(files.len() + 2);
    lines.push("Begin file list".to_string());
    lines.extend(files.iter().map(|f| format!("{} {}", f.name, f.size)));
    lines.push("End file list".to_string());
    Ok(CommandOutput::lines(lines))
}

/// Handle M23.
pub async fn handle_select_file(ctx: &CommandContext<'_>, name: &str) -> CommandResult {
    let selected = ctx.sd.select_file(name, false).await?;
    ctx.loops.clear();
    Ok(selection_output(&selected))
}

/// Handle M24.
pub fn handle_resume(ctx: &CommandContext<'_>) -> CommandResult {
    ctx.sd.resume()?;
    Ok(CommandOutput::None)
}

/// Handle M25.
pub async fn handle_pause(ctx: &CommandContext<'_>) -> CommandResult {
    ctx.sd.pause().await;
    Ok(CommandOutput::None)
}

/// Handle M26.
pub fn handle_set_position(ctx: &CommandContext<'_>, position: u64) -> CommandResult {
    ctx.sd.set_position(position)?;
    Ok(CommandOutput::None)
}

/// Handle M27.
pub fn handle_report_position(ctx: &CommandContext<'_>) -> CommandOutput {
    match ctx.sd.position() {
        Some((position, size)) => {
            CommandOutput::info(format!("SD printing byte {}/{}", position, size))
        }
        None => CommandOutput::info("Not SD printing."),
    }
}

/// Handle SDCARD_RESET_FILE.
pub async fn handle_reset_file(ctx: &CommandContext<'_>) -> CommandResult {
    ctx.sd.reset_file().await;
    ctx.loops.clear();
    Ok(CommandOutput::None)
}

/// Handle SDCARD_PRINT_FILE.
pub async fn handle_print_file(ctx: &CommandContext<'_>, name: &str) -> CommandResult {
    if ctx.sd.is_active() {
        return Err(SdError::busy());
    }
    let selected = ctx.sd.select_file(name, true).await?;
    ctx.loops.clear();
    ctx.sd.resume()?;
    info!(file = name, "Print started");
    Ok(selection_output(&selected))
}

/// Handle CANCEL_PRINT.
pub async fn handle_cancel(ctx: &CommandContext<'_>) -> CommandResult {
    ctx.sd.cancel().await;
    ctx.loops.clear();
    Ok(CommandOutput::None)
}

fn selection_output(selected: &SelectedFile) -> CommandOutput {
    let plural = if selected.part_count == 1 { "" } else { "s" };
    CommandOutput::lines([
        format!("File opened:{} Size:{}", selected.name, selected.size),
        "File selected".to_string(),
        format!("{} Part{} detected", selected.part_count, plural),
    ])
}
