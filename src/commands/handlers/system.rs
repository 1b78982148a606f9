//! System command handlers (STATUS, HELP).

use super::{CommandContext, CommandResult};
use crate::commands::definitions::generate_help_text;
use crate::commands::output::CommandOutput;
use crate::error::SdError;
use crate::sdcard::SdStatus;
use crate::stats::PrintStatsSnapshot;
use serde::Serialize;

#[derive(Serialize)]
struct StatusReport {
    virtual_sdcard: SdStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    print_stats: Option<PrintStatsSnapshot>,
}

/// Handle STATUS.
pub fn handle_status(ctx: &CommandContext<'_>) -> CommandResult {
    let status = StatusReport {
        virtual_sdcard: ctx.sd.status(),
        print_stats: ctx.stats.map(|stats| stats.snapshot()),
    };
    let text = serde_json::to_string(&status)
        .map_err(|e| SdError::internal(format!("Failed to encode status: {e}")))?;
    Ok(CommandOutput::info(text))
}

/// Handle HELP.
pub fn handle_help() -> CommandOutput {
    CommandOutput::lines(generate_help_text().lines().map(str::to_string))
}
