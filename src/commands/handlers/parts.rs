//! Part command handlers (LIST_PARTS, SUPPRESS_PART).

use super::CommandContext;
use crate::commands::output::CommandOutput;
use crate::parts::{PartInfo, PartsReport, SuppressOutcome};

const FILE_NOT_LOADED: &str = "// File not loaded.";

/// Handle SUPPRESS_PART.
pub fn handle_suppress_part(ctx: &CommandContext<'_>, reference: Option<&str>) -> CommandOutput {
    match ctx.sd.suppress_part(reference) {
        Some(outcome) => CommandOutput::info(format_suppress(&outcome)),
        None => CommandOutput::info(FILE_NOT_LOADED),
    }
}

/// Handle LIST_PARTS.
pub fn handle_list_parts(ctx: &CommandContext<'_>) -> CommandOutput {
    match ctx.sd.parts_report() {
        Some(report) => CommandOutput::lines(format_report(&report)),
        None => CommandOutput::info(FILE_NOT_LOADED),
    }
}

pub fn format_suppress(outcome: &SuppressOutcome) -> String {
    match outcome {
        SuppressOutcome::Added { index, part } => {
            format!("// Part P{} : \"{}\" added to suppression list", index, part)
        }
        SuppressOutcome::AddedCurrent { index, part } => format!(
            "// Part not specified. Adding current part P{} : \"{}\" to suppression list...",
            index, part
        ),
        SuppressOutcome::AlreadySuppressed { index, part } => {
            format!("// Part P{} : \"{}\" ALREADY in suppression list", index, part)
        }
        SuppressOutcome::NotFound(reference) => format!("?? Part \"{}\" not found", reference),
        SuppressOutcome::NoCurrentPart => "// Not printing a part right now.".to_string(),
    }
}

pub fn format_report(report: &PartsReport) -> Vec<String> {
    if report.rows.is_empty() {
        return vec!["// No parts detected in this file.".to_string()];
    }

    let mut lines: Vec<String> = report
        .rows
        .iter()
        .map(|row| {
            let current = if row.current { " : CURRENT" } else { "" };
            let suppressed = if row.suppressed { " : SUPPRESSED" } else { "" };
            format!("// P{} : \"{}\"{}{}", row.index, row.part, current, suppressed)
        })
        .collect();
    lines.push(plate_link(&report.info));
    lines
}

/// HTML link to the plate view, carrying the part metadata as JSON.
fn plate_link(info: &[PartInfo]) -> String {
    let json = serde_json::to_string(info).unwrap_or_else(|_| "[]".to_string());
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("p", &json)
        .finish()
        .replace('+', "%20");
    format!(
        "<a href='plate.html?{}' target='plate'>click here for a plate view</a>",
        query
    )
}
