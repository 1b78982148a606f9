//! Command definitions for declarative command metadata.
//!
//! The command table drives the HELP output and name lookup.

/// Definition of a command.
#[derive(Debug, Clone)]
pub struct CommandDef {
    /// Command word as typed (case-insensitive when matched).
    pub name: &'static str,
    /// Alternative names for the command.
    pub aliases: &'static [&'static str],
    /// Short description shown in help.
    pub description: &'static str,
    /// Usage line.
    pub usage: &'static str,
    /// Whether the command may run from a line streamed off the card.
    pub allowed_from_sd: bool,
    /// Category for grouping in help.
    pub category: CommandCategory,
}

/// Category for grouping commands in help output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCategory {
    /// Card and file commands.
    Card,
    /// Part listing and suppression.
    Parts,
    /// In-file loops.
    Loops,
    /// General commands.
    General,
}

impl CommandCategory {
    /// Returns the display name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Card => "SD card commands",
            Self::Parts => "Part commands",
            Self::Loops => "Loop commands",
            Self::General => "General commands",
        }
    }
}

/// All command definitions.
pub static COMMANDS: &[CommandDef] = &[
    CommandDef {
        name: "M20",
        aliases: &[],
        description: "List files on the card (R: include subdirectories)",
        usage: "M20 [R]",
        allowed_from_sd: true,
        category: CommandCategory::Card,
    },
    CommandDef {
        name: "M21",
        aliases: &[],
        description: "Initialize the card",
        usage: "M21",
        allowed_from_sd: true,
        category: CommandCategory::Card,
    },
    CommandDef {
        name: "M23",
        aliases: &[],
        description: "Select a file",
        usage: "M23 <file>",
        allowed_from_sd: true,
        category: CommandCategory::Card,
    },
    CommandDef {
        name: "M24",
        aliases: &[],
        description: "Start or resume the print",
        usage: "M24",
        allowed_from_sd: true,
        category: CommandCategory::Card,
    },
    CommandDef {
        name: "M25",
        aliases: &[],
        description: "Pause the print",
        usage: "M25",
        allowed_from_sd: true,
        category: CommandCategory::Card,
    },
    CommandDef {
        name: "M26",
        aliases: &[],
        description: "Set the file position (only while idle)",
        usage: "M26 S<position>",
        allowed_from_sd: true,
        category: CommandCategory::Card,
    },
    CommandDef {
        name: "M27",
        aliases: &[],
        description: "Report the print position",
        usage: "M27",
        allowed_from_sd: true,
        category: CommandCategory::Card,
    },
    CommandDef {
        name: "M28",
        aliases: &["M29", "M30"],
        description: "Card writing (not supported)",
        usage: "M28",
        allowed_from_sd: true,
        category: CommandCategory::Card,
    },
    CommandDef {
        name: "SDCARD_RESET_FILE",
        aliases: &[],
        description: "Clears a loaded SD File. Stops the print if necessary",
        usage: "SDCARD_RESET_FILE",
        allowed_from_sd: false,
        category: CommandCategory::Card,
    },
    CommandDef {
        name: "SDCARD_PRINT_FILE",
        aliases: &[],
        description: "Loads a SD file and starts the print. May include files in subdirectories.",
        usage: "SDCARD_PRINT_FILE FILENAME=<file>",
        allowed_from_sd: true,
        category: CommandCategory::Card,
    },
    CommandDef {
        name: "CANCEL_PRINT",
        aliases: &[],
        description: "Cancel the print and close the file",
        usage: "CANCEL_PRINT",
        allowed_from_sd: true,
        category: CommandCategory::Card,
    },
    CommandDef {
        name: "LIST_PARTS",
        aliases: &[],
        description: "List parts name and status in a printing file.",
        usage: "LIST_PARTS",
        allowed_from_sd: true,
        category: CommandCategory::Parts,
    },
    CommandDef {
        name: "SUPPRESS_PART",
        aliases: &[],
        description: "Suppress printing a part. Without PART the current part is suppressed.",
        usage: "SUPPRESS_PART [PART=<name|P<n>>]",
        allowed_from_sd: true,
        category: CommandCategory::Parts,
    },
    CommandDef {
        name: "SDCARD_LOOP_BEGIN",
        aliases: &[],
        description: "Begin a loop in the file (COUNT=0 loops forever)",
        usage: "SDCARD_LOOP_BEGIN COUNT=<n>",
        allowed_from_sd: true,
        category: CommandCategory::Loops,
    },
    CommandDef {
        name: "SDCARD_LOOP_END",
        aliases: &[],
        description: "End the innermost loop",
        usage: "SDCARD_LOOP_END",
        allowed_from_sd: true,
        category: CommandCategory::Loops,
    },
    CommandDef {
        name: "SDCARD_LOOP_DESIST",
        aliases: &[],
        description: "Stop all loops; the file runs on to its end",
        usage: "SDCARD_LOOP_DESIST",
        allowed_from_sd: false,
        category: CommandCategory::Loops,
    },
    CommandDef {
        name: "STATUS",
        aliases: &[],
        description: "Print card and print status as JSON",
        usage: "STATUS",
        allowed_from_sd: true,
        category: CommandCategory::General,
    },
    CommandDef {
        name: "HELP",
        aliases: &[],
        description: "Show this help message",
        usage: "HELP",
        allowed_from_sd: true,
        category: CommandCategory::General,
    },
];

/// Generates the help text from the command table.
pub fn generate_help_text() -> String {
    let categories = [
        CommandCategory::Card,
        CommandCategory::Parts,
        CommandCategory::Loops,
        CommandCategory::General,
    ];

    let category_blocks = categories
        .iter()
        .filter_map(|category| {
            let cmds: Vec<_> = COMMANDS
                .iter()
                .filter(|c| c.category == *category)
                .collect();

            if cmds.is_empty() {
                return None;
            }

            let command_lines = cmds
                .iter()
                .map(|cmd| format!("  {:<36} - {}\n", cmd.usage, cmd.description))
                .collect::<Vec<_>>()
                .join("");

            Some(format!("{}:\n{}\n", category.display_name(), command_lines))
        })
        .collect::<Vec<_>>()
        .join("");

    format!(
        "{}Any other line is forwarded to the machine unchanged.",
        category_blocks
    )
}

/// Finds a command definition by name.
pub fn find_command(name: &str) -> Option<&'static CommandDef> {
    let name_upper = name.to_uppercase();
    COMMANDS
        .iter()
        .find(|c| c.name == name_upper || c.aliases.iter().any(|a| *a == name_upper))
}
