//! Command parsing and routing.
//!
//! Parses a g-code line into a structured command that can be dispatched to
//! handlers. Comments are stripped first; command words are case-insensitive.

use super::tokenizer::{ParseError, Params};

/// Parsed command with arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// M20: list files, `R` for a recursive listing.
    ListFiles { recursive: bool },
    /// M21: initialize the card.
    InitCard,
    /// M23: select a file from the card root.
    SelectFile(String),
    /// M24: start or resume streaming.
    Resume,
    /// M25: pause streaming.
    Pause,
    /// M26: set the stored byte position.
    SetPosition(u64),
    /// M27: report the byte position.
    ReportPosition,
    /// M28, M29, M30: writing to the card.
    WriteUnsupported(String),
    /// SDCARD_RESET_FILE
    ResetFile,
    /// SDCARD_PRINT_FILE FILENAME=<name>
    PrintFile(String),
    /// CANCEL_PRINT
    CancelPrint,
    /// LIST_PARTS
    ListParts,
    /// SUPPRESS_PART [PART=<ref>]
    SuppressPart(Option<String>),
    /// SDCARD_LOOP_BEGIN COUNT=<n>
    LoopBegin { count: u32 },
    /// SDCARD_LOOP_END
    LoopEnd,
    /// SDCARD_LOOP_DESIST
    LoopDesist,
    /// Print the status snapshot as JSON.
    Status,
    /// Show the command table.
    Help,
    /// Anything else: machine g-code, forwarded unchanged.
    Gcode(String),
    /// Blank or comment-only line.
    Empty,
}

impl Command {
    /// Command word as it appears in the command table.
    pub fn name(&self) -> Option<&str> {
        let name = match self {
            Self::ListFiles { .. } => "M20",
            Self::InitCard => "M21",
            Self::SelectFile(_) => "M23",
            Self::Resume => "M24",
            Self::Pause => "M25",
            Self::SetPosition(_) => "M26",
            Self::ReportPosition => "M27",
            Self::WriteUnsupported(name) => name.as_str(),
            Self::ResetFile => "SDCARD_RESET_FILE",
            Self::PrintFile(_) => "SDCARD_PRINT_FILE",
            Self::CancelPrint => "CANCEL_PRINT",
            Self::ListParts => "LIST_PARTS",
            Self::SuppressPart(_) => "SUPPRESS_PART",
            Self::LoopBegin { .. } => "SDCARD_LOOP_BEGIN",
            Self::LoopEnd => "SDCARD_LOOP_END",
            Self::LoopDesist => "SDCARD_LOOP_DESIST",
            Self::Status => "STATUS",
            Self::Help => "HELP",
            Self::Gcode(_) | Self::Empty => return None,
        };
        Some(name)
    }
}

/// Command router for parsing g-code lines.
pub struct CommandRouter;

impl CommandRouter {
    /// Parse one line into a Command.
    pub fn parse(line: &str) -> Result<Command, ParseError> {
        let input = strip_comment(line).trim();
        if input.is_empty() {
            return Ok(Command::Empty);
        }

        let (word, args) = match input.split_once(char::is_whitespace) {
            Some((word, args)) => (word, args.trim()),
            None => (input, ""),
        };
        let command = word.to_uppercase();
        let params = Params::parse(args);

        let parsed = match command.as_str() {
            "M20" => Command::ListFiles {
                recursive: params.has_letter('R'),
            },
            "M21" => Command::InitCard,
            "M23" => Command::SelectFile(Self::parse_m23_filename(args)?),
            "M24" => Command::Resume,
            "M25" => Command::Pause,
            "M26" => Command::SetPosition(Self::parse_m26_position(&params)?),
            "M27" => Command::ReportPosition,
            "M28" | "M29" | "M30" => Command::WriteUnsupported(command),
            "SDCARD_RESET_FILE" => Command::ResetFile,
            "SDCARD_PRINT_FILE" => {
                let filename = params
                    .get("FILENAME")
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| {
                        ParseError::new(&command, "Error on 'SDCARD_PRINT_FILE': missing FILENAME")
                            .with_hint("SDCARD_PRINT_FILE FILENAME=<file>")
                    })?;
                Command::PrintFile(filename.trim_start_matches('/').to_string())
            }
            "CANCEL_PRINT" => Command::CancelPrint,
            "LIST_PARTS" => Command::ListParts,
            "SUPPRESS_PART" => Command::SuppressPart(params.get("PART").map(str::to_string)),
            "SDCARD_LOOP_BEGIN" => Command::LoopBegin {
                count: Self::parse_loop_count(&params)?,
            },
            "SDCARD_LOOP_END" => Command::LoopEnd,
            "SDCARD_LOOP_DESIST" => Command::LoopDesist,
            "STATUS" => Command::Status,
            "HELP" => Command::Help,
            _ => Command::Gcode(input.to_string()),
        };
        Ok(parsed)
    }

    /// The filename is the first word after M23, without any `*checksum`
    /// suffix and without a leading `/`.
    fn parse_m23_filename(args: &str) -> Result<String, ParseError> {
        let word = args.split_whitespace().next().unwrap_or("");
        let name = match word.find('*') {
            Some(star) => word[..star].trim(),
            None => word,
        };
        let name = name.strip_prefix('/').unwrap_or(name);
        if name.is_empty() {
            return Err(ParseError::new("M23", "Unable to extract filename"));
        }
        Ok(name.to_string())
    }

    fn parse_m26_position(params: &Params) -> Result<u64, ParseError> {
        let raw = params.letter_value('S').ok_or_else(|| {
            ParseError::new("M26", "Error on 'M26': missing S").with_hint("M26 S<position>")
        })?;
        let value: i64 = raw.parse().map_err(|_| {
            ParseError::new("M26", format!("Error on 'M26': unable to parse 'S{raw}'"))
        })?;
        u64::try_from(value).map_err(|_| {
            ParseError::new("M26", "Error on 'M26': S must have minimum of 0")
        })
    }

    fn parse_loop_count(params: &Params) -> Result<u32, ParseError> {
        let raw = params.get("COUNT").ok_or_else(|| {
            ParseError::new("SDCARD_LOOP_BEGIN", "Error on 'SDCARD_LOOP_BEGIN': missing COUNT")
                .with_hint("SDCARD_LOOP_BEGIN COUNT=<n>, 0 loops forever")
        })?;
        raw.parse().map_err(|_| {
            ParseError::new(
                "SDCARD_LOOP_BEGIN",
                format!("Error on 'SDCARD_LOOP_BEGIN': unable to parse 'COUNT={raw}'"),
            )
        })
    }
}

/// Drops everything from the first `;` on.
pub fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(at) => &line[..at],
        None => line,
    }
}
