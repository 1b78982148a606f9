//! Transport-agnostic command output types.
//!
//! Handlers describe what a command produced; the console decides where it
//! goes (stdout, a test buffer, ...).

/// Output from a command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// A response line for whoever issued the command.
    Info(String),

    /// A machine command to forward unchanged.
    Forward(String),

    /// Multiple outputs, in order.
    Multiple(Vec<CommandOutput>),

    /// Nothing to report.
    None,
}

impl CommandOutput {
    /// Creates an info message.
    pub fn info(msg: impl Into<String>) -> Self {
        Self::Info(msg.into())
    }

    /// Creates a list of info lines.
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Multiple(lines.into_iter().map(|l| Self::Info(l.into())).collect())
    }

    /// Flattens into a list of outputs without nesting.
    pub fn flatten(self) -> Vec<CommandOutput> {
        match self {
            Self::Multiple(outputs) => outputs.into_iter().flat_map(Self::flatten).collect(),
            Self::None => Vec::new(),
            other => vec![other],
        }
    }

    /// All response lines, nested outputs included.
    pub fn info_lines(&self) -> Vec<&str> {
        match self {
            Self::Info(line) => vec![line.as_str()],
            Self::Multiple(outputs) => outputs.iter().flat_map(Self::info_lines).collect(),
            Self::Forward(_) | Self::None => Vec::new(),
        }
    }
}
