//! Error types for the virtual SD card.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for virtual SD card operations.
#[derive(Error, Debug)]
pub enum SdError {
    /// An operation that requires an idle stream was invoked while streaming.
    #[error("SD busy")]
    Busy,

    /// The requested file does not exist in the card directory.
    #[error("File not found: {0}")]
    NotFound(String),

    /// The file was found but could not be opened or scanned.
    #[error("Unable to open file")]
    Open {
        /// Name the caller asked for.
        name: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A `; object:` metadata line carried a payload that is not a valid record.
    #[error("Unable to open file: invalid object metadata at line {line}: {message}")]
    CorruptMetadata {
        /// Line number where the payload was found (1-based).
        line: usize,
        /// Parser message.
        message: String,
    },

    /// The card directory could not be listed.
    #[error("Unable to get file list: {0}")]
    FileList(String),

    /// Read or seek failure on an open session.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A command was given malformed or missing parameters.
    #[error("{0}")]
    InvalidArgument(String),

    /// The command backend rejected a line.
    #[error("{0}")]
    Dispatch(String),

    /// Configuration errors (invalid config file, missing card path, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SdError {
    /// Creates a busy error.
    pub fn busy() -> Self {
        Self::Busy
    }

    /// Creates a not-found error for the given file name.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Wraps an I/O failure that happened while opening `name`.
    pub fn open(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Open {
            name: name.into(),
            source,
        }
    }

    /// Creates a corrupt metadata error.
    pub fn corrupt_metadata(line: usize, message: impl Into<String>) -> Self {
        Self::CorruptMetadata {
            line,
            message: message.into(),
        }
    }

    /// Creates a file list error with the given message.
    pub fn file_list(msg: impl Into<String>) -> Self {
        Self::FileList(msg.into())
    }

    /// Creates an invalid argument error with the given message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a dispatch error with the given message.
    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Busy => "Busy",
            Self::NotFound(_) | Self::Open { .. } | Self::CorruptMetadata { .. } => "Open Error",
            Self::FileList(_) | Self::Io(_) => "I/O Error",
            Self::InvalidArgument(_) => "Argument Error",
            Self::Dispatch(_) => "Dispatch Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using SdError.
pub type Result<T> = std::result::Result<T, SdError>;
