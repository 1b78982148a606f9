//! Command parsing and dispatch.
//!
//! Keeps parsing separate from execution so the parser can be tested without
//! a card directory.

pub mod definitions;
pub mod handlers;
pub mod output;
pub mod router;
pub mod tokenizer;

pub use definitions::{find_command, CommandCategory, CommandDef, COMMANDS};
pub use handlers::{dispatch, CommandContext, CommandResult, LoopStack};
pub use output::CommandOutput;
pub use router::{Command, CommandRouter};
pub use tokenizer::{ParseError, Params, Token};
