//! Virtual SD card: streams g-code files from a directory to a command
//! backend, with pause/resume/cancel, byte-accurate positions, in-stream
//! jumps, and per-part suppression.
//!
//! This library exposes the core modules for the `vsd` binary and for
//! integration tests.

pub mod backend;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod parts;
pub mod scheduler;
pub mod sdcard;
pub mod stats;

pub use error::{Result, SdError};
pub use sdcard::{SdStatus, SelectedFile, VirtualSd, WeakSd};
