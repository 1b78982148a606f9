//! Command-line argument parsing for vsd.

use clap::Parser;
use std::path::{Path, PathBuf};
use virtual_sd::config::Config;

/// Where console commands come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    Stdin,
    File(PathBuf),
}

/// Streams g-code files from a directory the way a printer streams them
/// from an SD card.
#[derive(Parser, Debug)]
#[command(name = "vsd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Card directory (overrides virtual_sdcard.path)
    #[arg(short = 'p', long, value_name = "DIR", env = "VSD_PATH")]
    pub path: Option<PathBuf>,

    /// Sort discovered parts by name
    #[arg(long)]
    pub sort_part_names: bool,

    /// File with console commands, "-" for stdin
    #[arg(long, value_name = "PATH")]
    pub script: Option<String>,

    /// Start printing FILE before reading commands
    #[arg(long, value_name = "FILE")]
    pub print: Option<String>,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    pub log_file: bool,

    /// Echo each command before running it
    #[arg(long)]
    pub echo: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    pub fn card_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn script_source(&self) -> ScriptSource {
        match self.script.as_deref() {
            None | Some("-") => ScriptSource::Stdin,
            Some(path) => ScriptSource::File(PathBuf::from(path)),
        }
    }

    /// Console line that starts the `--print` file, if one was given.
    pub fn print_command(&self) -> Option<String> {
        self.print
            .as_ref()
            .map(|file| format!("SDCARD_PRINT_FILE FILENAME=\"{}\"", file))
    }
}
