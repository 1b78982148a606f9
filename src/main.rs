//! vsd - stream g-code files from a directory like a printer's SD card.

mod cli;

use cli::{Cli, ScriptSource};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use virtual_sd::backend::CommandBackend;
use virtual_sd::config::Config;
use virtual_sd::console::Console;
use virtual_sd::error::{Result, SdError};
use virtual_sd::logging;
use virtual_sd::scheduler;
use virtual_sd::sdcard::VirtualSd;
use virtual_sd::stats::PrintStatsTracker;

/// How often the binary checks whether the stream went idle.
const IDLE_POLL: Duration = Duration::from_millis(50);
/// How long a stream may take to stop after Ctrl-C before it is dropped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        eprintln!("{}: {}", e.category(), e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_overrides(cli.card_path(), cli.sort_part_names);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let stats = Arc::new(PrintStatsTracker::new());
    let console = Arc::new(Console::new(Some(stats.clone()), tx));
    let sd = VirtualSd::new(&config, console.clone(), stats.clone())?;
    console.attach(sd.downgrade());

    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            println!("{line}");
        }
    });

    let shutdown = console.shutdown_token();
    tokio::select! {
        result = drive(&cli, &console, &sd) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
            shutdown.cancel();
            sd.handle_shutdown();
            if tokio::time::timeout(SHUTDOWN_GRACE, wait_idle(&sd)).await.is_err() {
                sd.abort_work();
            }
        }
    }

    let snapshot = stats.snapshot();
    info!(
        state = snapshot.state.as_str(),
        file = %snapshot.filename,
        duration = snapshot.print_duration,
        "Session finished"
    );

    drop(sd);
    drop(console);
    let _ = printer.await;
    Ok(())
}

/// Feeds the `--print` file and the script to the console, then waits for
/// the stream to finish.
async fn drive(cli: &Cli, console: &Console, sd: &VirtualSd) -> Result<()> {
    if let Some(command) = cli.print_command() {
        run_command(console, &command, cli.echo).await;
    }

    match cli.script_source() {
        ScriptSource::Stdin => feed(console, BufReader::new(tokio::io::stdin()), cli.echo).await?,
        ScriptSource::File(path) => {
            let file = tokio::fs::File::open(&path).await.map_err(|e| {
                SdError::config(format!("Failed to open script {}: {e}", path.display()))
            })?;
            feed(console, BufReader::new(file), cli.echo).await?
        }
    }

    wait_idle(sd).await;
    Ok(())
}

async fn feed<R: AsyncBufRead + Unpin>(console: &Console, reader: R, echo: bool) -> Result<()> {
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        run_command(console, &line, echo).await;
    }
    Ok(())
}

async fn run_command(console: &Console, line: &str, echo: bool) {
    if echo {
        console.respond_raw(&format!("> {line}"));
    }
    // Failures are already reported on the console.
    let _ = console.run_external(line).await;
}

async fn wait_idle(sd: &VirtualSd) {
    while sd.is_active() {
        scheduler::pause_for(IDLE_POLL).await;
    }
}
