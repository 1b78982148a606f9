//! Console backend integration tests.
//!
//! Drives the card with console lines, the way the binary does, and checks
//! what the console prints.

use super::{wait_idle, write_card};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use virtual_sd::config::Config;
use virtual_sd::console::{Console, ConsoleLine};
use virtual_sd::stats::{PrintState, PrintStatsTracker};
use virtual_sd::VirtualSd;

struct ConsoleHarness {
    _dir: TempDir,
    console: Arc<Console>,
    sd: VirtualSd,
    stats: Arc<PrintStatsTracker>,
    output: mpsc::UnboundedReceiver<ConsoleLine>,
}

impl ConsoleHarness {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = write_card(files);
        let mut config = Config::default();
        config.apply_overrides(Some(dir.path()), false);

        let (tx, output) = mpsc::unbounded_channel();
        let stats = Arc::new(PrintStatsTracker::new());
        let console = Arc::new(Console::new(Some(stats.clone()), tx));
        let sd = VirtualSd::new(&config, console.clone(), stats.clone()).unwrap();
        console.attach(sd.downgrade());
        Self {
            _dir: dir,
            console,
            sd,
            stats,
            output,
        }
    }

    async fn run(&self, line: &str) {
        let _ = self.console.run_external(line).await;
    }

    /// Everything printed so far.
    fn printed(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.output.try_recv() {
            lines.push(line.to_string());
        }
        lines
    }

    /// Machine g-code printed so far.
    fn machine(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.output.try_recv() {
            if let ConsoleLine::Machine(gcode) = line {
                lines.push(gcode);
            }
        }
        lines
    }
}

/// Scenario: Printing a file from a subdirectory
/// Given a file in a subdirectory
/// When SDCARD_PRINT_FILE is run
/// Then the file is selected, streamed, and the print completes
#[tokio::test]
async fn test_print_file_streams_to_machine() {
    let mut h = ConsoleHarness::new(&[("jobs/cube.gcode", "G28 ; home\nG1 X1\n")]);

    h.run("SDCARD_PRINT_FILE FILENAME=/jobs/cube.gcode").await;
    wait_idle(&h.sd).await;

    assert_eq!(
        h.printed(),
        vec![
            "File opened:jobs/cube.gcode Size:17",
            "File selected",
            "0 Parts detected",
            "G28",
            "G1 X1",
            "Done printing file",
        ]
    );
    let snapshot = h.stats.snapshot();
    assert_eq!(snapshot.state, PrintState::Complete);
    assert_eq!(snapshot.filename, "jobs/cube.gcode");
}

/// Scenario: In-file loop
/// Given a file with a loop of two passes
/// When it is printed
/// Then the loop body reaches the machine twice
#[tokio::test]
async fn test_loop_repeats_body() {
    let mut h = ConsoleHarness::new(&[(
        "loop.gcode",
        "SDCARD_LOOP_BEGIN COUNT=2\nG1 X1\nG1 Y1\nSDCARD_LOOP_END\nG1 X2\n",
    )]);

    h.run("M23 loop.gcode").await;
    h.run("M24").await;
    wait_idle(&h.sd).await;

    assert_eq!(h.machine(), vec!["G1 X1", "G1 Y1", "G1 X1", "G1 Y1", "G1 X2"]);
    assert_eq!(h.stats.snapshot().state, PrintState::Complete);
}

/// Scenario: Nested loops
/// Given an inner loop of two passes inside an outer loop of two passes
/// When it is printed
/// Then the inner body runs four times
#[tokio::test]
async fn test_nested_loops() {
    let mut h = ConsoleHarness::new(&[(
        "nested.gcode",
        "SDCARD_LOOP_BEGIN COUNT=2\n\
         G1 Z1\n\
         SDCARD_LOOP_BEGIN COUNT=2\n\
         G1 X1\n\
         SDCARD_LOOP_END\n\
         SDCARD_LOOP_END\n",
    )]);

    h.run("SDCARD_PRINT_FILE FILENAME=nested.gcode").await;
    wait_idle(&h.sd).await;

    assert_eq!(
        h.machine(),
        vec!["G1 Z1", "G1 X1", "G1 X1", "G1 Z1", "G1 X1", "G1 X1"]
    );
}

/// Scenario: Loop commands typed at the console
/// Given no stream
/// When a loop is begun from the console
/// Then it is rejected
#[tokio::test]
async fn test_loop_begin_needs_stream() {
    let mut h = ConsoleHarness::new(&[]);
    h.run("SDCARD_LOOP_BEGIN COUNT=2").await;
    assert_eq!(h.printed(), vec!["!! Only permitted in SD file"]);
}

/// Scenario: A file tries to reset itself
/// Given a file containing SDCARD_RESET_FILE
/// When it is printed
/// Then the command is rejected and the print ends in error
#[tokio::test]
async fn test_reset_from_stream_is_rejected() {
    let mut h = ConsoleHarness::new(&[("bad.gcode", "G28\nSDCARD_RESET_FILE\nG1 X1\n")]);

    h.run("SDCARD_PRINT_FILE FILENAME=bad.gcode").await;
    wait_idle(&h.sd).await;

    let printed = h.printed();
    assert_eq!(
        &printed[3..],
        &["G28", "!! SDCARD_RESET_FILE cannot be run from the sdcard"]
    );
    let snapshot = h.stats.snapshot();
    assert_eq!(snapshot.state, PrintState::Error);
    assert_eq!(
        snapshot.message,
        "SDCARD_RESET_FILE cannot be run from the sdcard"
    );
    assert!(h.sd.has_session());
}

/// Scenario: Suppressing the current part from the file
/// Given a file that suppresses the part it is printing
/// When it is printed
/// Then the rest of that part is skipped
#[tokio::test]
async fn test_suppress_current_part_mid_stream() {
    let mut h = ConsoleHarness::new(&[(
        "plate.gcode",
        "; printing object A\n\
         G1 X1\n\
         SUPPRESS_PART\n\
         G1 X2\n\
         ; stop printing object A\n\
         G1 X3\n",
    )]);

    h.run("SDCARD_PRINT_FILE FILENAME=plate.gcode").await;
    wait_idle(&h.sd).await;

    let printed = h.printed();
    assert_eq!(
        &printed[3..],
        &[
            "G1 X1",
            "// Part not specified. Adding current part P1 : \"A\" to suppression list...",
            "G1 X3",
            "Done printing file",
        ]
    );
}

/// Scenario: Position reports
/// Given a selected file moved to byte 4
/// When M27 is run, then the file is cancelled and M27 is run again
/// Then the first report has the position and the second has none
#[tokio::test]
async fn test_position_report_and_cancel() {
    let mut h = ConsoleHarness::new(&[("cube.gcode", "G28\nG1 X1\n")]);

    h.run("M23 /cube.gcode*42").await;
    h.run("M26 S4").await;
    h.run("M27").await;
    h.run("CANCEL_PRINT").await;
    h.run("M27").await;

    let printed = h.printed();
    assert_eq!(
        &printed[3..],
        &["SD printing byte 4/10", "Not SD printing."]
    );
    assert_eq!(h.stats.snapshot().state, PrintState::Cancelled);
}

/// Scenario: Status snapshot
/// Given a selected file
/// When STATUS is run
/// Then the card status and print statistics are printed as JSON
#[tokio::test]
async fn test_status_is_json() {
    let mut h = ConsoleHarness::new(&[("cube.gcode", "G28\nG1 X1\n")]);
    h.run("M23 cube.gcode").await;
    h.printed();

    h.run("STATUS").await;
    let printed = h.printed();
    assert_eq!(printed.len(), 1);

    let status: serde_json::Value = serde_json::from_str(&printed[0]).unwrap();
    assert_eq!(status["virtual_sdcard"]["file_size"], 10);
    assert_eq!(status["virtual_sdcard"]["is_active"], false);
    assert_eq!(status["print_stats"]["filename"], "cube.gcode");
    assert_eq!(status["print_stats"]["state"], "standby");
}

/// Scenario: Operator commands while printing
/// Given a running print
/// When the operator pauses it from the console
/// Then the stream stops and the print is paused
#[tokio::test]
async fn test_console_pause() {
    let lines: String = (0..50).map(|i| format!("G1 X{}\n", i)).collect();
    let mut h = ConsoleHarness::new(&[("long.gcode", &lines)]);

    h.run("SDCARD_PRINT_FILE FILENAME=long.gcode").await;
    h.run("M25").await;

    assert!(!h.sd.is_active());
    assert!(h.sd.has_session());
    assert_eq!(h.stats.snapshot().state, PrintState::Paused);
    assert!(h.machine().len() < 50);
}
