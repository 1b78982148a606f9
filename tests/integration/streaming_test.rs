//! Work loop integration tests.
//!
//! Streams real files from a temp card directory to the recording backend.

use super::{harness, harness_with, wait_idle};
use pretty_assertions::assert_eq;
use std::time::Duration;
use virtual_sd::backend::{MockAction, StatsEvent};
use virtual_sd::SdError;

/// Ten lines of ten bytes each, `G1 X00000` to `G1 X00009`.
fn hundred_byte_file() -> String {
    (0..10).map(|i| format!("G1 X{:05}\n", i)).collect()
}

fn line(i: usize) -> String {
    format!("G1 X{:05}", i)
}

/// Scenario: Streaming a whole file
/// Given a selected file
/// When the stream is resumed
/// Then every line is dispatched in file order
/// And the session is closed with a completion notice
#[tokio::test]
async fn test_stream_runs_to_completion() {
    let h = harness(&[("cube.gcode", "G28\nG1 X1 Y1\n\nM84\n")]);
    h.sd.select_file("cube.gcode", false).await.unwrap();

    h.sd.resume().unwrap();
    assert!(h.sd.is_active());
    assert!(h.sd.stats_line().is_some());
    wait_idle(&h.sd).await;

    assert_eq!(h.backend.executed(), vec!["G28", "G1 X1 Y1", "", "M84"]);
    assert_eq!(h.backend.responses(), vec!["Done printing file"]);
    assert!(!h.sd.has_session());
    assert_eq!(h.sd.stats_line(), None);
    assert_eq!(
        h.stats.events(),
        vec![
            StatsEvent::Reset,
            StatsEvent::CurrentFile("cube.gcode".to_string()),
            StatsEvent::Start,
            StatsEvent::Complete,
        ]
    );
}

/// Scenario: Lines spanning read blocks
/// Given a block size smaller than a line
/// When the file is streamed
/// Then lines are reassembled across blocks
/// And a trailing line without a newline is not dispatched
#[tokio::test]
async fn test_small_blocks_reassemble_lines() {
    let h = harness_with(&[("cube.gcode", "G28\nG1 X10 Y20\nM84\nG1 X5")], |config| {
        config.stream.block_size = 3;
    });
    h.sd.select_file("cube.gcode", false).await.unwrap();

    h.sd.resume().unwrap();
    wait_idle(&h.sd).await;

    assert_eq!(h.backend.executed(), vec!["G28", "G1 X10 Y20", "M84"]);
    assert_eq!(h.stats.last(), Some(StatsEvent::Complete));
}

/// Scenario: Jump from inside a dispatched line
/// Given a 100 byte file of ten 10-byte lines
/// When the line ending at byte 40 redirects the stream to byte 10
/// Then the stream re-reads from byte 10 with its buffers cleared
#[tokio::test]
async fn test_in_stream_jump_rereads_from_target() {
    let h = harness(&[("jump.gcode", &hundred_byte_file())]);
    let selected = h.sd.select_file("jump.gcode", false).await.unwrap();
    assert_eq!(selected.size, 100);
    h.backend.on_line(line(3), MockAction::Jump(10));

    h.sd.resume().unwrap();
    wait_idle(&h.sd).await;

    let mut expected: Vec<String> = (0..4).map(line).collect();
    expected.extend((1..10).map(line));
    assert_eq!(h.backend.executed(), expected);
    assert_eq!(h.stats.last(), Some(StatsEvent::Complete));
}

/// Scenario: Jump to where the stream is headed anyway
/// Given a dispatched line ending at byte 30
/// When it redirects the stream to byte 30
/// Then no seek happens and every line is dispatched once
#[tokio::test]
async fn test_jump_to_current_position_is_not_a_jump() {
    let h = harness(&[("jump.gcode", &hundred_byte_file())]);
    h.sd.select_file("jump.gcode", false).await.unwrap();
    h.backend.on_line(line(2), MockAction::Jump(30));

    h.sd.resume().unwrap();
    wait_idle(&h.sd).await;

    let expected: Vec<String> = (0..10).map(line).collect();
    assert_eq!(h.backend.executed(), expected);
}

/// Scenario: Pause from inside a dispatched line
/// Given a line whose command pauses the stream
/// When it is dispatched
/// Then pause returns without waiting for the loop
/// And the loop stops after that line, keeping the session and position
/// And a later resume continues with the next line
#[tokio::test]
async fn test_reentrant_pause_then_resume() {
    let h = harness(&[("cube.gcode", "G28\nM600\nG1 X1\n")]);
    h.sd.select_file("cube.gcode", false).await.unwrap();
    h.backend.on_line("M600", MockAction::Pause);

    h.sd.resume().unwrap();
    wait_idle(&h.sd).await;

    assert_eq!(h.backend.executed(), vec!["G28", "M600"]);
    assert!(h.sd.has_session());
    assert_eq!(h.sd.position(), Some((9, 15)));
    assert_eq!(h.stats.last(), Some(StatsEvent::Pause));

    h.sd.resume().unwrap();
    wait_idle(&h.sd).await;

    assert_eq!(h.backend.executed(), vec!["G28", "M600", "G1 X1"]);
    assert_eq!(h.stats.last(), Some(StatsEvent::Complete));
}

/// Scenario: Pause from outside
/// Given a running stream
/// When pause is called twice
/// Then the first call returns once the loop has stopped
/// And the second call is a no-op
#[tokio::test]
async fn test_external_pause_is_idempotent() {
    let h = harness(&[("jump.gcode", &hundred_byte_file())]);
    h.sd.select_file("jump.gcode", false).await.unwrap();

    h.sd.resume().unwrap();
    h.sd.pause().await;
    assert!(!h.sd.is_active());
    let events = h.stats.events().len();

    h.sd.pause().await;
    assert!(!h.sd.is_active());
    assert_eq!(h.stats.events().len(), events);
    assert_eq!(h.stats.last(), Some(StatsEvent::Pause));
    assert!(h.sd.has_session());
}

/// Scenario: Resume while streaming
/// Given a running stream
/// When resume or select is called again
/// Then both fail with Busy
#[tokio::test]
async fn test_busy_while_streaming() {
    let h = harness(&[("jump.gcode", &hundred_byte_file())]);
    h.sd.select_file("jump.gcode", false).await.unwrap();
    h.backend.set_external_pending(true);

    h.sd.resume().unwrap();
    assert!(matches!(h.sd.resume(), Err(SdError::Busy)));
    assert!(matches!(
        h.sd.select_file("jump.gcode", false).await,
        Err(SdError::Busy)
    ));
    assert!(matches!(h.sd.set_position(0), Err(SdError::Busy)));

    h.backend.set_external_pending(false);
    h.sd.pause().await;
}

/// Scenario: Start from a stored position
/// Given a selected file whose position was set while idle
/// When the stream is resumed
/// Then dispatch starts at that byte
#[tokio::test]
async fn test_set_position_moves_start() {
    let h = harness(&[("jump.gcode", &hundred_byte_file())]);
    h.sd.select_file("jump.gcode", false).await.unwrap();

    h.sd.set_position(70).unwrap();
    assert_eq!(h.sd.position(), Some((70, 100)));
    assert_eq!(h.sd.progress(), 0.7);

    h.sd.resume().unwrap();
    wait_idle(&h.sd).await;

    assert_eq!(h.backend.executed(), vec![line(7), line(8), line(9)]);
}

/// Scenario: A line is rejected
/// Given a line the backend rejects with a user message
/// When it is dispatched
/// Then the stream stops at that line with an error notice
/// And the session is kept at the position of the failed line
#[tokio::test]
async fn test_user_error_stops_stream() {
    let h = harness(&[("cube.gcode", "G28\nG1 X1\nG1 X2\n")]);
    h.sd.select_file("cube.gcode", false).await.unwrap();
    h.backend
        .on_line("G1 X1", MockAction::Fail("Must home axis first".to_string()));

    h.sd.resume().unwrap();
    wait_idle(&h.sd).await;

    assert_eq!(h.backend.executed(), vec!["G28", "G1 X1"]);
    assert!(h.sd.has_session());
    assert_eq!(h.sd.position(), Some((4, 16)));
    assert_eq!(
        h.stats.last(),
        Some(StatsEvent::Error("Must home axis first".to_string()))
    );
}

/// Scenario: The backend fails internally
/// Given a line the backend fails on with an internal error
/// When it is dispatched
/// Then the stream stops as if paused
#[tokio::test]
async fn test_internal_error_pauses_stream() {
    let h = harness(&[("cube.gcode", "G28\nG1 X1\n")]);
    h.sd.select_file("cube.gcode", false).await.unwrap();
    h.backend
        .on_line("G28", MockAction::Crash("lost connection".to_string()));

    h.sd.resume().unwrap();
    wait_idle(&h.sd).await;

    assert_eq!(h.backend.executed(), vec!["G28"]);
    assert!(h.sd.has_session());
    assert_eq!(h.stats.last(), Some(StatsEvent::Pause));
}

/// Scenario: Cancel from inside a dispatched line
/// Given a line whose command cancels the print
/// When it is dispatched
/// Then the loop ends after that line without touching the new state
/// And the terminal notice is completion since no file is loaded
#[tokio::test]
async fn test_cancel_from_dispatch_closes_session() {
    let h = harness(&[("cube.gcode", "G28\nCANCEL\nG1 X1\n")]);
    h.sd.select_file("cube.gcode", false).await.unwrap();
    h.backend.on_line("CANCEL", MockAction::Cancel);

    h.sd.resume().unwrap();
    wait_idle(&h.sd).await;

    assert_eq!(h.backend.executed(), vec!["G28", "CANCEL"]);
    assert!(!h.sd.has_session());
    assert_eq!(h.sd.position(), None);
    assert_eq!(h.sd.status().file_position, 0);
    let events = h.stats.events();
    assert_eq!(
        &events[events.len() - 3..],
        &[StatsEvent::Start, StatsEvent::Cancel, StatsEvent::Complete]
    );
}

/// Scenario: Cancel from outside
/// Given a paused session
/// When cancel is called
/// Then the session is dropped and position and size are zeroed
#[tokio::test]
async fn test_cancel_paused_session() {
    let h = harness(&[("cube.gcode", "G28\nG1 X1\n")]);
    h.sd.select_file("cube.gcode", false).await.unwrap();
    h.sd.set_position(4).unwrap();

    h.sd.cancel().await;

    let status = h.sd.status();
    assert_eq!(status.file_path, None);
    assert_eq!(status.file_position, 0);
    assert_eq!(status.file_size, 0);
    assert_eq!(h.stats.last(), Some(StatsEvent::Cancel));
    assert!(h.backend.executed().is_empty());
}

/// Scenario: Other commands are waiting
/// Given pending external work
/// When the stream runs
/// Then it dispatches nothing until the work is gone
#[tokio::test(start_paused = true)]
async fn test_pending_external_work_holds_stream() {
    let h = harness(&[("cube.gcode", "G28\nG1 X1\n")]);
    h.sd.select_file("cube.gcode", false).await.unwrap();
    h.backend.set_external_pending(true);

    h.sd.resume().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.backend.executed().is_empty());
    assert!(h.sd.is_active());

    h.backend.set_external_pending(false);
    wait_idle(&h.sd).await;
    assert_eq!(h.backend.executed(), vec!["G28", "G1 X1"]);
}

/// Scenario: Losing the handle without finishing
/// Given a stream aborted mid-file
/// When it is resumed
/// Then the file is reopened and streaming continues from the stored position
#[tokio::test]
async fn test_resume_after_abort_reopens_file() {
    let h = harness(&[("cube.gcode", "G28\nG1 X1\n")]);
    h.sd.select_file("cube.gcode", false).await.unwrap();
    h.backend.set_external_pending(true);

    h.sd.resume().unwrap();
    tokio::task::yield_now().await;
    h.sd.abort_work();
    assert!(!h.sd.is_active());
    assert!(h.sd.has_session());

    h.backend.set_external_pending(false);
    h.sd.resume().unwrap();
    wait_idle(&h.sd).await;
    assert_eq!(h.backend.executed(), vec!["G28", "G1 X1"]);
}

/// Scenario: Shutdown while streaming
/// Given a running stream
/// When the host shuts down
/// Then the stream stops and keeps its session
#[tokio::test]
async fn test_shutdown_stops_stream() {
    let h = harness(&[("jump.gcode", &hundred_byte_file())]);
    h.sd.select_file("jump.gcode", false).await.unwrap();
    h.backend.set_external_pending(true);

    h.sd.resume().unwrap();
    h.sd.handle_shutdown();
    h.backend.set_external_pending(false);
    wait_idle(&h.sd).await;

    assert!(h.sd.has_session());
    assert_eq!(h.stats.last(), Some(StatsEvent::Pause));
}

/// Scenario: Resetting a paused file
/// Given a paused session
/// When the file is reset
/// Then nothing is loaded and statistics are reset
#[tokio::test]
async fn test_reset_file_clears_session() {
    let h = harness(&[("cube.gcode", "G28\n")]);
    h.sd.select_file("cube.gcode", false).await.unwrap();

    h.sd.reset_file().await;

    assert!(!h.sd.has_session());
    assert_eq!(h.sd.progress(), 0.0);
    assert_eq!(h.stats.last(), Some(StatsEvent::Reset));
}
