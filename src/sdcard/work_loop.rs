//! The cooperative work loop.
//!
//! One run per `resume()`. Reads the file in blocks, splits it into lines,
//! and hands every line that is not inside a suppressed part to the command
//! backend. Lines are dispatched one at a time; the pause flag is only looked
//! at between two lines.

use super::VirtualSd;
use crate::backend::DispatchError;
use crate::scheduler;
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{error, info};

/// Why the loop stopped.
enum Exit {
    /// Pause requested, or stopped after a failure that keeps the session.
    Stopped,
    /// End of file reached; the session is closed.
    Finished,
    /// The session was closed by a line the loop dispatched.
    SessionClosed,
}

/// Splits a freshly read block into complete lines.
///
/// `partial` holds the unterminated tail of the previous block on entry and
/// the unterminated tail of this block on return. Lines come back in reverse
/// order so the caller can pop them front to back.
pub(crate) fn split_block(partial: &mut Vec<u8>, block: &[u8]) -> Vec<Vec<u8>> {
    let mut lines: Vec<Vec<u8>> = block.split(|&b| b == b'\n').map(<[u8]>::to_vec).collect();
    if let Some(first) = lines.first_mut() {
        let mut joined = std::mem::take(partial);
        joined.extend_from_slice(first);
        *first = joined;
    }
    *partial = lines.pop().unwrap_or_default();
    lines.reverse();
    lines
}

pub(crate) async fn run(sd: VirtualSd) {
    let (mut file, generation, start) = {
        let mut state = sd.lock();
        let position = state.file_position;
        match state.session.as_mut() {
            Some(session) => (session.file.take(), session.generation, position),
            None => {
                error!("virtual_sdcard seek: no file loaded");
                state.work_timer = None;
                return;
            }
        }
    };
    info!("Starting SD card print (position {})", start);

    if file.is_none() {
        // Handle lost with an aborted run; reopen it.
        file = reopen(&sd).await;
    }
    let Some(mut file) = file else {
        sd.lock().work_timer = None;
        return;
    };
    if let Err(e) = file.seek(SeekFrom::Start(start)).await {
        error!(error = %e, "virtual_sdcard seek");
        let mut state = sd.lock();
        state.restore_file(generation, file);
        state.work_timer = None;
        return;
    }

    let stats = sd.inner.stats.clone();
    let backend = sd.inner.backend.clone();
    let block_size = sd.inner.tuning.block_size;
    let backoff = sd.inner.tuning.busy_backoff();

    stats.note_start();

    let mut partial: Vec<u8> = Vec::new();
    let mut lines: Vec<Vec<u8>> = Vec::new();
    let mut block = vec![0u8; block_size];
    let mut error_message: Option<String> = None;

    let exit = loop {
        let must_pause = sd.lock().must_pause_work;
        if must_pause {
            break Exit::Stopped;
        }

        if lines.is_empty() {
            let read = match file.read(&mut block).await {
                Ok(read) => read,
                Err(e) => {
                    error!(error = %e, "virtual_sdcard read");
                    break Exit::Stopped;
                }
            };
            if read == 0 {
                info!("Finished SD card print");
                backend.respond_raw("Done printing file");
                break Exit::Finished;
            }
            lines = split_block(&mut partial, &block[..read]);
            scheduler::yield_now().await;
            continue;
        }

        if backend.has_pending_external_work() {
            scheduler::pause_for(backoff).await;
            continue;
        }

        let Some(raw) = lines.pop() else {
            continue;
        };
        let line = String::from_utf8_lossy(&raw);
        let (expected, dispatch) = {
            let mut state = sd.lock();
            let next = state.file_position + raw.len() as u64 + 1;
            state.cmd_from_sd = true;
            state.next_file_position = next;
            state.parts.observe_line(&line);
            (next, state.parts.should_dispatch())
        };
        if dispatch {
            match backend.execute(&line).await {
                Ok(()) => {}
                Err(DispatchError::User(msg)) => {
                    error_message = Some(msg);
                    break Exit::Stopped;
                }
                Err(DispatchError::Internal(msg)) => {
                    error!(error = %msg, "virtual_sdcard dispatch");
                    break Exit::Stopped;
                }
            }
        }

        let jump = {
            let mut state = sd.lock();
            state.cmd_from_sd = false;
            if !state.owns(generation) {
                break Exit::SessionClosed;
            }
            state.file_position = state.next_file_position;
            (state.next_file_position != expected).then_some(state.file_position)
        };

        if let Some(target) = jump {
            if let Err(e) = file.seek(SeekFrom::Start(target)).await {
                error!(error = %e, position = target, "virtual_sdcard seek");
                let mut state = sd.lock();
                state.restore_file(generation, file);
                state.work_timer = None;
                return;
            }
            lines.clear();
            partial.clear();
        }
    };

    let session_open = {
        let mut state = sd.lock();
        info!("Exiting SD card print (position {})", state.file_position);
        state.work_timer = None;
        state.cmd_from_sd = false;
        match exit {
            Exit::Finished => {
                if state.owns(generation) {
                    state.session = None;
                }
            }
            Exit::Stopped => state.restore_file(generation, file),
            Exit::SessionClosed => {}
        }
        state.session.is_some()
    };

    match error_message {
        Some(msg) => stats.note_error(&msg),
        None if session_open => stats.note_pause(),
        None => stats.note_complete(),
    }
}

async fn reopen(sd: &VirtualSd) -> Option<tokio::fs::File> {
    let path: PathBuf = sd.file_path()?;
    match tokio::fs::File::open(&path).await {
        Ok(file) => Some(file),
        Err(e) => {
            error!(error = %e, path = %path.display(), "virtual_sdcard reopen");
            None
        }
    }
}
