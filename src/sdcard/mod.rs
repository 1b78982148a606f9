//! Virtual SD card stream state machine.
//!
//! [`VirtualSd`] owns the selected file session, the byte position, the part
//! registry and the work timer. The work loop in [`work_loop`] borrows the open
//! file for one run and hands it back when it stops.
//!
//! All state lives behind one mutex that is never held across an await. On the
//! current-thread runtime the loop and its callers interleave only at yield
//! points, so the pause flag plus a short poll is enough to coordinate them.

mod work_loop;

use crate::backend::{CommandBackend, PrintStats};
use crate::catalog::{Catalog, CatalogEntry};
use crate::config::{Config, StreamConfig};
use crate::error::{Result, SdError};
use crate::parts::{scan_parts, PartRegistry, PartsReport, SuppressOutcome};
use crate::scheduler::{self, WorkTimer};
use futures::FutureExt;
use serde::Serialize;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{error, info, warn};

/// Bytes of context logged before the current position on shutdown.
const SHUTDOWN_CONTEXT_BEFORE: u64 = 1024;
/// Bytes of context logged after the current position on shutdown.
const SHUTDOWN_CONTEXT_AFTER: u64 = 128;

/// Snapshot exposed to status pollers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SdStatus {
    pub file_path: Option<PathBuf>,
    pub progress: f64,
    pub is_active: bool,
    pub file_position: u64,
    pub file_size: u64,
}

/// Result of a successful file selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Name as requested by the caller.
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub part_count: usize,
}

struct FileSession {
    path: PathBuf,
    /// `None` while the work loop has the handle.
    file: Option<tokio::fs::File>,
    generation: u64,
}

#[derive(Default)]
struct StreamState {
    session: Option<FileSession>,
    file_position: u64,
    file_size: u64,
    next_file_position: u64,
    must_pause_work: bool,
    cmd_from_sd: bool,
    work_timer: Option<WorkTimer>,
    parts: PartRegistry,
    next_generation: u64,
}

impl StreamState {
    fn owns(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    /// Gives the leased handle back to the session it came from. A handle
    /// from a session that has since been closed is dropped.
    fn restore_file(&mut self, generation: u64, file: tokio::fs::File) {
        match self.session.as_mut() {
            Some(session) if session.generation == generation => session.file = Some(file),
            _ => {}
        }
    }
}

struct Inner {
    catalog: Catalog,
    sort_part_names: bool,
    tuning: StreamConfig,
    backend: Arc<dyn CommandBackend>,
    stats: Arc<dyn PrintStats>,
    state: Mutex<StreamState>,
}

/// Handle to the virtual SD card. Clones share the same card.
#[derive(Clone)]
pub struct VirtualSd {
    inner: Arc<Inner>,
}

/// Non-owning handle, for collaborators that call back into the card.
#[derive(Clone, Default)]
pub struct WeakSd {
    inner: Weak<Inner>,
}

impl WeakSd {
    pub fn upgrade(&self) -> Option<VirtualSd> {
        self.inner.upgrade().map(|inner| VirtualSd { inner })
    }
}

impl VirtualSd {
    pub fn new(
        config: &Config,
        backend: Arc<dyn CommandBackend>,
        stats: Arc<dyn PrintStats>,
    ) -> Result<Self> {
        let root = config.virtual_sdcard.resolved_path()?;
        info!(path = %root.display(), "Virtual SD card ready");
        Ok(Self {
            inner: Arc::new(Inner {
                catalog: Catalog::new(root),
                sort_part_names: config.virtual_sdcard.sort_part_names,
                tuning: config.stream.clone(),
                backend,
                stats,
                state: Mutex::new(StreamState::default()),
            }),
        })
    }

    pub fn downgrade(&self) -> WeakSd {
        WeakSd {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root(&self) -> &Path {
        self.inner.catalog.root()
    }

    /// True while a work loop is scheduled or running.
    pub fn is_active(&self) -> bool {
        self.lock().work_timer.is_some()
    }

    /// True while the line being dispatched came from the card.
    pub fn is_cmd_from_sd(&self) -> bool {
        self.lock().cmd_from_sd
    }

    pub fn has_session(&self) -> bool {
        self.lock().session.is_some()
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.lock().session.as_ref().map(|s| s.path.clone())
    }

    pub fn progress(&self) -> f64 {
        let state = self.lock();
        progress(state.file_position, state.file_size)
    }

    pub fn status(&self) -> SdStatus {
        let state = self.lock();
        SdStatus {
            file_path: state.session.as_ref().map(|s| s.path.clone()),
            progress: progress(state.file_position, state.file_size),
            is_active: state.work_timer.is_some(),
            file_position: state.file_position,
            file_size: state.file_size,
        }
    }

    /// `sd_pos=<n>` while streaming, for periodic stats output.
    pub fn stats_line(&self) -> Option<String> {
        let state = self.lock();
        state
            .work_timer
            .as_ref()
            .map(|_| format!("sd_pos={}", state.file_position))
    }

    /// Position the in-flight line is expected to advance to.
    pub fn get_file_position(&self) -> u64 {
        self.lock().next_file_position
    }

    /// Redirects the stream. Takes effect when the in-flight line returns.
    pub fn set_file_position(&self, position: u64) {
        self.lock().next_file_position = position;
    }

    /// Overwrites the stored position. Only allowed while idle.
    pub fn set_position(&self, position: u64) -> Result<()> {
        let mut state = self.lock();
        if state.work_timer.is_some() {
            return Err(SdError::busy());
        }
        state.file_position = position;
        Ok(())
    }

    /// `(position, size)` of the open session.
    pub fn position(&self) -> Option<(u64, u64)> {
        let state = self.lock();
        state
            .session
            .as_ref()
            .map(|_| (state.file_position, state.file_size))
    }

    pub fn file_list(&self, recursive: bool) -> Result<Vec<CatalogEntry>> {
        self.inner.catalog.list(recursive)
    }

    /// Resets the card, then opens and scans `name`.
    ///
    /// Fails with [`SdError::Busy`] while a stream is active. Nothing of the
    /// new file is kept when resolving, opening or scanning fails.
    pub async fn select_file(&self, name: &str, recursive: bool) -> Result<SelectedFile> {
        if self.is_active() {
            return Err(SdError::busy());
        }
        self.reset_file().await;

        let path = self.inner.catalog.resolve(name, recursive)?;
        let (file, size, parts) = self.open_and_scan(name, &path)?;
        let part_count = parts.len();

        {
            let mut state = self.lock();
            let generation = state.next_generation;
            state.next_generation += 1;
            state.session = Some(FileSession {
                path: path.clone(),
                file: Some(tokio::fs::File::from_std(file)),
                generation,
            });
            state.file_position = 0;
            state.next_file_position = 0;
            state.file_size = size;
            state.parts.load(parts);
        }
        self.inner.stats.set_current_file(name);
        info!(file = name, size, parts = part_count, "File selected");

        Ok(SelectedFile {
            name: name.to_string(),
            path,
            size,
            part_count,
        })
    }

    fn open_and_scan(
        &self,
        name: &str,
        path: &Path,
    ) -> Result<(std::fs::File, u64, crate::parts::Parts)> {
        let open = || -> std::io::Result<(std::fs::File, u64)> {
            let mut file = std::fs::File::open(path)?;
            let size = file.seek(SeekFrom::End(0))?;
            file.seek(SeekFrom::Start(0))?;
            Ok((file, size))
        };
        let (file, size) = open().map_err(|e| {
            error!(file = name, error = %e, "Unable to open file");
            SdError::open(name, e)
        })?;

        let mut reader = BufReader::new(file);
        let parts = scan_parts(&mut reader, self.inner.sort_part_names).map_err(|e| match e {
            SdError::Io(source) => SdError::open(name, source),
            other => other,
        })?;
        let mut file = reader.into_inner();
        file.seek(SeekFrom::Start(0))
            .map_err(|e| SdError::open(name, e))?;
        Ok((file, size, parts))
    }

    /// Pauses, closes the session, and forgets position and parts.
    pub async fn reset_file(&self) {
        if self.has_session() {
            self.pause().await;
        }
        {
            let mut state = self.lock();
            state.session = None;
            state.file_position = 0;
            state.file_size = 0;
            state.parts.clear();
        }
        self.inner.stats.reset();
    }

    /// Schedules the work loop.
    pub fn resume(&self) -> Result<()> {
        let mut state = self.lock();
        if state.work_timer.is_some() {
            return Err(SdError::busy());
        }
        state.must_pause_work = false;
        state.work_timer = Some(scheduler::register_timer(
            work_loop::run(self.clone()).boxed(),
        ));
        Ok(())
    }

    /// Asks the loop to stop and waits until it has.
    ///
    /// Called from a line the loop is dispatching, this only raises the flag:
    /// the loop stops once that line returns.
    pub async fn pause(&self) {
        let poll = self.inner.tuning.pause_poll();
        {
            let mut state = self.lock();
            if state.work_timer.is_none() {
                return;
            }
            state.must_pause_work = true;
        }
        loop {
            {
                let state = self.lock();
                if state.work_timer.is_none() || state.cmd_from_sd {
                    return;
                }
            }
            scheduler::pause_for(poll).await;
        }
    }

    /// Pauses, then drops the session.
    pub async fn cancel(&self) {
        if self.has_session() {
            self.pause().await;
            self.lock().session = None;
            self.inner.stats.note_cancel();
        }
        let mut state = self.lock();
        state.file_position = 0;
        state.file_size = 0;
    }

    /// Adds a part to the suppression list. `None` when no file is loaded.
    pub fn suppress_part(&self, reference: Option<&str>) -> Option<SuppressOutcome> {
        let mut state = self.lock();
        state.session.as_ref()?;
        Some(state.parts.suppress(reference))
    }

    /// Part listing of the loaded file. `None` when no file is loaded.
    pub fn parts_report(&self) -> Option<PartsReport> {
        let state = self.lock();
        state.session.as_ref()?;
        Some(state.parts.report())
    }

    pub fn current_part(&self) -> Option<String> {
        self.lock().parts.current().map(str::to_string)
    }

    /// Drops the work loop without letting it finish. The session stays.
    pub fn abort_work(&self) {
        let mut state = self.lock();
        if let Some(timer) = state.work_timer.take() {
            timer.unregister();
            warn!(position = state.file_position, "SD card work aborted");
        }
        state.cmd_from_sd = false;
    }

    /// Stops streaming and logs the bytes around the current position.
    pub fn handle_shutdown(&self) {
        let (path, position) = {
            let mut state = self.lock();
            if state.work_timer.is_none() {
                return;
            }
            state.must_pause_work = true;
            match state.session.as_ref() {
                Some(session) => (session.path.clone(), state.file_position),
                None => return,
            }
        };

        let read_pos = position.saturating_sub(SHUTDOWN_CONTEXT_BEFORE);
        let read_count = position - read_pos;
        let read = || -> std::io::Result<Vec<u8>> {
            let mut file = std::fs::File::open(&path)?;
            file.seek(SeekFrom::Start(read_pos))?;
            let mut data = Vec::new();
            file.take(read_count + SHUTDOWN_CONTEXT_AFTER)
                .read_to_end(&mut data)?;
            Ok(data)
        };
        match read() {
            Ok(data) => {
                let split = (read_count as usize).min(data.len());
                let (before, after) = data.split_at(split);
                info!(
                    "Virtual sdcard ({}): {:?}\nUpcoming ({}): {:?}",
                    read_pos,
                    String::from_utf8_lossy(before),
                    position,
                    String::from_utf8_lossy(after)
                );
            }
            Err(e) => error!(error = %e, "virtual_sdcard shutdown read"),
        }
    }
}

fn progress(position: u64, size: u64) -> f64 {
    if size == 0 {
        0.0
    } else {
        position as f64 / size as f64
    }
}
