//! Integration tests for the virtual SD card.

pub mod console_test;
pub mod streaming_test;

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use virtual_sd::backend::{RecordingBackend, RecordingStats};
use virtual_sd::config::Config;
use virtual_sd::VirtualSd;

/// A card directory plus a stream wired to recording collaborators.
pub struct Harness {
    pub dir: TempDir,
    pub sd: VirtualSd,
    pub backend: Arc<RecordingBackend>,
    pub stats: Arc<RecordingStats>,
}

/// Writes `files` (relative paths allowed) into a fresh card directory.
pub fn write_card(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
    dir
}

pub fn harness(files: &[(&str, &str)]) -> Harness {
    harness_with(files, |_| {})
}

pub fn harness_with(files: &[(&str, &str)], configure: impl FnOnce(&mut Config)) -> Harness {
    let dir = write_card(files);
    let mut config = Config::default();
    config.apply_overrides(Some(dir.path()), false);
    configure(&mut config);

    let backend = Arc::new(RecordingBackend::new());
    let stats = Arc::new(RecordingStats::new());
    let sd = VirtualSd::new(&config, backend.clone(), stats.clone()).unwrap();
    backend.attach(sd.downgrade());
    Harness {
        dir,
        sd,
        backend,
        stats,
    }
}

/// Waits until the work loop has exited.
pub async fn wait_idle(sd: &VirtualSd) {
    while sd.is_active() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
