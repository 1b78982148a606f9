//! Directory catalog for the card directory.
//!
//! Lists printable files and resolves a requested name to an absolute path.
//! Lookups are exact first, then case-insensitive.

use crate::error::{Result, SdError};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions accepted when searching subdirectories.
pub const VALID_GCODE_EXTS: &[&str] = &["gcode", "g", "gco"];

/// A file on the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// Path relative to the card root, `/`-separated.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

/// Read-only view of the card directory.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the card, sorted case-insensitively by name.
    ///
    /// The flat listing returns every regular, non-hidden file in the root.
    /// The recursive listing follows symlinks and keeps only files whose
    /// extension is in [`VALID_GCODE_EXTS`].
    pub fn list(&self, recursive: bool) -> Result<Vec<CatalogEntry>> {
        let mut entries = if recursive {
            self.list_recursive()?
        } else {
            self.list_flat()?
        };
        entries.sort_by_key(|entry| entry.name.to_lowercase());
        Ok(entries)
    }

    fn list_flat(&self) -> Result<Vec<CatalogEntry>> {
        let dir = fs::read_dir(&self.root).map_err(|e| {
            warn!(root = %self.root.display(), "virtual_sdcard get_file_list: {e}");
            SdError::file_list(e.to_string())
        })?;

        let mut entries = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| SdError::file_list(e.to_string()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            // fs::metadata follows symlinks, like the recursive walk does
            let Ok(meta) = fs::metadata(entry.path()) else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            entries.push(CatalogEntry {
                name,
                size: meta.len(),
            });
        }
        Ok(entries)
    }

    fn list_recursive(&self) -> Result<Vec<CatalogEntry>> {
        if let Err(e) = fs::metadata(&self.root) {
            return Err(SdError::file_list(e.to_string()));
        }

        let mut entries = Vec::new();
        for result in WalkDir::new(&self.root).follow_links(true) {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable card entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_gcode_extension(entry.path()) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    debug!(path = %entry.path().display(), "No metadata: {e}");
                    continue;
                }
            };
            entries.push(CatalogEntry {
                name: relative_name(relative),
                size,
            });
        }
        Ok(entries)
    }

    /// Resolves `requested` to an absolute path inside the card directory.
    pub fn resolve(&self, requested: &str, recursive: bool) -> Result<PathBuf> {
        let entries = self.list(recursive)?;

        let name = if entries.iter().any(|entry| entry.name == requested) {
            requested.to_string()
        } else {
            let by_lower: HashMap<String, &str> = entries
                .iter()
                .map(|entry| (entry.name.to_lowercase(), entry.name.as_str()))
                .collect();
            by_lower
                .get(&requested.to_lowercase())
                .map(|name| name.to_string())
                .ok_or_else(|| SdError::not_found(requested))?
        };

        let path = self.root.join(name);
        Ok(std::path::absolute(&path).unwrap_or(path))
    }
}

fn has_gcode_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VALID_GCODE_EXTS.contains(&ext))
        .unwrap_or(false)
}

fn relative_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
