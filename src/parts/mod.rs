//! Part ("object") handling.
//!
//! Slicers wrap the moves of each printed object in comment markers:
//!
//! ```text
//! ; object:{"id":"cube_1","center":[60,60]}
//! ; printing object cube_1
//! G1 X60 Y60
//! ; stop printing object cube_1
//! ```
//!
//! The scanner discovers the parts of a file once when it is selected; the
//! registry tracks which part the stream is currently inside and which parts
//! the user has suppressed.

pub mod registry;
pub mod scanner;

pub use registry::{PartListing, PartRegistry, PartsReport, SuppressOutcome};
pub use scanner::scan_parts;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Comment prefix that announces the start of a part.
pub const PART_ANNOUNCE: &str = "; printing object ";
/// Comment prefix that ends a part.
pub const PART_STOP: &str = "; stop printing object ";
/// Comment prefix carrying a JSON [`PartInfo`] payload.
pub const PART_METADATA: &str = "; object:";

/// Metadata published for a part by the slicer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartInfo {
    /// Part identifier; matches the name in the announce marker.
    pub id: String,
    /// Display index (`P<n>`), stamped once the part is matched.
    #[serde(rename = "P", default, skip_serializing_if = "Option::is_none")]
    pub display_index: Option<String>,
    /// Everything else the slicer put in the record.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The parts of one file: ordered identifiers plus metadata keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parts {
    ids: Vec<String>,
    info: HashMap<String, PartInfo>,
}

impl Parts {
    pub fn new(ids: Vec<String>, info: HashMap<String, PartInfo>) -> Self {
        Self { ids, info }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the 1-based display index of `id`.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|p| p == id).map(|i| i + 1)
    }

    /// Returns the part at 1-based `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.ids.get(i))
            .map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|p| p == id)
    }

    /// Metadata for `id`, if the slicer published any.
    pub fn info(&self, id: &str) -> Option<&PartInfo> {
        self.info.get(id)
    }

    /// Metadata of every part that has some, in part order.
    pub fn matched_info(&self) -> impl Iterator<Item = &PartInfo> {
        self.ids.iter().filter_map(|id| self.info.get(id))
    }
}

/// Returns the part name announced in `line`, if any.
pub fn announced_part(line: &str) -> Option<&str> {
    line.find(PART_ANNOUNCE)
        .map(|at| strip_line_end(&line[at + PART_ANNOUNCE.len()..]))
}

/// Returns true if `line` ends the part named `part`.
pub fn ends_part(line: &str, part: &str) -> bool {
    line.find(PART_STOP)
        .map(|at| line[at + PART_STOP.len()..].starts_with(part))
        .unwrap_or(false)
}

fn strip_line_end(s: &str) -> &str {
    s.trim_end_matches(['\r', '\n'])
}
