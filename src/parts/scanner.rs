//! Object-boundary scanner.
//!
//! Runs once per selected file, before streaming starts. Collects the part
//! identifiers in encounter order and the metadata records keyed by id in a
//! single pass, then joins the two to stamp display indices.

use super::{PartInfo, Parts, PART_ANNOUNCE, PART_METADATA};
use crate::error::{Result, SdError};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use tracing::{debug, info};

/// Scans `reader` to the end and returns the discovered parts.
///
/// With `sort_by_name` the parts are ordered lexicographically, otherwise in
/// the order they are first announced. Metadata whose id never matches a part
/// is kept out of the listing.
pub fn scan_parts<R: BufRead>(mut reader: R, sort_by_name: bool) -> Result<Parts> {
    info!("Scanning file for parts");

    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut info_by_id: HashMap<String, PartInfo> = HashMap::new();

    let mut raw = Vec::new();
    let mut line_no = 0usize;
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        line_no += 1;

        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(name) = line.strip_prefix(PART_ANNOUNCE) {
            if seen.insert(name.to_string()) {
                ids.push(name.to_string());
            }
        } else if let Some(payload) = line.strip_prefix(PART_METADATA) {
            let record: PartInfo = serde_json::from_str(payload)
                .map_err(|e| SdError::corrupt_metadata(line_no, e.to_string()))?;
            match info_by_id.entry(record.id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(_) => {
                    debug!(id = %record.id, line = line_no, "Duplicate object metadata ignored");
                }
            }
        }
    }

    if sort_by_name {
        ids.sort();
    }

    for (i, id) in ids.iter().enumerate() {
        if let Some(record) = info_by_id.get_mut(id) {
            let index = format!("P{}", i + 1);
            info!("{index} info matched");
            record.display_index = Some(index);
        }
    }

    info!(parts = ids.len(), "Scan done");
    Ok(Parts::new(ids, info_by_id))
}
