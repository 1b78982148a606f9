//! Part suppression registry.
//!
//! Holds the parts of the loaded file, the "current part" cursor the stream
//! moves through, and the set of parts the user asked to skip.

use super::{announced_part, ends_part, PartInfo, Parts};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn display_index_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[Pp](\d+)$").ok())
        .as_ref()
}

/// Result of a suppression request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressOutcome {
    /// The part was added to the suppression set.
    Added { index: usize, part: String },
    /// No reference was given; the current part was added.
    AddedCurrent { index: usize, part: String },
    /// The part was already suppressed.
    AlreadySuppressed { index: usize, part: String },
    /// The reference matched no part.
    NotFound(String),
    /// No reference was given and the stream is not inside a part.
    NoCurrentPart,
}

/// One row of the part listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartListing {
    /// 1-based display index.
    pub index: usize,
    pub part: String,
    pub current: bool,
    pub suppressed: bool,
}

/// Part listing plus the metadata of every listed part, in part order.
#[derive(Debug, Clone, PartialEq)]
pub struct PartsReport {
    pub rows: Vec<PartListing>,
    pub info: Vec<PartInfo>,
}

#[derive(Debug, Default)]
pub struct PartRegistry {
    parts: Parts,
    suppressed: HashSet<String>,
    current: Option<String>,
}

impl PartRegistry {
    /// Replaces the parts with a fresh scan and forgets all suppression.
    pub fn load(&mut self, parts: Parts) {
        self.parts = parts;
        self.suppressed.clear();
        self.current = None;
    }

    pub fn clear(&mut self) {
        self.load(Parts::default());
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_suppressed(&self, part: &str) -> bool {
        self.suppressed.contains(part)
    }

    /// Moves the current-part cursor according to the markers in `line`.
    pub fn observe_line(&mut self, line: &str) {
        if let Some(name) = announced_part(line) {
            self.current = Some(name.to_string());
        } else if let Some(current) = &self.current {
            if ends_part(line, current) {
                self.current = None;
            }
        }
    }

    /// Returns true if lines at the cursor's position should reach the backend.
    pub fn should_dispatch(&self) -> bool {
        match &self.current {
            Some(part) => !self.suppressed.contains(part),
            None => true,
        }
    }

    /// Resolves a user reference to a part identifier.
    ///
    /// `P<n>` (1-based, any case on the `P`) takes priority over a part
    /// literally named like that; anything else must match a part exactly.
    pub fn resolve(&self, reference: &str) -> Option<&str> {
        if let Some(caps) = display_index_pattern().and_then(|re| re.captures(reference)) {
            if let Some(part) = caps[1].parse().ok().and_then(|n: usize| self.parts.get(n)) {
                return Some(part);
            }
        }
        self.parts
            .ids()
            .iter()
            .find(|id| id.as_str() == reference)
            .map(String::as_str)
    }

    /// Adds a part to the suppression set. Without a reference the current
    /// part is used.
    pub fn suppress(&mut self, reference: Option<&str>) -> SuppressOutcome {
        let (part, implicit) = match reference {
            Some(reference) => match self.resolve(reference) {
                Some(part) => (part.to_string(), false),
                None => return SuppressOutcome::NotFound(reference.to_string()),
            },
            None => match &self.current {
                Some(current) if self.parts.contains(current) => (current.clone(), true),
                Some(current) => return SuppressOutcome::NotFound(current.clone()),
                None => return SuppressOutcome::NoCurrentPart,
            },
        };

        let index = self.parts.index_of(&part).unwrap_or_default();
        if !self.suppressed.insert(part.clone()) {
            return SuppressOutcome::AlreadySuppressed { index, part };
        }
        if implicit {
            SuppressOutcome::AddedCurrent { index, part }
        } else {
            SuppressOutcome::Added { index, part }
        }
    }

    /// Lists every part with its index and status flags.
    pub fn listing(&self) -> Vec<PartListing> {
        self.parts
            .ids()
            .iter()
            .enumerate()
            .map(|(i, part)| PartListing {
                index: i + 1,
                part: part.clone(),
                current: self.current.as_deref() == Some(part.as_str()),
                suppressed: self.suppressed.contains(part),
            })
            .collect()
    }

    pub fn report(&self) -> PartsReport {
        PartsReport {
            rows: self.listing(),
            info: self.parts.matched_info().cloned().collect(),
        }
    }
}
