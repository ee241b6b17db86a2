//! Derived-key extraction from file names.
//!
//! # Overview
//!
//! Cameras, phones and sync tools mark copies by appending a small
//! counter to the original name, as in `IMG_001_1.jpg` or `photo (2).jpg`.
//! This module strips exactly one such trailing marker and reports the
//! counter as a sequence number, so that `IMG_001.jpg` and `IMG_001_1.jpg`
//! share the derived key `IMG_001.jpg`.
//!
//! Recognized markers, directly before the extension:
//! - `_N` where `N` is one or two digits without a leading zero
//! - `(N)` or ` (N)` with any number of digits
//!
//! Names are normalized to Unicode NFC first so that macOS (NFD) and
//! Linux (NFC) spellings of the same name produce the same key.
//!
//! # Example
//!
//! ```
//! use photodedup::scanner::names::parse_file_name;
//!
//! let parsed = parse_file_name("IMG_001_1.jpg");
//! assert_eq!(&*parsed.derived_key, "IMG_001.jpg");
//! assert_eq!(parsed.sequence, 1);
//! ```

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Result of parsing a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Name with the duplicate marker removed, extension kept
    pub derived_key: Arc<str>,
    /// Marker number, 0 if no marker was present
    pub sequence: u64,
}

impl Default for ParsedName {
    fn default() -> Self {
        Self {
            derived_key: Arc::from(""),
            sequence: 0,
        }
    }
}

fn marker_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^(?P<stem>.+?)(?:_(?P<copy>[1-9][0-9]?)|\s*\((?P<paren>[0-9]+)\))(?P<ext>\.[^.]*)?$",
            )
            .map_err(|e| log::error!("Invalid duplicate marker pattern: {}", e))
            .ok()
        })
        .as_ref()
}

/// Parse a bare file name (no directory components).
///
/// Never fails: a name without a recognized marker maps to itself with
/// sequence 0.
#[must_use]
pub fn parse_file_name(name: &str) -> ParsedName {
    let normalized: String = name.nfc().collect();

    let Some(caps) = marker_pattern().and_then(|re| re.captures(&normalized)) else {
        return ParsedName {
            derived_key: Arc::from(normalized),
            sequence: 0,
        };
    };

    let stem = caps.name("stem").map_or("", |m| m.as_str());
    let ext = caps.name("ext").map_or("", |m| m.as_str());
    let sequence = caps
        .name("copy")
        .or_else(|| caps.name("paren"))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(0);

    ParsedName {
        derived_key: Arc::from(format!("{stem}{ext}")),
        sequence,
    }
}

/// Concurrent memo of parsed names for one run.
///
/// Photo libraries repeat the same names across many folders
/// (`IMG_0001.JPG` per camera roll, per year). Workers share one cache
/// so each distinct name is parsed once.
#[derive(Debug, Default)]
pub struct NameCache {
    entries: DashMap<String, ParsedName>,
}

impl NameCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a name, reusing an earlier result when available.
    pub fn parse(&self, name: &str) -> ParsedName {
        if let Some(hit) = self.entries.get(name) {
            return hit.value().clone();
        }
        let parsed = parse_file_name(name);
        self.entries
            .entry(name.to_string())
            .or_insert(parsed)
            .value()
            .clone()
    }

    /// Number of distinct names parsed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been parsed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
