//! Editor events and the document filter applied before aggregation.
//!
//! The editor host forwards open, close and change notifications. Each
//! notification names a document by URI. Only real files (`file:` scheme or a
//! bare path) and unsaved buffers (`untitled:` scheme) are tracked; the
//! plugin's own dashboard files, VCS internals and editor temp files are
//! dropped here so the aggregator never sees them.
//!
//! # Example
//!
//! ```
//! use musictime_plugin::events::DocumentFilter;
//!
//! let filter = DocumentFilter::default();
//! assert_eq!(
//!     filter.accept("file:///repo/src/main.ts").as_deref(),
//!     Some("/repo/src/main.ts")
//! );
//! assert!(filter.accept("git:/repo/src/main.ts").is_none());
//! assert!(filter.accept("/repo/.git/COMMIT_EDITMSG").is_none());
//! ```

use serde::Deserialize;
use tracing::trace;

use crate::types::ProjectInfo;

/// Files the plugin writes for its own UI.
const DASHBOARD_FILES: &[&str] = &["MusicTime.html", "MusicTime.txt", "MusicTimeDashboard"];

/// Path fragments that mark editor or VCS scratch files.
const TEMP_FILE_PATTERNS: &[&str] = &["/.git/", "\\.git\\", ".tmp", ".swp", "~"];

/// A text edit as reported by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChange {
    /// Inserted text. Empty for pure deletions.
    #[serde(default)]
    pub inserted: String,

    /// Length of the replaced range.
    #[serde(default)]
    pub deleted_len: u64,

    /// Document line count after the edit.
    #[serde(default)]
    pub line_count: u64,

    /// Document length after the edit.
    #[serde(default)]
    pub length: u64,
}

impl TextChange {
    /// An insertion of `text` leaving the document at `line_count` lines.
    #[must_use]
    pub fn insert(text: impl Into<String>, line_count: u64) -> Self {
        Self {
            inserted: text.into(),
            line_count,
            ..Self::default()
        }
    }

    /// A deletion of `len` characters leaving the document at `line_count` lines.
    #[must_use]
    pub fn delete(len: u64, line_count: u64) -> Self {
        Self {
            deleted_len: len,
            line_count,
            ..Self::default()
        }
    }
}

/// Notifications forwarded by the editor host, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorEvent {
    Open {
        uri: String,
        #[serde(default)]
        project: ProjectInfo,
        #[serde(default, rename = "lineCount")]
        line_count: u64,
        #[serde(default)]
        length: u64,
    },
    Close {
        uri: String,
        #[serde(default)]
        project: ProjectInfo,
    },
    Change {
        uri: String,
        #[serde(default)]
        project: ProjectInfo,
        change: TextChange,
    },
}

impl EditorEvent {
    #[must_use]
    pub fn uri(&self) -> &str {
        match self {
            Self::Open { uri, .. } | Self::Close { uri, .. } | Self::Change { uri, .. } => uri,
        }
    }

    #[must_use]
    pub fn project(&self) -> &ProjectInfo {
        match self {
            Self::Open { project, .. }
            | Self::Close { project, .. }
            | Self::Change { project, .. } => project,
        }
    }
}

/// Decides which documents are tracked.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    /// Extra path fragments to reject, from configuration.
    excluded: Vec<String>,
}

impl DocumentFilter {
    #[must_use]
    pub fn new(excluded: Vec<String>) -> Self {
        Self { excluded }
    }

    /// Returns the file path for a trackable document URI, or `None` when the
    /// document must be ignored.
    #[must_use]
    pub fn accept(&self, uri: &str) -> Option<String> {
        let path = match uri.split_once(':') {
            Some(("file", rest)) => file_uri_path(rest),
            Some(("untitled", rest)) => rest.to_string(),
            // Windows drive letters look like a one-letter scheme.
            Some((scheme, _)) if scheme.len() == 1 => uri.to_string(),
            Some((scheme, _)) => {
                trace!(scheme, "ignoring non-file document");
                return None;
            }
            None => uri.to_string(),
        };

        if path.is_empty() {
            return None;
        }

        let is_dashboard = DASHBOARD_FILES.iter().any(|name| path.ends_with(name));
        let is_temp = TEMP_FILE_PATTERNS.iter().any(|pat| path.contains(pat));
        let is_excluded = self.excluded.iter().any(|pat| path.contains(pat.as_str()));
        if is_dashboard || is_temp || is_excluded {
            trace!(path = %path, "ignoring excluded document");
            return None;
        }

        Some(path)
    }
}

/// Turns the part of a `file:` URI after the scheme into a local path.
fn file_uri_path(rest: &str) -> String {
    let encoded = rest.trim_start_matches("//");
    let path = match urlencoding::decode(encoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            trace!(error = %e, "keeping undecodable file URI as is");
            encoded.to_string()
        }
    };

    // `/C:/repo` names a Windows drive.
    match path.as_bytes() {
        [b'/', drive, b':', ..] if drive.is_ascii_alphabetic() => path[1..].to_string(),
        _ => path,
    }
}

/// Derives a syntax name from a file extension.
#[must_use]
pub fn syntax_for(file: &str) -> String {
    std::path::Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}
