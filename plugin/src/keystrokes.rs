//! Keystroke aggregation per project and per file.
//!
//! The [`KeystrokeAggregator`] turns editor notifications into one
//! [`KeystrokeSession`] per project root. Each session holds a
//! [`FileCounters`] entry per touched file. Sessions are built lazily on the
//! first event for a project and torn down only by
//! [`KeystrokeAggregator::flush_and_clear`].
//!
//! # Change classification
//!
//! A single change event counts as one keystroke, whatever its size:
//!
//! | Change | Counter |
//! |--------|---------|
//! | insertion longer than [`PASTE_THRESHOLD`] characters | `paste` |
//! | pure deletion | `delete` |
//! | short insertion without a newline | `add` |
//! | short insertion with a newline | line counters only |
//! | nothing inserted, nothing deleted | ignored |
//!
//! Line deltas come from the document line count reported with each change.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use musictime_plugin::events::TextChange;
//! use musictime_plugin::keystrokes::KeystrokeAggregator;
//! use musictime_plugin::types::{PluginEnvironment, ProjectInfo};
//! use musictime_plugin::utils::SystemClock;
//!
//! let mut aggregator =
//!     KeystrokeAggregator::new(PluginEnvironment::detect(13), Arc::new(SystemClock));
//! let project = ProjectInfo::from_directory("/repo");
//!
//! aggregator.on_file_open("/repo/main.ts", &project, 1, 0);
//! aggregator.on_text_change("/repo/main.ts", &project, &TextChange::insert("let", 1));
//!
//! let flushed = aggregator.flush_and_clear();
//! assert_eq!(flushed.len(), 1);
//! assert_eq!(flushed[0].keystrokes, 1);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::events::TextChange;
use crate::types::{FileCounters, KeystrokeSession, PluginEnvironment, ProjectInfo};
use crate::utils::time::{Clock, Timestamp};

/// Inserted text longer than this many characters counts as a paste.
pub const PASTE_THRESHOLD: usize = 8;

/// How an accepted text change was counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Paste,
    Delete,
    /// Short insertion containing a newline.
    Newline,
    /// Nothing inserted or deleted; no counter was touched.
    Ignored,
}

/// File-level enrichment looked up outside the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEnrichment {
    pub syntax: String,
    pub file_age_days: u64,
    pub repo_file_contributor_count: u64,
}

/// Accumulates edit counters into per-project sessions.
///
/// Not thread-safe by itself; the engine keeps it behind a mutex and only
/// holds the lock for synchronous sections.
pub struct KeystrokeAggregator {
    sessions: BTreeMap<String, KeystrokeSession>,
    env: PluginEnvironment,
    clock: Arc<dyn Clock>,
}

impl KeystrokeAggregator {
    #[must_use]
    pub fn new(env: PluginEnvironment, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: BTreeMap::new(),
            env,
            clock,
        }
    }

    /// Records a file open. `line_count` and `length` describe the document as
    /// opened and seed the line diff.
    pub fn on_file_open(&mut self, file: &str, project: &ProjectInfo, line_count: u64, length: u64) {
        let now = self.clock.now();
        let counters = self.touch_file(file, project, now, Some((line_count, length)));
        counters.open += 1;
        trace!(file, open = counters.open, "file opened");
    }

    /// Records a file close.
    pub fn on_file_close(&mut self, file: &str, project: &ProjectInfo) {
        let now = self.clock.now();
        let counters = self.touch_file(file, project, now, None);
        counters.close += 1;
        trace!(file, close = counters.close, "file closed");
    }

    /// Classifies and records a text change.
    pub fn on_text_change(
        &mut self,
        file: &str,
        project: &ProjectInfo,
        change: &TextChange,
    ) -> ChangeKind {
        let inserted_len = change.inserted.chars().count();
        let deleted_len = if inserted_len == 0 { change.deleted_len } else { 0 };

        if inserted_len == 0 && deleted_len == 0 {
            return ChangeKind::Ignored;
        }

        let has_newline = change.inserted.contains('\n');
        let kind = if inserted_len > PASTE_THRESHOLD {
            ChangeKind::Paste
        } else if deleted_len > 0 {
            ChangeKind::Delete
        } else if has_newline {
            ChangeKind::Newline
        } else {
            ChangeKind::Add
        };

        let now = self.clock.now();
        let counters = self.touch_file(file, project, now, Some((change.line_count, change.length)));

        match kind {
            ChangeKind::Paste => counters.paste += 1,
            ChangeKind::Delete => counters.delete += 1,
            ChangeKind::Add => counters.add += 1,
            ChangeKind::Newline | ChangeKind::Ignored => {}
        }
        counters.netkeys = counters.add as i64 - counters.delete as i64;

        let line_diff = change.line_count as i64 - counters.lines as i64;
        if line_diff < 0 {
            counters.lines_removed += line_diff.unsigned_abs();
        } else if line_diff > 0 {
            counters.lines_added += line_diff as u64;
        }
        if has_newline && counters.lines_added == 0 {
            counters.lines_added = 1;
        }

        counters.lines = change.line_count;
        counters.length = change.length;
        counters.keystrokes += 1;

        if let Some(session) = self.sessions.get_mut(project.key()) {
            session.keystrokes += 1;
        }

        trace!(file, ?kind, "text change recorded");
        kind
    }

    /// Applies enrichment to a file entry. Values already set are kept.
    pub fn enrich_file(&mut self, project: &ProjectInfo, file: &str, enrichment: FileEnrichment) {
        let Some(counters) = self
            .sessions
            .get_mut(project.key())
            .and_then(|session| session.source.get_mut(file))
        else {
            return;
        };

        if counters.syntax.is_empty() {
            counters.syntax = enrichment.syntax;
        }
        if counters.file_age_days == 0 {
            counters.file_age_days = enrichment.file_age_days;
        }
        if counters.repo_file_contributor_count == 0 {
            counters.repo_file_contributor_count = enrichment.repo_file_contributor_count;
        }
    }

    /// Whether a file entry still lacks enrichment.
    #[must_use]
    pub fn needs_enrichment(&self, project: &ProjectInfo, file: &str) -> bool {
        self.sessions
            .get(project.key())
            .and_then(|session| session.source.get(file))
            .is_some_and(|counters| counters.syntax.is_empty() || counters.repo_file_contributor_count == 0)
    }

    /// Sets repository counts on a project session. Values already set are kept.
    pub fn enrich_project(&mut self, project: &ProjectInfo, repo_file_count: u64, repo_contributor_count: u64) {
        if let Some(session) = self.sessions.get_mut(project.key()) {
            if session.repo_file_count == 0 {
                session.repo_file_count = repo_file_count;
            }
            if session.repo_contributor_count == 0 {
                session.repo_contributor_count = repo_contributor_count;
            }
        }
    }

    /// Whether a project session still lacks repository counts.
    #[must_use]
    pub fn needs_project_enrichment(&self, project: &ProjectInfo) -> bool {
        self.sessions
            .get(project.key())
            .is_some_and(|session| session.repo_file_count == 0)
    }

    /// Read access to a live session, mostly for inspection and tests.
    #[must_use]
    pub fn session(&self, project_key: &str) -> Option<&KeystrokeSession> {
        self.sessions.get(project_key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Takes every session worth sending and resets the live map.
    ///
    /// End times are stamped with one shared "now" so all files in the
    /// snapshot agree. Sessions without data are dropped.
    pub fn flush_and_clear(&mut self) -> Vec<KeystrokeSession> {
        let sessions = std::mem::take(&mut self.sessions);
        if sessions.is_empty() {
            return Vec::new();
        }

        let now = self.clock.now();
        let mut flushed = Vec::with_capacity(sessions.len());

        for (key, mut session) in sessions {
            if !has_data(&mut session) {
                debug!(project = %key, "dropping session without data");
                continue;
            }

            session.end = now.utc;
            session.local_end = now.local;
            for counters in session.source.values_mut() {
                if counters.end == 0 {
                    counters.close_at(now);
                }
            }
            flushed.push(session);
        }

        debug!(sessions = flushed.len(), "keystroke sessions flushed");
        flushed
    }

    /// Ensures a session and a file entry exist, force-closing the session's
    /// other open files and reopening this one if it had been closed.
    fn touch_file(
        &mut self,
        file: &str,
        project: &ProjectInfo,
        now: Timestamp,
        doc_stats: Option<(u64, u64)>,
    ) -> &mut FileCounters {
        let key = project.key().to_string();
        let env = &self.env;
        let session = self
            .sessions
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(project = %key, "starting keystroke session");
                let mut project = project.clone();
                if project.directory.is_empty() {
                    project.directory = key.clone();
                }
                KeystrokeSession::new(project, env.clone(), now)
            });

        if session.project.directory != key {
            error!(
                key = %key,
                directory = %session.project.directory,
                "keystroke session stored under a foreign key"
            );
            debug_assert!(false, "keystroke session key collision");
        }

        for (path, counters) in &mut session.source {
            if path != file && counters.is_open() {
                counters.close_at(now);
            }
        }

        let counters = session.source.entry(file.to_string()).or_insert_with(|| {
            let mut counters = FileCounters::started(now);
            if let Some((lines, length)) = doc_stats {
                counters.lines = lines;
                counters.length = length;
            }
            counters
        });

        if !counters.is_open() {
            counters.end = 0;
            counters.local_end = 0;
        }

        counters
    }
}

/// Reconciles a session and reports whether it is worth sending.
///
/// Files that were only opened or only closed, without edits, are dropped.
/// Every remaining file's `keystrokes` is recomputed from its edit counters
/// and the session total is replaced with the sum. A file both opened and
/// closed is kept even without edits and makes the session eligible.
pub fn has_data(session: &mut KeystrokeSession) -> bool {
    let mut found_visit = false;
    let mut tally = 0;

    session.source.retain(|file, counters| {
        let file_tally = counters.tally();
        let opened = counters.open > 0;
        let closed = counters.close > 0;

        if file_tally == 0 && opened != closed {
            trace!(file = %file, "dropping file without edits");
            return false;
        }

        if opened && closed {
            found_visit = true;
        }
        counters.keystrokes = file_tally;
        tally += file_tally;
        true
    });

    if session.keystrokes != tally {
        session.keystrokes = tally;
    }

    found_visit || session.keystrokes > 0
}
