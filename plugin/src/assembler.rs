//! Song session assembly.
//!
//! Merges the keystroke sessions flushed while a song was playing with the
//! finished track into one [`SongSessionRecord`]. Counters are summed across
//! every file of every session; time bounds come from the track.

use std::sync::Arc;

use tracing::debug;

use crate::types::{KeystrokeSession, PluginEnvironment, SongSessionRecord, TrackSnapshot};
use crate::utils::time::Clock;

/// Builds song session records.
pub struct SessionAssembler {
    env: PluginEnvironment,
    clock: Arc<dyn Clock>,
}

impl SessionAssembler {
    #[must_use]
    pub fn new(env: PluginEnvironment, clock: Arc<dyn Clock>) -> Self {
        Self { env, clock }
    }

    /// Returns a zeroed record carrying only the environment fields.
    fn template(&self) -> SongSessionRecord {
        SongSessionRecord {
            id: String::new(),
            name: String::new(),
            artist: String::new(),
            uri: String::new(),
            duration_ms: 0,
            player_type: Default::default(),
            start: 0,
            end: 0,
            local_start: 0,
            local_end: 0,
            add: 0,
            paste: 0,
            delete: 0,
            netkeys: 0,
            lines_added: 0,
            lines_removed: 0,
            open: 0,
            close: 0,
            keystrokes: 0,
            syntax: String::new(),
            timezone: self.env.timezone.clone(),
            offset: self.env.offset,
            plugin_id: self.env.plugin_id,
            os: self.env.os.clone(),
            version: self.env.version.clone(),
            source: Default::default(),
            repo_file_count: 0,
            repo_contributor_count: 0,
        }
    }

    /// Merges `sessions` into a record bounded by `track`.
    ///
    /// The record's `source` is the last session's per-file breakdown. Its
    /// `end` is never zero and never before `start`.
    #[must_use]
    pub fn build_song_session(
        &self,
        track: &TrackSnapshot,
        sessions: &[KeystrokeSession],
    ) -> SongSessionRecord {
        let mut record = self.template();
        let mut total_keystrokes = 0;

        for session in sessions {
            if record.repo_file_count == 0 {
                record.repo_file_count = session.repo_file_count;
            }
            if record.repo_contributor_count == 0 {
                record.repo_contributor_count = session.repo_contributor_count;
            }

            for counters in session.source.values() {
                record.add += counters.add;
                record.paste += counters.paste;
                record.delete += counters.delete;
                record.netkeys += counters.netkeys;
                record.lines_added += counters.lines_added;
                record.lines_removed += counters.lines_removed;
                record.open += counters.open;
                record.close += counters.close;
                total_keystrokes += counters.tally();

                if record.syntax.is_empty() {
                    record.syntax.clone_from(&counters.syntax);
                }
            }
        }
        record.keystrokes = total_keystrokes;

        if let Some(last) = sessions.last() {
            record.source = last.source.clone();
            for counters in record.source.values_mut() {
                counters.keystrokes = counters.tally();
                counters.timezone.get_or_insert_with(|| self.env.timezone.clone());
                counters.offset.get_or_insert(self.env.offset);
                counters.plugin_id.get_or_insert(self.env.plugin_id);
                counters.os.get_or_insert_with(|| self.env.os.clone());
                counters.version.get_or_insert_with(|| self.env.version.clone());
            }
        }

        record.id.clone_from(&track.id);
        record.name.clone_from(&track.name);
        record.artist.clone_from(&track.artist);
        record.uri.clone_from(&track.uri);
        record.player_type = track.player_type;
        record.duration_ms = if track.duration_ms > 0 {
            track.duration_ms
        } else {
            track.duration.unwrap_or(0)
        };

        record.start = track.start;
        record.local_start = track.local_start;
        if track.end > 0 {
            record.end = track.end;
            record.local_end = track.local_end;
        } else {
            let now = self.clock.now();
            record.end = now.utc;
            record.local_end = now.local;
        }
        if record.end < record.start {
            record.end = record.start;
            record.local_end = record.local_start;
        }

        debug!(
            track = %record.name,
            sessions = sessions.len(),
            keystrokes = record.keystrokes,
            "song session assembled"
        );
        record
    }
}
