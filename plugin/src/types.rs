//! Payload types for keystroke and song sessions.
//!
//! This module defines the records exchanged with the Music Time backend and
//! written to the offline queue. Field names follow the backend's wire format,
//! which mixes camelCase counters with snake_case time bounds
//! (`local_start`, `local_end`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::utils::time::{self, Timestamp};

/// Project directory used when an editor event has no workspace folder.
pub const UNNAMED_PROJECT: &str = "Unnamed";

/// Default plugin id reported to the backend.
pub const DEFAULT_PLUGIN_ID: u32 = 13;

/// Identity of the project a keystroke session belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project root path. Sessions are keyed by this value.
    #[serde(default)]
    pub directory: String,

    #[serde(default)]
    pub name: String,

    /// Usually the git remote URL.
    #[serde(default)]
    pub identifier: String,

    /// Opaque repository descriptor passed through to the backend.
    #[serde(default)]
    pub resource: serde_json::Value,
}

impl ProjectInfo {
    /// Creates a project descriptor for a root directory, naming it after the
    /// last path component.
    #[must_use]
    pub fn from_directory(directory: impl Into<String>) -> Self {
        let directory = directory.into();
        let name = std::path::Path::new(&directory)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(&directory)
            .to_string();
        Self {
            directory,
            name,
            ..Self::default()
        }
    }

    /// Returns the session key for this project.
    #[must_use]
    pub fn key(&self) -> &str {
        if self.directory.is_empty() {
            UNNAMED_PROJECT
        } else {
            &self.directory
        }
    }
}

/// Machine and plugin details stamped into every payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginEnvironment {
    pub timezone: String,
    /// UTC offset in minutes.
    pub offset: i64,
    pub plugin_id: u32,
    pub os: String,
    pub version: String,
    pub hostname: String,
}

impl PluginEnvironment {
    /// Detects the environment of the running process.
    #[must_use]
    pub fn detect(plugin_id: u32) -> Self {
        Self {
            timezone: chrono::Local::now().format("%Z").to_string(),
            offset: time::utc_offset_minutes(),
            plugin_id,
            os: format!("{}_{}", std::env::consts::OS, std::env::consts::ARCH),
            version: env!("CARGO_PKG_VERSION").to_string(),
            hostname: gethostname::gethostname()
                .into_string()
                .unwrap_or_else(|_| "unknown".to_string()),
        }
    }
}

/// Edit counters for one file within a keystroke session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCounters {
    #[serde(default)]
    pub add: u64,
    #[serde(default)]
    pub paste: u64,
    #[serde(default)]
    pub delete: u64,
    #[serde(default)]
    pub open: u64,
    #[serde(default)]
    pub close: u64,
    /// `add - delete`. May go negative.
    #[serde(default)]
    pub netkeys: i64,
    #[serde(default)]
    pub lines_added: u64,
    #[serde(default)]
    pub lines_removed: u64,
    #[serde(default)]
    pub keystrokes: u64,

    /// Last observed document length.
    #[serde(default)]
    pub length: u64,
    /// Last observed line count, used to diff line deltas.
    #[serde(default)]
    pub lines: u64,

    #[serde(default)]
    pub start: i64,
    #[serde(default, rename = "local_start")]
    pub local_start: i64,
    /// Zero while the file is the active one in its session.
    #[serde(default)]
    pub end: i64,
    #[serde(default, rename = "local_end")]
    pub local_end: i64,

    #[serde(default)]
    pub syntax: String,
    #[serde(default)]
    pub file_age_days: u64,
    #[serde(default)]
    pub repo_file_contributor_count: u64,

    // Filled in when the record is merged into a song session so each file
    // entry is self-describing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl FileCounters {
    /// Creates zeroed counters for a file first seen at `now`.
    #[must_use]
    pub fn started(now: Timestamp) -> Self {
        Self {
            start: now.utc,
            local_start: now.local,
            ..Self::default()
        }
    }

    /// Whether the file is still the active one (no end stamped).
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.end == 0
    }

    /// Stamps the end time.
    pub fn close_at(&mut self, now: Timestamp) {
        self.end = now.utc;
        self.local_end = now.local;
    }

    /// The authoritative keystroke tally for this file.
    #[must_use]
    pub fn tally(&self) -> u64 {
        self.add + self.paste + self.delete + self.lines_added + self.lines_removed
    }
}

/// Keystroke activity for one project since the last flush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystrokeSession {
    pub project: ProjectInfo,

    /// Running total of accepted changes across all files.
    pub keystrokes: u64,

    pub start: i64,
    #[serde(rename = "local_start")]
    pub local_start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default, rename = "local_end")]
    pub local_end: i64,

    /// One entry per file touched since the last flush.
    #[serde(default)]
    pub source: BTreeMap<String, FileCounters>,

    #[serde(default)]
    pub repo_file_count: u64,
    #[serde(default)]
    pub repo_contributor_count: u64,

    #[serde(flatten)]
    pub env: PluginEnvironment,
}

impl KeystrokeSession {
    #[must_use]
    pub fn new(project: ProjectInfo, env: PluginEnvironment, now: Timestamp) -> Self {
        Self {
            project,
            keystrokes: 0,
            start: now.utc,
            local_start: now.local,
            end: 0,
            local_end: 0,
            source: BTreeMap::new(),
            repo_file_count: 0,
            repo_contributor_count: 0,
            env,
        }
    }
}

/// Playback state reported by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    Playing,
    Paused,
    Stopped,
    #[default]
    NotAssigned,
}

/// Which player produced a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerType {
    SpotifyWeb,
    SpotifyDesktop,
    ItunesDesktop,
    #[default]
    NotAssigned,
}

/// Player families. Spotify web and desktop count as the same player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerFamily {
    Spotify,
    Itunes,
    Unknown,
}

impl PlayerType {
    #[must_use]
    pub fn family(self) -> PlayerFamily {
        match self {
            Self::SpotifyWeb | Self::SpotifyDesktop => PlayerFamily::Spotify,
            Self::ItunesDesktop => PlayerFamily::Itunes,
            Self::NotAssigned => PlayerFamily::Unknown,
        }
    }
}

/// One observation of the active player's track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSnapshot {
    /// Empty when there is no track.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub state: TrackState,
    #[serde(default)]
    pub progress_ms: u64,
    #[serde(default, rename = "duration_ms")]
    pub duration_ms: u64,
    /// Legacy duration field some players report instead of `duration_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, rename = "type")]
    pub player_type: PlayerType,

    #[serde(default)]
    pub start: i64,
    #[serde(default, rename = "local_start")]
    pub local_start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default, rename = "local_end")]
    pub local_end: i64,
}

impl TrackSnapshot {
    /// A track is valid when the player reported an id.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
    }
}

/// The record sent to the backend when a song finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongSessionRecord {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub uri: String,
    #[serde(rename = "duration_ms")]
    pub duration_ms: u64,
    #[serde(rename = "type")]
    pub player_type: PlayerType,

    pub start: i64,
    pub end: i64,
    #[serde(rename = "local_start")]
    pub local_start: i64,
    #[serde(rename = "local_end")]
    pub local_end: i64,

    pub add: u64,
    pub paste: u64,
    pub delete: u64,
    pub netkeys: i64,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub open: u64,
    pub close: u64,
    pub keystrokes: u64,

    pub syntax: String,
    pub timezone: String,
    pub offset: i64,
    pub plugin_id: u32,
    pub os: String,
    pub version: String,

    pub source: BTreeMap<String, FileCounters>,
    pub repo_file_count: u64,
    pub repo_contributor_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_env() -> PluginEnvironment {
        PluginEnvironment {
            timezone: "UTC".to_string(),
            offset: 0,
            plugin_id: DEFAULT_PLUGIN_ID,
            os: "linux_x86_64".to_string(),
            version: "0.1.0".to_string(),
            hostname: "devbox".to_string(),
        }
    }

    #[test]
    fn file_counters_use_backend_field_names() {
        let counters = FileCounters {
            lines_added: 2,
            local_start: 10,
            file_age_days: 3,
            ..FileCounters::default()
        };
        let json = serde_json::to_value(&counters).unwrap();
        assert_eq!(json["linesAdded"], 2);
        assert_eq!(json["local_start"], 10);
        assert_eq!(json["fileAgeDays"], 3);
        assert!(json.get("pluginId").is_none());
    }

    #[test]
    fn keystroke_session_flattens_environment() {
        let session = KeystrokeSession::new(
            ProjectInfo::from_directory("/repo"),
            test_env(),
            Timestamp::with_offset(100, 60),
        );
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["pluginId"], DEFAULT_PLUGIN_ID);
        assert_eq!(json["hostname"], "devbox");
        assert_eq!(json["local_start"], 160);
        assert_eq!(json["project"]["name"], "repo");
    }

    #[test]
    fn project_key_falls_back_to_unnamed() {
        assert_eq!(ProjectInfo::default().key(), UNNAMED_PROJECT);
        assert_eq!(ProjectInfo::from_directory("/a/b").key(), "/a/b");
    }

    #[test]
    fn track_enums_serialize_to_snake_case() {
        assert_eq!(
            serde_json::to_string(&TrackState::NotAssigned).unwrap(),
            "\"not_assigned\""
        );
        assert_eq!(
            serde_json::to_string(&PlayerType::SpotifyDesktop).unwrap(),
            "\"spotify_desktop\""
        );
    }

    #[test]
    fn player_families_group_spotify() {
        assert_eq!(PlayerType::SpotifyWeb.family(), PlayerFamily::Spotify);
        assert_eq!(PlayerType::SpotifyDesktop.family(), PlayerFamily::Spotify);
        assert_eq!(PlayerType::ItunesDesktop.family(), PlayerFamily::Itunes);
        assert_eq!(PlayerType::NotAssigned.family(), PlayerFamily::Unknown);
    }

    #[test]
    fn empty_track_is_invalid() {
        assert!(!TrackSnapshot::default().is_valid());
        let track = TrackSnapshot {
            id: "spotify:track:1".to_string(),
            ..TrackSnapshot::default()
        };
        assert!(track.is_valid());
    }

    #[test]
    fn file_tally_sums_edit_counters() {
        let counters = FileCounters {
            add: 1,
            paste: 2,
            delete: 3,
            lines_added: 4,
            lines_removed: 5,
            open: 9,
            ..FileCounters::default()
        };
        assert_eq!(counters.tally(), 15);
    }
}
