//! Track transition detection.
//!
//! The [`TrackStateTracker`] polls the active player on a fixed cadence and
//! compares each [`TrackSnapshot`] with the track it is currently holding
//! (the "existing track"). Each poll produces one [`TransitionKind`] and, when
//! a song finished, the finished track with its end time stamped.
//!
//! # End detection
//!
//! Two signals end the existing track:
//!
//! - **Track changed**: both the existing and the current track are valid and
//!   their ids differ.
//! - **Track restarted**: a poll saw the track inside the trailing
//!   near-end window (the last 6% by default), and the next poll for the same
//!   id reports progress back at zero. This catches repeat and single-track
//!   playlists where the id never changes.
//!
//! # Reentrancy
//!
//! A poll holds the tracker state for its whole duration, including the
//! player call. A poll that starts while another is running is dropped.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::clients::PlayerClient;
use crate::types::{PlayerFamily, TrackSnapshot, TrackState};
use crate::utils::time::{Clock, Timestamp};

/// Default poll cadence in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default trailing share of a track treated as "near the end".
pub const DEFAULT_NEAR_END_RATIO: f64 = 0.06;

/// Id of the synthetic "Liked Songs" collection.
pub const LIKED_SONGS_PLAYLIST_ID: &str = "Liked Songs";

/// What happened between the previous poll and this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// No valid track is playing and none is held.
    NoTrack,
    /// A track was adopted as the existing track.
    NewTrack,
    /// Same track, same playback state.
    SameTrackSameState,
    /// Same track, playback state changed (e.g. play to pause).
    SameTrackStateChanged,
    /// The existing track finished. A replacement may have been adopted in
    /// the same poll; see [`PollOutcome::running_track`].
    TrackEnded,
    /// The active player switched between Spotify and iTunes.
    PlayerChanged,
}

/// The result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub transition: TransitionKind,
    /// The track that just finished, with `end` stamped.
    pub finished_track: Option<TrackSnapshot>,
    /// The track published to the UI. Empty when nothing is held or control
    /// is not available.
    pub running_track: TrackSnapshot,
    /// Set when the UI should re-render.
    pub refresh_ui: bool,
    /// Set when the near-end window detected a restart.
    pub ended: bool,
    /// URI of the track auto-started from "Liked Songs", if any.
    pub advanced_to: Option<String>,
}

/// The playlist the user is playing from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistSelection {
    pub id: String,
    pub name: String,
    pub tracks: Vec<TrackSnapshot>,
}

impl PlaylistSelection {
    #[must_use]
    pub fn is_liked_songs(&self) -> bool {
        self.id == LIKED_SONGS_PLAYLIST_ID
    }

    /// The track after `track_id`, wrapping to the first. An unknown id starts
    /// from the first track.
    #[must_use]
    pub fn next_after(&self, track_id: &str) -> Option<&TrackSnapshot> {
        if self.tracks.is_empty() {
            return None;
        }
        let next = self
            .tracks
            .iter()
            .position(|t| t.id == track_id)
            .map_or(0, |i| (i + 1) % self.tracks.len());
        self.tracks.get(next)
    }
}

/// Mutable tracker state. Pure transition logic lives here so it can be
/// driven without a player.
#[derive(Debug, Clone)]
pub struct TrackerState {
    existing: Option<TrackSnapshot>,
    /// State reported by the latest poll; `NotAssigned` when it had no track.
    last_seen: TrackState,
    near_end_track_id: Option<String>,
    current_player: PlayerFamily,
    spotify_authenticated: bool,
    selected_playlist: Option<PlaylistSelection>,
    near_end_ratio: f64,
}

impl TrackerState {
    #[must_use]
    pub fn new(near_end_ratio: f64) -> Self {
        Self {
            existing: None,
            last_seen: TrackState::NotAssigned,
            near_end_track_id: None,
            current_player: PlayerFamily::Spotify,
            spotify_authenticated: false,
            selected_playlist: None,
            near_end_ratio,
        }
    }

    #[must_use]
    pub fn existing(&self) -> Option<&TrackSnapshot> {
        self.existing.as_ref()
    }

    /// True while a track is held and the player last reported it playing.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.existing.is_some() && self.last_seen == TrackState::Playing
    }

    #[must_use]
    pub fn current_player(&self) -> PlayerFamily {
        self.current_player
    }

    pub fn set_spotify_authenticated(&mut self, authenticated: bool) {
        self.spotify_authenticated = authenticated;
    }

    pub fn select_playlist(&mut self, selection: Option<PlaylistSelection>) {
        self.selected_playlist = selection;
    }

    /// Applies one observed snapshot and classifies the transition.
    pub fn apply(&mut self, current: TrackSnapshot, now: Timestamp) -> PollOutcome {
        let existing_id = self.existing.as_ref().map_or("", |t| t.id.as_str());
        let existing_state = self
            .existing
            .as_ref()
            .map_or(TrackState::NotAssigned, |t| t.state);

        let is_new_track = existing_id != current.id;
        let state_changed = existing_state != current.state;
        let playing = current.state == TrackState::Playing;
        let paused = current.state == TrackState::Paused;
        let end_prev_track = !existing_id.is_empty() && current.is_valid() && is_new_track;

        let ended = self.detect_restart(&current);
        self.last_seen = if current.is_valid() {
            current.state
        } else {
            TrackState::NotAssigned
        };

        let mut player_changed = false;
        let family = current.player_type.family();
        if playing && family != PlayerFamily::Unknown && family != self.current_player {
            debug!(from = ?self.current_player, to = ?family, "player changed");
            self.current_player = family;
            player_changed = true;
        }

        let mut finished_track = None;
        if ended || end_prev_track {
            if let Some(mut track) = self.existing.take() {
                track.end = now.utc;
                track.local_end = now.local;
                if track.duration_ms == 0 {
                    track.duration_ms = track.duration.unwrap_or(0);
                }
                info!(track = %track.name, id = %track.id, "track finished");
                finished_track = Some(track);
            }
        }

        let mut adopted = false;
        if is_new_track && (playing || paused) && current.is_valid() {
            let mut track = current.clone();
            track.start = now.utc;
            track.local_start = now.local;
            track.end = 0;
            track.local_end = 0;
            info!(track = %track.name, id = %track.id, "track started");
            self.existing = Some(track);
            adopted = true;
        } else if state_changed && !is_new_track {
            if let Some(track) = self.existing.as_mut() {
                track.state = current.state;
            }
        }

        let transition = if finished_track.is_some() {
            TransitionKind::TrackEnded
        } else if adopted {
            TransitionKind::NewTrack
        } else if !current.is_valid() || self.existing.is_none() {
            TransitionKind::NoTrack
        } else if player_changed {
            TransitionKind::PlayerChanged
        } else if state_changed {
            TransitionKind::SameTrackStateChanged
        } else {
            TransitionKind::SameTrackSameState
        };

        PollOutcome {
            transition,
            finished_track,
            running_track: self.running_track(),
            refresh_ui: is_new_track || state_changed || player_changed,
            ended,
            advanced_to: None,
        }
    }

    /// Stamps and releases the existing track, e.g. on shutdown.
    pub fn end_existing(&mut self, now: Timestamp) -> Option<TrackSnapshot> {
        let mut track = self.existing.take()?;
        track.end = now.utc;
        track.local_end = now.local;
        if track.duration_ms == 0 {
            track.duration_ms = track.duration.unwrap_or(0);
        }
        self.near_end_track_id = None;
        self.last_seen = TrackState::NotAssigned;
        Some(track)
    }

    /// The track the UI may show. Empty while Spotify is the active player
    /// but no Spotify user is authenticated.
    #[must_use]
    pub fn running_track(&self) -> TrackSnapshot {
        if self.current_player == PlayerFamily::Spotify && !self.spotify_authenticated {
            return TrackSnapshot::default();
        }
        self.existing.clone().unwrap_or_default()
    }

    /// Tracks the near-end window and reports a restart of the same track.
    fn detect_restart(&mut self, current: &TrackSnapshot) -> bool {
        if !current.is_valid() || current.duration_ms == 0 {
            self.near_end_track_id = None;
            return false;
        }

        let duration = current.duration_ms as f64;
        let in_range = current.progress_ms as f64 >= duration - self.near_end_ratio * duration;

        if in_range {
            trace!(id = %current.id, progress_ms = current.progress_ms, "track near end");
            self.near_end_track_id = Some(current.id.clone());
            return false;
        }

        let restarted = current.progress_ms == 0
            && self.near_end_track_id.as_deref() == Some(current.id.as_str());
        self.near_end_track_id = None;
        restarted
    }
}

/// Polls the player and owns the existing-track slot.
pub struct TrackStateTracker {
    player: Arc<dyn PlayerClient>,
    clock: Arc<dyn Clock>,
    state: Mutex<TrackerState>,
}

impl TrackStateTracker {
    #[must_use]
    pub fn new(player: Arc<dyn PlayerClient>, clock: Arc<dyn Clock>, near_end_ratio: f64) -> Self {
        Self {
            player,
            clock,
            state: Mutex::new(TrackerState::new(near_end_ratio)),
        }
    }

    /// Sets the initial Spotify authentication flag.
    #[must_use]
    pub fn with_spotify_authenticated(mut self, authenticated: bool) -> Self {
        self.state.get_mut().set_spotify_authenticated(authenticated);
        self
    }

    /// Runs one poll. Returns `None` when another poll is still in flight.
    pub async fn poll(&self) -> Option<PollOutcome> {
        let Ok(mut state) = self.state.try_lock() else {
            trace!("poll already in flight, dropping tick");
            return None;
        };

        let current = self.player.get_running_track().await;
        let player_type = current.player_type;
        let current_id = current.id.clone();
        let mut outcome = state.apply(current, self.clock.now());

        if outcome.ended {
            let next = state
                .selected_playlist
                .as_ref()
                .filter(|selection| selection.is_liked_songs())
                .and_then(|selection| selection.next_after(&current_id))
                .map(|track| track.uri.clone());

            if let Some(uri) = next {
                match self.player.play_track(player_type, &uri).await {
                    Ok(()) => {
                        info!(uri = %uri, "advanced to next liked song");
                        outcome.advanced_to = Some(uri);
                    }
                    Err(e) => warn!(error = %e, "failed to advance liked songs"),
                }
            }
        }

        Some(outcome)
    }

    /// The existing track, if any. Waits for an in-flight poll.
    pub async fn existing_track(&self) -> Option<TrackSnapshot> {
        self.state.lock().await.existing().cloned()
    }

    /// Whether keystrokes should currently be credited to the held track.
    pub async fn is_playing(&self) -> bool {
        self.state.lock().await.is_playing()
    }

    /// The track published to the UI.
    pub async fn running_track(&self) -> TrackSnapshot {
        self.state.lock().await.running_track()
    }

    /// Ends the existing track now.
    pub async fn end_existing(&self) -> Option<TrackSnapshot> {
        let now = self.clock.now();
        self.state.lock().await.end_existing(now)
    }

    pub async fn set_spotify_authenticated(&self, authenticated: bool) {
        self.state.lock().await.set_spotify_authenticated(authenticated);
    }

    pub async fn select_playlist(&self, selection: Option<PlaylistSelection>) {
        self.state.lock().await.select_playlist(selection);
    }

    #[must_use]
    pub fn player(&self) -> &Arc<dyn PlayerClient> {
        &self.player
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ClientError, Device};
    use crate::types::PlayerType;
    use crate::utils::time::ManualClock;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    fn track(id: &str, state: TrackState, progress_ms: u64) -> TrackSnapshot {
        TrackSnapshot {
            id: id.to_string(),
            name: format!("song {id}"),
            artist: "artist".to_string(),
            uri: format!("spotify:track:{id}"),
            state,
            progress_ms,
            duration_ms: 100_000,
            player_type: PlayerType::SpotifyDesktop,
            ..TrackSnapshot::default()
        }
    }

    fn at(utc: i64) -> Timestamp {
        Timestamp::with_offset(utc, 0)
    }

    fn state() -> TrackerState {
        TrackerState::new(DEFAULT_NEAR_END_RATIO)
    }

    #[test]
    fn empty_player_is_no_track() {
        let mut state = state();
        let outcome = state.apply(TrackSnapshot::default(), at(1));
        assert_eq!(outcome.transition, TransitionKind::NoTrack);
        assert!(outcome.finished_track.is_none());
        assert!(!outcome.refresh_ui);
    }

    #[test]
    fn playing_track_is_adopted_with_start() {
        let mut state = state();
        let outcome = state.apply(track("a", TrackState::Playing, 0), at(100));
        assert_eq!(outcome.transition, TransitionKind::NewTrack);
        assert!(outcome.refresh_ui);

        let existing = state.existing().unwrap();
        assert_eq!(existing.start, 100);
        assert_eq!(existing.end, 0);
    }

    #[test]
    fn stopped_track_is_not_adopted() {
        let mut state = state();
        let outcome = state.apply(track("a", TrackState::Stopped, 0), at(100));
        assert_eq!(outcome.transition, TransitionKind::NoTrack);
        assert!(state.existing().is_none());
    }

    #[test]
    fn same_track_same_state_is_quiet() {
        let mut state = state();
        state.apply(track("a", TrackState::Playing, 0), at(100));
        let outcome = state.apply(track("a", TrackState::Playing, 5_000), at(105));
        assert_eq!(outcome.transition, TransitionKind::SameTrackSameState);
        assert!(!outcome.refresh_ui);
    }

    #[test]
    fn pause_updates_state_only() {
        let mut state = state();
        state.apply(track("a", TrackState::Playing, 0), at(100));
        let outcome = state.apply(track("a", TrackState::Paused, 5_000), at(105));

        assert_eq!(outcome.transition, TransitionKind::SameTrackStateChanged);
        assert!(outcome.refresh_ui);
        let existing = state.existing().unwrap();
        assert_eq!(existing.state, TrackState::Paused);
        assert_eq!(existing.start, 100);
        assert_eq!(existing.progress_ms, 0);
    }

    #[test]
    fn changing_track_finishes_previous_and_adopts_next() {
        let mut state = state();
        state.apply(track("a", TrackState::Playing, 0), at(100));
        let outcome = state.apply(track("b", TrackState::Playing, 0), at(280));

        assert_eq!(outcome.transition, TransitionKind::TrackEnded);
        let finished = outcome.finished_track.unwrap();
        assert_eq!(finished.id, "a");
        assert_eq!(finished.start, 100);
        assert_eq!(finished.end, 280);
        assert_eq!(state.existing().unwrap().id, "b");
        assert_eq!(state.existing().unwrap().start, 280);
    }

    #[test]
    fn player_closing_keeps_existing_track() {
        let mut state = state();
        state.apply(track("a", TrackState::Playing, 0), at(100));
        let outcome = state.apply(TrackSnapshot::default(), at(105));

        assert_eq!(outcome.transition, TransitionKind::NoTrack);
        assert!(outcome.finished_track.is_none());
        assert_eq!(state.existing().unwrap().id, "a");
        assert!(!state.is_playing());
    }

    #[test]
    fn is_playing_follows_latest_poll() {
        let mut state = state();
        assert!(!state.is_playing());

        state.apply(track("a", TrackState::Playing, 0), at(100));
        assert!(state.is_playing());

        state.apply(track("a", TrackState::Paused, 1_000), at(105));
        assert!(!state.is_playing());

        state.apply(track("a", TrackState::Playing, 2_000), at(110));
        assert!(state.is_playing());

        state.end_existing(at(115));
        assert!(!state.is_playing());
    }

    #[test]
    fn restart_after_near_end_ends_track_once() {
        let mut state = state();
        state.apply(track("a", TrackState::Playing, 0), at(0));

        let outcome = state.apply(track("a", TrackState::Playing, 95_000), at(95));
        assert!(!outcome.ended);
        assert_eq!(state.near_end_track_id.as_deref(), Some("a"));

        let outcome = state.apply(track("a", TrackState::Playing, 0), at(101));
        assert!(outcome.ended);
        assert_eq!(outcome.transition, TransitionKind::TrackEnded);
        assert_eq!(outcome.finished_track.unwrap().end, 101);
        assert!(state.near_end_track_id.is_none());
        // The slot is empty until the next poll adopts the replay.
        assert!(state.existing().is_none());

        let outcome = state.apply(track("b", TrackState::Playing, 0), at(106));
        assert!(!outcome.ended);
        assert_eq!(outcome.transition, TransitionKind::NewTrack);
    }

    #[test]
    fn near_end_marker_does_not_carry_across_tracks() {
        let mut state = state();
        state.apply(track("a", TrackState::Playing, 96_000), at(0));
        state.apply(track("a", TrackState::Playing, 40_000), at(5));
        assert!(state.near_end_track_id.is_none());

        let outcome = state.apply(track("a", TrackState::Playing, 0), at(10));
        assert!(!outcome.ended);
    }

    #[test]
    fn unknown_duration_never_counts_as_near_end() {
        let mut state = state();
        let mut current = track("a", TrackState::Playing, 0);
        current.duration_ms = 0;
        state.apply(current.clone(), at(0));
        assert!(state.near_end_track_id.is_none());
    }

    #[test]
    fn legacy_duration_is_backfilled_on_finish() {
        let mut state = state();
        let mut first = track("a", TrackState::Playing, 0);
        first.duration_ms = 0;
        first.duration = Some(180_000);
        state.apply(first, at(0));

        let outcome = state.apply(track("b", TrackState::Playing, 0), at(10));
        assert_eq!(outcome.finished_track.unwrap().duration_ms, 180_000);
    }

    #[test]
    fn switching_to_itunes_flags_player_change() {
        let mut state = state();
        state.set_spotify_authenticated(true);
        state.apply(track("a", TrackState::Playing, 0), at(0));

        let mut itunes = track("a", TrackState::Playing, 1_000);
        itunes.player_type = PlayerType::ItunesDesktop;
        let outcome = state.apply(itunes, at(5));

        assert_eq!(outcome.transition, TransitionKind::PlayerChanged);
        assert!(outcome.refresh_ui);
        assert_eq!(state.current_player(), PlayerFamily::Itunes);
    }

    #[test]
    fn paused_track_does_not_switch_player() {
        let mut state = state();
        let mut itunes = track("a", TrackState::Paused, 0);
        itunes.player_type = PlayerType::ItunesDesktop;
        state.apply(itunes, at(0));
        assert_eq!(state.current_player(), PlayerFamily::Spotify);
    }

    #[test]
    fn unauthenticated_spotify_publishes_empty_track() {
        let mut state = state();
        let outcome = state.apply(track("a", TrackState::Playing, 0), at(0));
        assert!(!outcome.running_track.is_valid());
        assert!(state.existing().is_some());

        state.set_spotify_authenticated(true);
        assert_eq!(state.running_track().id, "a");
    }

    #[test]
    fn itunes_track_is_published_without_spotify_user() {
        let mut state = state();
        let mut itunes = track("a", TrackState::Playing, 0);
        itunes.player_type = PlayerType::ItunesDesktop;
        let outcome = state.apply(itunes, at(0));
        assert_eq!(outcome.running_track.id, "a");
    }

    #[test]
    fn end_existing_stamps_end() {
        let mut state = state();
        state.apply(track("a", TrackState::Playing, 0), at(10));
        let finished = state.end_existing(at(70)).unwrap();
        assert_eq!(finished.end, 70);
        assert!(state.existing().is_none());
        assert!(state.end_existing(at(80)).is_none());
    }

    #[test]
    fn next_liked_song_wraps() {
        let selection = PlaylistSelection {
            id: LIKED_SONGS_PLAYLIST_ID.to_string(),
            name: "Liked Songs".to_string(),
            tracks: vec![
                track("a", TrackState::Paused, 0),
                track("b", TrackState::Paused, 0),
            ],
        };
        assert!(selection.is_liked_songs());
        assert_eq!(selection.next_after("a").unwrap().id, "b");
        assert_eq!(selection.next_after("b").unwrap().id, "a");
        assert_eq!(selection.next_after("zzz").unwrap().id, "a");
        assert!(PlaylistSelection::default().next_after("a").is_none());
    }

    /// Player that replays scripted snapshots and records `play_track` calls.
    #[derive(Default)]
    struct ScriptedPlayer {
        snapshots: StdMutex<VecDeque<TrackSnapshot>>,
        played: StdMutex<Vec<String>>,
        gate: Option<Arc<tokio::sync::Notify>>,
    }

    impl ScriptedPlayer {
        fn new(snapshots: Vec<TrackSnapshot>) -> Self {
            Self {
                snapshots: StdMutex::new(snapshots.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl PlayerClient for ScriptedPlayer {
        async fn get_running_track(&self) -> TrackSnapshot {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.snapshots.lock().unwrap().pop_front().unwrap_or_default()
        }
        async fn play(&self, _: PlayerType) -> Result<(), ClientError> {
            Ok(())
        }
        async fn pause(&self, _: PlayerType) -> Result<(), ClientError> {
            Ok(())
        }
        async fn next(&self, _: PlayerType) -> Result<(), ClientError> {
            Ok(())
        }
        async fn previous(&self, _: PlayerType) -> Result<(), ClientError> {
            Ok(())
        }
        async fn play_track(&self, _: PlayerType, uri: &str) -> Result<(), ClientError> {
            self.played.lock().unwrap().push(uri.to_string());
            Ok(())
        }
        async fn get_devices(&self) -> Vec<Device> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn liked_songs_advance_after_restart() {
        let player = Arc::new(ScriptedPlayer::new(vec![
            track("a", TrackState::Playing, 0),
            track("a", TrackState::Playing, 97_000),
            track("a", TrackState::Playing, 0),
        ]));
        let tracker = TrackStateTracker::new(
            player.clone(),
            Arc::new(ManualClock::new(0)),
            DEFAULT_NEAR_END_RATIO,
        );
        tracker
            .select_playlist(Some(PlaylistSelection {
                id: LIKED_SONGS_PLAYLIST_ID.to_string(),
                name: "Liked Songs".to_string(),
                tracks: vec![
                    track("a", TrackState::Paused, 0),
                    track("b", TrackState::Paused, 0),
                ],
            }))
            .await;

        tracker.poll().await.unwrap();
        tracker.poll().await.unwrap();
        let outcome = tracker.poll().await.unwrap();

        assert!(outcome.ended);
        assert_eq!(outcome.advanced_to.as_deref(), Some("spotify:track:b"));
        assert_eq!(*player.played.lock().unwrap(), vec!["spotify:track:b".to_string()]);
    }

    #[tokio::test]
    async fn restart_outside_liked_songs_does_not_advance() {
        let player = Arc::new(ScriptedPlayer::new(vec![
            track("a", TrackState::Playing, 97_000),
            track("a", TrackState::Playing, 0),
        ]));
        let tracker = TrackStateTracker::new(
            player.clone(),
            Arc::new(ManualClock::new(0)),
            DEFAULT_NEAR_END_RATIO,
        );

        tracker.poll().await.unwrap();
        let outcome = tracker.poll().await.unwrap();
        assert!(outcome.ended);
        assert!(outcome.advanced_to.is_none());
        assert!(player.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlapping_poll_is_dropped() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let player = Arc::new(ScriptedPlayer {
            snapshots: StdMutex::new(vec![track("a", TrackState::Playing, 0)].into()),
            played: StdMutex::new(Vec::new()),
            gate: Some(gate.clone()),
        });
        let tracker = Arc::new(TrackStateTracker::new(
            player,
            Arc::new(ManualClock::new(0)),
            DEFAULT_NEAR_END_RATIO,
        ));

        let first = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.poll().await })
        };
        // Let the first poll take the slot and park on the gate.
        tokio::task::yield_now().await;
        while tracker.state.try_lock().is_ok() {
            tokio::task::yield_now().await;
        }

        assert!(tracker.poll().await.is_none());

        gate.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.transition, TransitionKind::NewTrack);
    }
}
