//! Coordination of the aggregator, tracker and assembler.
//!
//! The [`Engine`] is built once at startup and shared by the event reader and
//! the two timers. It owns every service and collaborator handle; nothing is
//! global.
//!
//! # Ticks
//!
//! - **Flush** ([`Engine::flush_tick`]): replays the offline queues, then takes
//!   the aggregator's sessions. While a song is playing they are held back
//!   for the song session; otherwise they are posted to `/data/batch`.
//! - **Poll** ([`Engine::poll_tick`]): polls the player and, when a song
//!   finished, merges the held and in-flight sessions into a song session
//!   posted to `/music/session`.
//!
//! Each tick runs in a single slot. A tick arriving while the previous one of
//! the same kind is still running is dropped. A flush takes its sessions and
//! picks hold or send inside the poll slot, so it never splits a track
//! boundary. Failed sends land in the offline queue.
//!
//! Editor events only record which files and projects need enrichment. The
//! lookups (filesystem metadata, `git`) run when sessions are taken.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::assembler::SessionAssembler;
use crate::clients::{BackendClient, ClientError, PlayerClient, RepoInfoProvider};
use crate::config::Config;
use crate::events::{syntax_for, DocumentFilter, EditorEvent};
use crate::keystrokes::{ChangeKind, FileEnrichment, KeystrokeAggregator};
use crate::offline::{batches, OfflinePayloadStore};
use crate::tracker::{PollOutcome, TrackStateTracker};
use crate::types::{
    KeystrokeSession, PlayerType, PluginEnvironment, ProjectInfo, SongSessionRecord, TrackSnapshot,
};
use crate::utils::time::Clock;

/// Backend path for keystroke session batches.
pub const KEYSTROKE_BATCH_PATH: &str = "/data/batch";

/// Backend path for a single song session.
pub const SONG_SESSION_PATH: &str = "/music/session";

/// Backend path for song session batches.
pub const SONG_SESSION_BATCH_PATH: &str = "/music/session/batch";

const SECS_PER_DAY: u64 = 86_400;

/// External services the engine depends on.
pub struct Collaborators {
    pub backend: Arc<dyn BackendClient>,
    pub player: Arc<dyn PlayerClient>,
    pub repo_info: Arc<dyn RepoInfoProvider>,
    pub clock: Arc<dyn Clock>,
}

/// Where a payload ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Queued,
    /// Neither sent nor queued; already logged.
    Lost,
}

/// What one flush tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Offline records delivered.
    pub replayed: usize,
    /// Sessions posted directly.
    pub sent: usize,
    /// Sessions written to the offline queue.
    pub queued: usize,
    /// Sessions held for the running song.
    pub held: usize,
}

/// Enrichment requested during the current flush window.
#[derive(Default)]
struct EnrichmentQueue {
    seen_files: HashSet<String>,
    seen_projects: HashSet<String>,
    files: Vec<(ProjectInfo, String)>,
    projects: Vec<(ProjectInfo, String)>,
}

impl EnrichmentQueue {
    fn request(&mut self, project: &ProjectInfo, file: &str) {
        if self.seen_files.insert(format!("{}\u{0}{}", project.key(), file)) {
            self.files.push((project.clone(), file.to_string()));
        }
        if !project.directory.is_empty() && self.seen_projects.insert(project.key().to_string()) {
            self.projects.push((project.clone(), file.to_string()));
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The plugin's core services.
pub struct Engine {
    aggregator: Mutex<KeystrokeAggregator>,
    tracker: TrackStateTracker,
    assembler: SessionAssembler,
    backend: Arc<dyn BackendClient>,
    repo_info: Arc<dyn RepoInfoProvider>,
    keystroke_store: OfflinePayloadStore<KeystrokeSession>,
    song_store: OfflinePayloadStore<SongSessionRecord>,
    /// Sessions flushed while a song was playing.
    pending_song_keystrokes: Mutex<Vec<KeystrokeSession>>,
    enrichment: Mutex<EnrichmentQueue>,
    flush_slot: Mutex<()>,
    poll_slot: Mutex<()>,
    auth_token: Option<String>,
    filter: DocumentFilter,
}

impl Engine {
    #[must_use]
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        let env = PluginEnvironment::detect(config.plugin_id);
        let Collaborators {
            backend,
            player,
            repo_info,
            clock,
        } = collaborators;

        let tracker = TrackStateTracker::new(player, clock.clone(), config.near_end_ratio)
            .with_spotify_authenticated(config.spotify_access_token.is_some());

        Self {
            aggregator: Mutex::new(KeystrokeAggregator::new(env.clone(), clock.clone())),
            tracker,
            assembler: SessionAssembler::new(env, clock),
            backend,
            repo_info,
            keystroke_store: OfflinePayloadStore::new(config.keystroke_store_path()),
            song_store: OfflinePayloadStore::new(config.song_store_path()),
            pending_song_keystrokes: Mutex::new(Vec::new()),
            enrichment: Mutex::new(EnrichmentQueue::default()),
            flush_slot: Mutex::new(()),
            poll_slot: Mutex::new(()),
            auth_token: config.jwt.clone(),
            filter: DocumentFilter::new(config.exclude_patterns.clone()),
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &TrackStateTracker {
        &self.tracker
    }

    /// Applies one editor event. Returns `false` when the document is ignored.
    pub async fn handle_event(&self, event: EditorEvent) -> bool {
        let Some(file) = self.filter.accept(event.uri()) else {
            return false;
        };
        let project = event.project().clone();

        {
            let mut aggregator = self.aggregator.lock().await;
            match &event {
                EditorEvent::Open {
                    line_count, length, ..
                } => aggregator.on_file_open(&file, &project, *line_count, *length),
                EditorEvent::Close { .. } => aggregator.on_file_close(&file, &project),
                EditorEvent::Change { change, .. } => {
                    if aggregator.on_text_change(&file, &project, change) == ChangeKind::Ignored {
                        return true;
                    }
                }
            }
        }

        self.enrichment.lock().await.request(&project, &file);
        true
    }

    /// Runs the enrichment lookups requested since the last call. Each file
    /// and project is looked up once per flush window.
    async fn apply_enrichment(&self) {
        let (files, projects) = {
            let mut queue = self.enrichment.lock().await;
            (
                std::mem::take(&mut queue.files),
                std::mem::take(&mut queue.projects),
            )
        };

        for (project, file) in files {
            let enrichment = FileEnrichment {
                syntax: syntax_for(&file),
                file_age_days: file_age_days(&file).await,
                repo_file_contributor_count: self.repo_info.file_contributor_count(&file).await,
            };
            self.aggregator
                .lock()
                .await
                .enrich_file(&project, &file, enrichment);
        }

        for (project, file) in projects {
            let repo_file_count = self.repo_info.repo_file_count(&project.directory).await;
            let contributors = self.repo_info.contributor_count(&file).await;
            self.aggregator
                .lock()
                .await
                .enrich_project(&project, repo_file_count, contributors);
        }
    }

    /// Runs one flush. Returns `None` when a flush is already running.
    pub async fn flush_tick(&self) -> Option<FlushReport> {
        let Ok(_slot) = self.flush_slot.try_lock() else {
            trace!("flush already in flight, dropping tick");
            return None;
        };

        let mut report = FlushReport {
            replayed: self.replay_offline().await,
            ..FlushReport::default()
        };

        // Slow lookups run before the poll slot is taken.
        self.apply_enrichment().await;

        let sessions = {
            let _poll = self.poll_slot.lock().await;
            let sessions = self.take_sessions().await;
            if sessions.is_empty() {
                return Some(report);
            }
            if self.tracker.is_playing().await {
                report.held = sessions.len();
                self.pending_song_keystrokes.lock().await.extend(sessions);
                debug!(held = report.held, "keystrokes held for running song");
                return Some(report);
            }
            sessions
        };

        let count = sessions.len();
        match self.send_keystrokes(&sessions).await {
            Delivery::Sent => report.sent = count,
            Delivery::Queued => report.queued = count,
            Delivery::Lost => {}
        }
        Some(report)
    }

    /// Runs one poll and delivers the song session when a track finished.
    /// Returns `None` when a poll is already running.
    pub async fn poll_tick(&self) -> Option<PollOutcome> {
        let Ok(_slot) = self.poll_slot.try_lock() else {
            trace!("poll already in flight, dropping tick");
            return None;
        };

        let outcome = self.tracker.poll().await?;
        if let Some(track) = &outcome.finished_track {
            self.finish_song(track).await;
        }
        Some(outcome)
    }

    pub async fn play(&self) -> Result<Option<PollOutcome>, ClientError> {
        let player_type = self.active_player_type().await;
        self.tracker.player().play(player_type).await?;
        Ok(self.poll_tick().await)
    }

    pub async fn pause(&self) -> Result<Option<PollOutcome>, ClientError> {
        let player_type = self.active_player_type().await;
        self.tracker.player().pause(player_type).await?;
        Ok(self.poll_tick().await)
    }

    pub async fn next(&self) -> Result<Option<PollOutcome>, ClientError> {
        let player_type = self.active_player_type().await;
        self.tracker.player().next(player_type).await?;
        Ok(self.poll_tick().await)
    }

    pub async fn previous(&self) -> Result<Option<PollOutcome>, ClientError> {
        let player_type = self.active_player_type().await;
        self.tracker.player().previous(player_type).await?;
        Ok(self.poll_tick().await)
    }

    /// Ends the running song and flushes everything still in memory.
    pub async fn shutdown(&self) {
        let _flush = self.flush_slot.lock().await;
        let _poll = self.poll_slot.lock().await;

        if let Some(track) = self.tracker.end_existing().await {
            info!(track = %track.name, "ending running track on shutdown");
            self.finish_song(&track).await;
        }

        let sessions = self.take_sessions().await;
        if !sessions.is_empty() {
            self.send_keystrokes(&sessions).await;
        }
    }

    /// Enriches and flushes the aggregator, opening a new flush window.
    async fn take_sessions(&self) -> Vec<KeystrokeSession> {
        self.apply_enrichment().await;
        let mut aggregator = self.aggregator.lock().await;
        let flushed = aggregator.flush_and_clear();
        self.enrichment.lock().await.clear();
        flushed
    }

    async fn finish_song(&self, track: &TrackSnapshot) -> Delivery {
        let mut sessions = std::mem::take(&mut *self.pending_song_keystrokes.lock().await);
        sessions.extend(self.take_sessions().await);

        let record = self.assembler.build_song_session(track, &sessions);
        self.send_song(&record).await
    }

    async fn send_song(&self, record: &SongSessionRecord) -> Delivery {
        if let Some(body) = to_body(record) {
            if self.post(SONG_SESSION_PATH, &body).await {
                info!(track = %record.name, keystrokes = record.keystrokes, "song session sent");
                return Delivery::Sent;
            }
        }
        match self.song_store.append(record).await {
            Ok(()) => Delivery::Queued,
            Err(e) => {
                warn!(error = %e, "failed to queue song session");
                Delivery::Lost
            }
        }
    }

    async fn send_keystrokes(&self, sessions: &[KeystrokeSession]) -> Delivery {
        let mut delivery = Delivery::Sent;
        for batch in batches(sessions) {
            if let Some(body) = to_body(batch) {
                if self.post(KEYSTROKE_BATCH_PATH, &body).await {
                    continue;
                }
            }
            delivery = Delivery::Queued;
            for session in batch {
                if let Err(e) = self.keystroke_store.append(session).await {
                    warn!(error = %e, "failed to queue keystroke session");
                    delivery = Delivery::Lost;
                }
            }
        }
        debug!(sessions = sessions.len(), ?delivery, "keystroke sessions delivered");
        delivery
    }

    /// Replays both offline queues in batches. Returns the records delivered.
    pub async fn replay_offline(&self) -> usize {
        if self.auth_token.is_none() {
            return 0;
        }
        let mut delivered = 0;

        let keystrokes = self.keystroke_store.drain_if_online(self.backend.as_ref()).await;
        for batch in batches(&keystrokes) {
            if self.replay_batch(KEYSTROKE_BATCH_PATH, batch).await {
                delivered += batch.len();
            } else {
                self.requeue(&self.keystroke_store, batch).await;
            }
        }

        let songs = self.song_store.drain_if_online(self.backend.as_ref()).await;
        for batch in batches(&songs) {
            if self.replay_batch(SONG_SESSION_BATCH_PATH, batch).await {
                delivered += batch.len();
            } else {
                self.requeue(&self.song_store, batch).await;
            }
        }

        if delivered > 0 {
            info!(records = delivered, "offline records replayed");
        }
        delivered
    }

    async fn replay_batch<T: Serialize>(&self, path: &str, batch: &[T]) -> bool {
        match to_body(batch) {
            Some(body) => self.post(path, &body).await,
            None => false,
        }
    }

    async fn requeue<T>(&self, store: &OfflinePayloadStore<T>, batch: &[T])
    where
        T: Serialize + serde::de::DeserializeOwned + Send,
    {
        for record in batch {
            if let Err(e) = store.append(record).await {
                warn!(error = %e, "failed to requeue offline record");
            }
        }
    }

    /// Posts `body`. Without a token nothing is sent.
    async fn post(&self, path: &str, body: &serde_json::Value) -> bool {
        let Some(token) = self.auth_token.as_deref() else {
            debug!(path, "no backend token, queueing offline");
            return false;
        };
        self.backend.post(path, body, Some(token)).await.is_ok()
    }

    async fn active_player_type(&self) -> PlayerType {
        self.tracker
            .existing_track()
            .await
            .map(|track| track.player_type)
            .filter(|player| *player != PlayerType::NotAssigned)
            .unwrap_or(PlayerType::SpotifyWeb)
    }
}

fn to_body<T: Serialize + ?Sized>(value: &T) -> Option<serde_json::Value> {
    match serde_json::to_value(value) {
        Ok(body) => Some(body),
        Err(e) => {
            warn!(error = %e, "failed to serialize payload");
            None
        }
    }
}

/// Days since the file was created (or last modified where creation time is
/// unavailable). Zero for unsaved buffers.
async fn file_age_days(file: &str) -> u64 {
    let Ok(metadata) = fs::metadata(file).await else {
        return 0;
    };
    let Ok(born) = metadata.created().or_else(|_| metadata.modified()) else {
        return 0;
    };
    SystemTime::now()
        .duration_since(born)
        .map_or(0, |age| age.as_secs() / SECS_PER_DAY)
}
