//! Music Time plugin core.
//!
//! Tracks a developer's keystroke activity, correlates it with the music that
//! is playing, and reports both to the Music Time backend.
//!
//! # Overview
//!
//! Editor notifications flow into the [`keystrokes::KeystrokeAggregator`],
//! which keeps one session per project. Independently, the
//! [`tracker::TrackStateTracker`] polls the music player and classifies each
//! observation. When a song finishes, the [`assembler::SessionAssembler`]
//! merges the keystrokes typed during the song with the track into a
//! [`types::SongSessionRecord`]. Anything that cannot be delivered is kept in
//! an [`offline::OfflinePayloadStore`] and replayed later.
//!
//! The [`engine::Engine`] wires these together behind single-slot flush and
//! poll ticks.
//!
//! # Modules
//!
//! - [`types`]: Payload types shared with the backend
//! - [`events`]: Editor events and the document filter
//! - [`keystrokes`]: Per-project keystroke aggregation
//! - [`offline`]: NDJSON offline queue and batching
//! - [`tracker`]: Track transition detection
//! - [`assembler`]: Song session assembly
//! - [`clients`]: Backend, player and repository collaborators
//! - [`engine`]: Tick coordination and delivery
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types
//! - [`utils`]: Time helpers

pub mod assembler;
pub mod clients;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod keystrokes;
pub mod offline;
pub mod tracker;
pub mod types;
pub mod utils;

pub use assembler::SessionAssembler;
pub use config::Config;
pub use engine::{Collaborators, Engine, FlushReport};
pub use error::{PluginError, Result};
pub use events::{DocumentFilter, EditorEvent, TextChange};
pub use keystrokes::{ChangeKind, KeystrokeAggregator};
pub use offline::{OfflinePayloadStore, MAX_BATCH_SIZE};
pub use tracker::{PollOutcome, TrackStateTracker, TransitionKind};
pub use types::{FileCounters, KeystrokeSession, SongSessionRecord, TrackSnapshot};
