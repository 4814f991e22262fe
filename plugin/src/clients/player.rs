//! Music player seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ClientError;
use crate::types::{PlayerType, TrackSnapshot};

/// A playback device known to the player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub is_active: bool,
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

/// Controls and observes the active music player.
///
/// `get_running_track` must not fail: when the player is closed or
/// unreachable it returns an empty [`TrackSnapshot`].
#[async_trait]
pub trait PlayerClient: Send + Sync {
    async fn get_running_track(&self) -> TrackSnapshot;

    async fn play(&self, player: PlayerType) -> Result<(), ClientError>;

    async fn pause(&self, player: PlayerType) -> Result<(), ClientError>;

    async fn next(&self, player: PlayerType) -> Result<(), ClientError>;

    async fn previous(&self, player: PlayerType) -> Result<(), ClientError>;

    /// Starts playing a specific track by URI.
    async fn play_track(&self, player: PlayerType, track_uri: &str) -> Result<(), ClientError>;

    async fn get_devices(&self) -> Vec<Device>;
}

/// A player that never has a track. Used when no player is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPlayer;

#[async_trait]
impl PlayerClient for NoopPlayer {
    async fn get_running_track(&self) -> TrackSnapshot {
        TrackSnapshot::default()
    }

    async fn play(&self, player: PlayerType) -> Result<(), ClientError> {
        Err(ClientError::Unsupported { action: "play", player })
    }

    async fn pause(&self, player: PlayerType) -> Result<(), ClientError> {
        Err(ClientError::Unsupported { action: "pause", player })
    }

    async fn next(&self, player: PlayerType) -> Result<(), ClientError> {
        Err(ClientError::Unsupported { action: "next", player })
    }

    async fn previous(&self, player: PlayerType) -> Result<(), ClientError> {
        Err(ClientError::Unsupported {
            action: "previous",
            player,
        })
    }

    async fn play_track(&self, player: PlayerType, _track_uri: &str) -> Result<(), ClientError> {
        Err(ClientError::Unsupported {
            action: "play_track",
            player,
        })
    }

    async fn get_devices(&self) -> Vec<Device> {
        Vec::new()
    }
}
