//! Spotify Web API player.
//!
//! Reads the currently playing item and drives playback through the Spotify
//! Web API with a user access token. Any failure while reading the current
//! track yields an empty snapshot; control calls surface a [`ClientError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::player::{Device, PlayerClient};
use super::ClientError;
use crate::types::{PlayerType, TrackSnapshot, TrackState};

/// Default Spotify Web API base URL.
pub const SPOTIFY_API_URL: &str = "https://api.spotify.com";

const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
struct CurrentlyPlaying {
    #[serde(default)]
    is_playing: bool,
    #[serde(default)]
    progress_ms: Option<u64>,
    item: Option<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    artists: Vec<Artist>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<Device>,
}

/// [`PlayerClient`] backed by the Spotify Web API.
#[derive(Debug, Clone)]
pub struct SpotifyWebPlayer {
    base_url: String,
    access_token: String,
    client: Client,
}

impl SpotifyWebPlayer {
    /// Creates a player for `base_url` using `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            client,
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token));
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        Ok(builder.send().await?)
    }

    async fn control(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), ClientError> {
        let response = self.send(method, path, body).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn require_spotify(action: &'static str, player: PlayerType) -> Result<(), ClientError> {
        match player {
            PlayerType::SpotifyWeb | PlayerType::SpotifyDesktop => Ok(()),
            _ => Err(ClientError::Unsupported { action, player }),
        }
    }
}

fn to_snapshot(playing: CurrentlyPlaying) -> TrackSnapshot {
    let Some(item) = playing.item else {
        return TrackSnapshot::default();
    };
    let Some(id) = item.id.filter(|id| !id.is_empty()) else {
        return TrackSnapshot::default();
    };

    TrackSnapshot {
        id,
        name: item.name,
        artist: item
            .artists
            .into_iter()
            .map(|a| a.name)
            .collect::<Vec<_>>()
            .join(", "),
        uri: item.uri,
        state: if playing.is_playing {
            TrackState::Playing
        } else {
            TrackState::Paused
        },
        progress_ms: playing.progress_ms.unwrap_or(0),
        duration_ms: item.duration_ms,
        player_type: PlayerType::SpotifyWeb,
        ..TrackSnapshot::default()
    }
}

#[async_trait]
impl PlayerClient for SpotifyWebPlayer {
    async fn get_running_track(&self) -> TrackSnapshot {
        let response = match self
            .send(Method::GET, "/v1/me/player/currently-playing", None)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "spotify unreachable");
                return TrackSnapshot::default();
            }
        };

        match response.status() {
            StatusCode::NO_CONTENT => TrackSnapshot::default(),
            status if status.is_success() => match response.json::<CurrentlyPlaying>().await {
                Ok(playing) => to_snapshot(playing),
                Err(e) => {
                    warn!(error = %e, "unexpected currently-playing payload");
                    TrackSnapshot::default()
                }
            },
            status => {
                debug!(status = status.as_u16(), "no running spotify track");
                TrackSnapshot::default()
            }
        }
    }

    async fn play(&self, player: PlayerType) -> Result<(), ClientError> {
        Self::require_spotify("play", player)?;
        self.control(Method::PUT, "/v1/me/player/play", None).await
    }

    async fn pause(&self, player: PlayerType) -> Result<(), ClientError> {
        Self::require_spotify("pause", player)?;
        self.control(Method::PUT, "/v1/me/player/pause", None).await
    }

    async fn next(&self, player: PlayerType) -> Result<(), ClientError> {
        Self::require_spotify("next", player)?;
        self.control(Method::POST, "/v1/me/player/next", None).await
    }

    async fn previous(&self, player: PlayerType) -> Result<(), ClientError> {
        Self::require_spotify("previous", player)?;
        self.control(Method::POST, "/v1/me/player/previous", None).await
    }

    async fn play_track(&self, player: PlayerType, track_uri: &str) -> Result<(), ClientError> {
        Self::require_spotify("play_track", player)?;
        let body = json!({ "uris": [track_uri] });
        self.control(Method::PUT, "/v1/me/player/play", Some(body)).await
    }

    async fn get_devices(&self) -> Vec<Device> {
        let response = match self.send(Method::GET, "/v1/me/player/devices", None).await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = response.status().as_u16(), "device listing failed");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "spotify unreachable");
                return Vec::new();
            }
        };
        response
            .json::<DeviceList>()
            .await
            .map(|list| list.devices)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currently_playing_maps_to_snapshot() {
        let payload = r#"{
            "is_playing": true,
            "progress_ms": 1200,
            "item": {
                "id": "4uLU6hMCjMI75M1A2tKUQC",
                "name": "Never Gonna Give You Up",
                "uri": "spotify:track:4uLU6hMCjMI75M1A2tKUQC",
                "duration_ms": 213000,
                "artists": [{"name": "Rick Astley"}, {"name": "Guest"}]
            }
        }"#;
        let playing: CurrentlyPlaying = serde_json::from_str(payload).unwrap();
        let track = to_snapshot(playing);

        assert_eq!(track.id, "4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(track.artist, "Rick Astley, Guest");
        assert_eq!(track.state, TrackState::Playing);
        assert_eq!(track.progress_ms, 1200);
        assert_eq!(track.duration_ms, 213_000);
        assert_eq!(track.player_type, PlayerType::SpotifyWeb);
    }

    #[test]
    fn paused_and_missing_items_map_correctly() {
        let paused: CurrentlyPlaying = serde_json::from_str(
            r#"{"is_playing": false, "item": {"id": "a", "name": "A", "uri": "u", "duration_ms": 1}}"#,
        )
        .unwrap();
        assert_eq!(to_snapshot(paused).state, TrackState::Paused);

        let ad: CurrentlyPlaying =
            serde_json::from_str(r#"{"is_playing": true, "item": null}"#).unwrap();
        assert!(!to_snapshot(ad).is_valid());
    }

    #[test]
    fn itunes_is_rejected() {
        assert!(SpotifyWebPlayer::require_spotify("play", PlayerType::ItunesDesktop).is_err());
        assert!(SpotifyWebPlayer::require_spotify("play", PlayerType::SpotifyDesktop).is_ok());
    }
}
