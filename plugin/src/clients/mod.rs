//! Collaborators the core talks to.
//!
//! The aggregator, tracker and assembler never perform I/O themselves. The
//! engine reaches the outside world through three traits:
//!
//! - [`BackendClient`]: the Music Time REST backend
//! - [`PlayerClient`]: the active music player
//! - [`RepoInfoProvider`]: version-control statistics
//!
//! Every trait reports failure through sentinels (status `0`, an empty
//! track, a zero count) so callers branch on values rather than errors.
//! Concrete implementations live in the submodules.

pub mod backend;
pub mod player;
pub mod repo;
pub mod spotify;

use thiserror::Error;

pub use backend::{ApiResponse, BackendClient, HttpBackendClient};
pub use player::{Device, NoopPlayer, PlayerClient};
pub use repo::{GitRepoInfo, RepoInfoProvider};
pub use spotify::SpotifyWebPlayer;

use crate::types::PlayerType;

/// Errors raised by collaborator implementations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP client construction or transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote side answered with a non-success status.
    #[error("request failed: {status} - {message}")]
    Status { status: u16, message: String },

    /// The player cannot perform this action.
    #[error("{action} is not supported by {player:?}")]
    Unsupported {
        action: &'static str,
        player: PlayerType,
    },
}
