//! Configuration for the Music Time plugin sidecar.
//!
//! All settings come from environment variables; nothing is required.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `MUSICTIME_API_URL` | No | `https://api.software.com` | Backend base URL |
//! | `MUSICTIME_JWT` | No | - | Backend bearer token. Without it, sends go to the offline queue |
//! | `MUSICTIME_DATA_DIR` | No | `~/.software` | Directory holding the offline queue files |
//! | `MUSICTIME_FLUSH_INTERVAL_SECS` | No | 60 | Keystroke flush cadence |
//! | `MUSICTIME_POLL_INTERVAL_SECS` | No | 5 | Player poll cadence |
//! | `MUSICTIME_NEAR_END_PERCENT` | No | 6 | Trailing share of a track treated as near its end (0-50) |
//! | `MUSICTIME_SPOTIFY_ACCESS_TOKEN` | No | - | Enables the Spotify Web player |
//! | `MUSICTIME_PLUGIN_ID` | No | 13 | Plugin id reported in payloads |
//! | `MUSICTIME_EXCLUDE_PATTERNS` | No | - | Comma-separated path fragments to ignore |
//!
//! # Example
//!
//! ```no_run
//! use musictime_plugin::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Backend: {}", config.api_url);
//! ```

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use directories::BaseDirs;
use thiserror::Error;

use crate::tracker::{DEFAULT_NEAR_END_RATIO, DEFAULT_POLL_INTERVAL_SECS};
use crate::types::DEFAULT_PLUGIN_ID;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "https://api.software.com";

/// Default data directory name relative to home.
const DEFAULT_DATA_DIR: &str = ".software";

/// Default keystroke flush cadence in seconds.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 60;

/// Upper bound for the near-end percentage.
const MAX_NEAR_END_PERCENT: f64 = 50.0;

/// Offline queue file for keystroke sessions.
pub const KEYSTROKE_STORE_FILE: &str = "data.json";

/// Offline queue file for song sessions.
pub const SONG_STORE_FILE: &str = "songSessionData.json";

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Plugin configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, without a trailing slash.
    pub api_url: String,

    /// Backend bearer token.
    pub jwt: Option<String>,

    /// Directory holding `data.json` and `songSessionData.json`.
    pub data_dir: PathBuf,

    pub flush_interval_secs: u64,

    pub poll_interval_secs: u64,

    /// Near-end window as a ratio of the track duration (0.06 = last 6%).
    pub near_end_ratio: f64,

    /// Spotify Web API user token. Its presence marks a Spotify user as
    /// authenticated.
    pub spotify_access_token: Option<String>,

    pub plugin_id: u32,

    /// Extra path fragments rejected before aggregation.
    pub exclude_patterns: Vec<String>,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - a numeric variable is set but cannot be parsed or is out of range
    /// - `MUSICTIME_DATA_DIR` is unset and the home directory cannot be determined
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = non_empty_var("MUSICTIME_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let jwt = non_empty_var("MUSICTIME_JWT");

        let data_dir = match non_empty_var("MUSICTIME_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
                base_dirs.home_dir().join(DEFAULT_DATA_DIR)
            }
        };

        let flush_interval_secs =
            parse_var("MUSICTIME_FLUSH_INTERVAL_SECS", DEFAULT_FLUSH_INTERVAL_SECS)?;
        if flush_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MUSICTIME_FLUSH_INTERVAL_SECS".to_string(),
                message: "flush interval must be at least 1 second".to_string(),
            });
        }

        let poll_interval_secs =
            parse_var("MUSICTIME_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MUSICTIME_POLL_INTERVAL_SECS".to_string(),
                message: "poll interval must be at least 1 second".to_string(),
            });
        }

        let near_end_percent =
            parse_var("MUSICTIME_NEAR_END_PERCENT", DEFAULT_NEAR_END_RATIO * 100.0)?;
        if !(0.0..=MAX_NEAR_END_PERCENT).contains(&near_end_percent) {
            return Err(ConfigError::InvalidValue {
                key: "MUSICTIME_NEAR_END_PERCENT".to_string(),
                message: format!("must be between 0 and 50, got {near_end_percent}"),
            });
        }

        let spotify_access_token = non_empty_var("MUSICTIME_SPOTIFY_ACCESS_TOKEN");

        let plugin_id = parse_var("MUSICTIME_PLUGIN_ID", DEFAULT_PLUGIN_ID)?;

        let exclude_patterns = env::var("MUSICTIME_EXCLUDE_PATTERNS")
            .map(|val| {
                val.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            api_url,
            jwt,
            data_dir,
            flush_interval_secs,
            poll_interval_secs,
            near_end_ratio: near_end_percent / 100.0,
            spotify_access_token,
            plugin_id,
            exclude_patterns,
        })
    }

    #[must_use]
    pub fn keystroke_store_path(&self) -> PathBuf {
        self.data_dir.join(KEYSTROKE_STORE_FILE)
    }

    #[must_use]
    pub fn song_store_path(&self) -> PathBuf {
        self.data_dir.join(SONG_STORE_FILE)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parses `key` if set, otherwise returns `default`.
fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(val) => val.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a number, got '{val}'"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Runs `f` with every MUSICTIME_* variable removed, restoring them after.
    fn with_clean_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let saved_vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with("MUSICTIME_"))
            .collect();

        for (key, _) in &saved_vars {
            env::remove_var(key);
        }

        let result = f();

        for (key, _) in env::vars().filter(|(k, _)| k.starts_with("MUSICTIME_")) {
            env::remove_var(key);
        }
        for (key, value) in saved_vars {
            env::set_var(key, value);
        }

        result
    }

    #[test]
    #[serial]
    fn defaults_apply_without_variables() {
        with_clean_env(|| {
            let config = Config::from_env().expect("defaults should parse");

            assert_eq!(config.api_url, DEFAULT_API_URL);
            assert!(config.jwt.is_none());
            assert!(config.data_dir.ends_with(DEFAULT_DATA_DIR));
            assert_eq!(config.flush_interval_secs, 60);
            assert_eq!(config.poll_interval_secs, 5);
            assert!((config.near_end_ratio - 0.06).abs() < 1e-9);
            assert_eq!(config.plugin_id, DEFAULT_PLUGIN_ID);
            assert!(config.exclude_patterns.is_empty());
            assert!(config.keystroke_store_path().ends_with("data.json"));
            assert!(config.song_store_path().ends_with("songSessionData.json"));
        });
    }

    #[test]
    #[serial]
    fn all_variables_are_read() {
        with_clean_env(|| {
            env::set_var("MUSICTIME_API_URL", "http://localhost:5000/");
            env::set_var("MUSICTIME_JWT", "JWT abc");
            env::set_var("MUSICTIME_DATA_DIR", "/tmp/mt");
            env::set_var("MUSICTIME_FLUSH_INTERVAL_SECS", "30");
            env::set_var("MUSICTIME_POLL_INTERVAL_SECS", "2");
            env::set_var("MUSICTIME_NEAR_END_PERCENT", "10");
            env::set_var("MUSICTIME_SPOTIFY_ACCESS_TOKEN", "tok");
            env::set_var("MUSICTIME_PLUGIN_ID", "42");
            env::set_var("MUSICTIME_EXCLUDE_PATTERNS", " node_modules , ,dist ");

            let config = Config::from_env().expect("should parse full config");

            assert_eq!(config.api_url, "http://localhost:5000");
            assert_eq!(config.jwt.as_deref(), Some("JWT abc"));
            assert_eq!(config.data_dir, PathBuf::from("/tmp/mt"));
            assert_eq!(config.flush_interval_secs, 30);
            assert_eq!(config.poll_interval_secs, 2);
            assert!((config.near_end_ratio - 0.10).abs() < 1e-9);
            assert_eq!(config.spotify_access_token.as_deref(), Some("tok"));
            assert_eq!(config.plugin_id, 42);
            assert_eq!(
                config.exclude_patterns,
                vec!["node_modules".to_string(), "dist".to_string()]
            );
        });
    }

    #[test]
    #[serial]
    fn blank_token_counts_as_unset() {
        with_clean_env(|| {
            env::set_var("MUSICTIME_JWT", "  ");
            let config = Config::from_env().unwrap();
            assert!(config.jwt.is_none());
        });
    }

    #[test]
    #[serial]
    fn zero_flush_interval_rejected() {
        with_clean_env(|| {
            env::set_var("MUSICTIME_FLUSH_INTERVAL_SECS", "0");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "MUSICTIME_FLUSH_INTERVAL_SECS" && message.contains("at least 1 second")
            ));
        });
    }

    #[test]
    #[serial]
    fn invalid_poll_interval_rejected() {
        with_clean_env(|| {
            env::set_var("MUSICTIME_POLL_INTERVAL_SECS", "soon");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, .. } if key == "MUSICTIME_POLL_INTERVAL_SECS"
            ));
        });
    }

    #[test]
    #[serial]
    fn near_end_percent_out_of_range_rejected() {
        with_clean_env(|| {
            env::set_var("MUSICTIME_NEAR_END_PERCENT", "75");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "MUSICTIME_NEAR_END_PERCENT" && message.contains("between 0 and 50")
            ));
        });
    }
}
