//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bitrate::{PlaybackBitrate, DEFAULT_BITRATE_TEST_SIZE};
use crate::error::{PlaybackError, Result};
use crate::preview::PreviewScrubbing;
use crate::profile::{CompatibilityMode, VideoPlayerType};

/// Server connection and client identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server root URL, e.g. `https://media.example.com`
    pub url: String,

    /// Access token from a previous sign-in
    pub access_token: Option<String>,

    /// Signed-in user id
    pub user_id: Option<String>,

    pub client_name: String,
    pub client_version: String,
    pub device_name: String,

    /// Stable per-installation id; generated when absent
    pub device_id: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8096".to_string(),
            access_token: None,
            user_id: None,
            client_name: "jellyfin-playback".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            device_name: "jellyfin-playback".to_string(),
            device_id: uuid::Uuid::new_v4().to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ServerSettings {
    /// Value of the `Authorization` header sent with every request.
    pub fn authorization_header(&self) -> String {
        let mut header = format!(
            "MediaBrowser Client=\"{}\", Device=\"{}\", DeviceId=\"{}\", Version=\"{}\"",
            self.client_name, self.device_name, self.device_id, self.client_version
        );
        if let Some(token) = &self.access_token {
            header.push_str(&format!(", Token=\"{}\"", token));
        }
        header
    }
}

/// Playback behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub player: VideoPlayerType,
    pub compatibility: CompatibilityMode,
    pub bitrate: PlaybackBitrate,

    /// Payload size in bytes for the automatic bitrate probe
    pub bitrate_test_size: u64,

    pub preview_scrubbing: PreviewScrubbing,

    /// Seconds between progress reports
    pub progress_interval_secs: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            player: VideoPlayerType::default(),
            compatibility: CompatibilityMode::default(),
            bitrate: PlaybackBitrate::default(),
            bitrate_test_size: DEFAULT_BITRATE_TEST_SIZE,
            preview_scrubbing: PreviewScrubbing::default(),
            progress_interval_secs: 10,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerSettings,
    pub playback: PlaybackSettings,
    pub logging: LoggingSettings,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig =
            toml::from_str(&content).map_err(|e| PlaybackError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PlaybackError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.server.url.starts_with("http://") && !self.server.url.starts_with("https://") {
            return Err(PlaybackError::Config(
                "server url must start with http:// or https://".to_string(),
            ));
        }
        if self.playback.progress_interval_secs == 0 {
            return Err(PlaybackError::Config(
                "progress_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.playback.bitrate_test_size == 0 {
            return Err(PlaybackError::Config("bitrate_test_size must be positive".to_string()));
        }
        if let PlaybackBitrate::Fixed(bitrate) = self.playback.bitrate {
            if bitrate <= 0 {
                return Err(PlaybackError::Config("fixed bitrate must be positive".to_string()));
            }
        }
        Ok(())
    }
}
