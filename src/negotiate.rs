//! Stream negotiation with the server.
//!
//! Asks the server how an item should be played given the local device
//! profile, picks the media source the server answered with and works out
//! the URL the player should open.

use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::client::{endpoint_url, video_stream_url};
use crate::api::types::{BaseItemDto, DeviceProfile, MediaSourceInfo, PlayMethod, PlaybackInfoDto};
use crate::api::MediaServer;
use crate::bitrate::PlaybackBitrate;
use crate::config::PlaybackSettings;
use crate::error::{PlaybackError, Result};
use crate::profile::{CompatibilityMode, VideoPlayerType};

/// Inputs to negotiation that come from user settings.
#[derive(Debug, Clone)]
pub struct NegotiationSettings {
    pub player: VideoPlayerType,
    pub bitrate: PlaybackBitrate,
    pub compatibility: CompatibilityMode,
    pub bitrate_test_size: u64,
}

impl From<&PlaybackSettings> for NegotiationSettings {
    fn from(settings: &PlaybackSettings) -> Self {
        Self {
            player: settings.player,
            bitrate: settings.bitrate,
            compatibility: settings.compatibility,
            bitrate_test_size: settings.bitrate_test_size,
        }
    }
}

/// Outcome of a successful negotiation.
#[derive(Debug, Clone)]
pub struct NegotiatedStream {
    /// Full item as re-fetched from the server.
    pub item: BaseItemDto,
    pub media_source: MediaSourceInfo,
    pub play_session_id: String,
    pub url: Url,
    pub play_method: PlayMethod,
    pub max_bitrate: i64,
}

pub struct StreamNegotiator {
    server: Arc<dyn MediaServer>,
}

impl StreamNegotiator {
    pub fn new(server: Arc<dyn MediaServer>) -> Self {
        Self { server }
    }

    /// Negotiate a stream for `item`. `media_source` defaults to the item's
    /// first source; the explicit indices are forwarded to the server.
    pub async fn negotiate(
        &self,
        item: &BaseItemDto,
        media_source: Option<&MediaSourceInfo>,
        settings: &NegotiationSettings,
        audio_stream_index: Option<i32>,
        subtitle_stream_index: Option<i32>,
    ) -> Result<NegotiatedStream> {
        let item_id = item.id.as_deref().ok_or(PlaybackError::MissingIdentifier)?;
        let user_id = self.server.user_id().ok_or(PlaybackError::MissingUserSession)?;

        let full_item = self.server.get_item(user_id, item_id).await?;

        let requested = media_source.cloned().or_else(|| {
            item.media_sources
                .iter()
                .chain(full_item.media_sources.iter())
                .flatten()
                .next()
                .cloned()
        });

        let max_bitrate = settings
            .bitrate
            .resolve(self.server.as_ref(), settings.bitrate_test_size)
            .await?;

        let device_profile = DeviceProfile::build(settings.player, settings.compatibility, max_bitrate);

        let request = PlaybackInfoDto {
            user_id: Some(user_id.to_string()),
            max_streaming_bitrate: Some(max_bitrate),
            audio_stream_index,
            subtitle_stream_index,
            media_source_id: if full_item.is_live_stream() {
                None
            } else {
                requested.as_ref().and_then(|s| s.id.clone())
            },
            live_stream_id: requested.as_ref().and_then(|s| s.live_stream_id.clone()),
            device_profile: Some(device_profile),
            auto_open_live_stream: Some(true),
            ..Default::default()
        };

        let response = self.server.playback_info(item_id, &request).await?;

        let sources = response.media_sources.unwrap_or_default();
        let media_source = select_media_source(sources, requested.as_ref(), item_id)?;

        let play_session_id = response.play_session_id.ok_or(PlaybackError::NoPlaySession)?;

        let (url, play_method) =
            stream_url(self.server.base_url(), &full_item, item_id, &media_source, &play_session_id)?;

        info!(
            item_id,
            play_session_id = %play_session_id,
            play_method = ?play_method,
            max_bitrate,
            "negotiated stream"
        );

        Ok(NegotiatedStream {
            item: full_item,
            media_source,
            play_session_id,
            url,
            play_method,
            max_bitrate,
        })
    }
}

/// Pick the source to play from the PlaybackInfo answer.
pub(crate) fn select_media_source(
    sources: Vec<MediaSourceInfo>,
    requested: Option<&MediaSourceInfo>,
    item_id: &str,
) -> Result<MediaSourceInfo> {
    if sources.is_empty() {
        return Err(PlaybackError::NoMediaSource);
    }

    if let Some(tag) = requested.and_then(|r| r.e_tag.as_deref()) {
        if let Some(source) = sources.iter().find(|s| s.e_tag.as_deref() == Some(tag)) {
            return Ok(source.clone());
        }
    }

    // Live streams come back with an open token that embeds the source id.
    if let Some(source) = sources.iter().find(|s| match (&s.open_token, &s.id) {
        (Some(token), Some(id)) => token.contains(id.as_str()),
        _ => false,
    }) {
        return Ok(source.clone());
    }

    warn!(item_id, "no matching media source, using the first one returned");
    sources.into_iter().next().ok_or(PlaybackError::NoMediaSource)
}

/// Work out the URL to open and whether it is a transcode.
pub(crate) fn stream_url(
    base: &Url,
    item: &BaseItemDto,
    item_id: &str,
    media_source: &MediaSourceInfo,
    play_session_id: &str,
) -> Result<(Url, PlayMethod)> {
    if let Some(transcoding_url) = &media_source.transcoding_url {
        let url = if transcoding_url.starts_with("http://") || transcoding_url.starts_with("https://") {
            Url::parse(transcoding_url)
                .map_err(|e| PlaybackError::UrlConstructionFailed(format!("{}: {}", transcoding_url, e)))?
        } else {
            endpoint_url(base, transcoding_url)
                .map_err(|e| PlaybackError::UrlConstructionFailed(format!("{}: {}", transcoding_url, e)))?
        };
        return Ok((url, PlayMethod::Transcode));
    }

    if item.is_video() && !item.is_live_stream() {
        let url = video_stream_url(base, item_id, item.etag.as_deref(), play_session_id, item_id)?;
        return Ok((url, PlayMethod::DirectPlay));
    }

    if let Some(path) = &media_source.path {
        match Url::parse(path) {
            Ok(url) => return Ok((url, PlayMethod::DirectPlay)),
            Err(e) => debug!(path = %path, error = %e, "media source path is not a URL"),
        }
    }

    Err(PlaybackError::UrlConstructionFailed(format!(
        "no transcoding url, static stream or path for item {}",
        item_id
    )))
}
