//! Building a `MediaPlayerItem` from a library item.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::MediaPlayerItem;
use crate::api::types::{BaseItemDto, MediaSourceInfo};
use crate::api::MediaServer;
use crate::config::PlaybackSettings;
use crate::error::Result;
use crate::negotiate::{NegotiationSettings, StreamNegotiator};
use crate::preview::PreviewImageProvider;

/// Tracks the user asked for up front. `None` defers to the source defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackSelection {
    pub audio: Option<i32>,
    /// `Some(-1)` starts with subtitles off.
    pub subtitle: Option<i32>,
}

impl MediaPlayerItem {
    /// Negotiate a stream for `item` and set up the session around it.
    pub async fn build(
        server: Arc<dyn MediaServer>,
        item: &BaseItemDto,
        media_source: Option<&MediaSourceInfo>,
        settings: &PlaybackSettings,
        selection: TrackSelection,
    ) -> Result<Self> {
        let negotiator = StreamNegotiator::new(server.clone());
        let stream = negotiator
            .negotiate(
                item,
                media_source,
                &NegotiationSettings::from(settings),
                selection.audio,
                selection.subtitle.filter(|i| *i >= 0),
            )
            .await?;

        let preview = PreviewImageProvider::select(
            settings.preview_scrubbing,
            server.clone(),
            &stream.item,
            &stream.media_source,
        );

        info!(
            item_id = stream.item.id.as_deref().unwrap_or_default(),
            url = %stream.url,
            preview = preview.is_some(),
            "built media player item"
        );

        Ok(MediaPlayerItem::new(
            server,
            stream,
            settings.bitrate,
            selection,
            preview,
            Duration::from_secs(settings.progress_interval_secs),
        ))
    }
}
