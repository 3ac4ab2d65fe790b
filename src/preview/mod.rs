//! Scrub preview thumbnails.
//!
//! Two strategies share the same surface: trickplay tile sheets when the
//! server generated them, chapter images otherwise.

pub mod chapter;
pub mod tiles;
pub mod trickplay;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::api::types::{BaseItemDto, MediaSourceInfo};
use crate::api::MediaServer;

pub use chapter::ChapterPreviewImageProvider;
pub use tiles::TileCache;
pub use trickplay::TrickplayPreviewImageProvider;

/// A decoded preview thumbnail.
#[derive(Debug, Clone)]
pub struct PreviewImage {
    /// Thumbnail or chapter index the image belongs to.
    pub index: i64,
    pub image: Arc<DynamicImage>,
}

/// Which preview source to use while scrubbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewScrubbing {
    Disabled,
    Chapters,
    Trickplay { fallback_to_chapters: bool },
}

impl Default for PreviewScrubbing {
    fn default() -> Self {
        PreviewScrubbing::Trickplay {
            fallback_to_chapters: true,
        }
    }
}

pub enum PreviewImageProvider {
    Trickplay(TrickplayPreviewImageProvider),
    Chapter(ChapterPreviewImageProvider),
}

impl PreviewImageProvider {
    pub fn image_index(&self, t: Duration) -> Option<i64> {
        match self {
            PreviewImageProvider::Trickplay(p) => p.image_index(t),
            PreviewImageProvider::Chapter(p) => p.image_index(t),
        }
    }

    pub async fn image(&self, t: Duration) -> Option<PreviewImage> {
        match self {
            PreviewImageProvider::Trickplay(p) => p.image(t).await,
            PreviewImageProvider::Chapter(p) => p.image(t).await,
        }
    }

    /// Pick a provider for the item according to the scrubbing policy.
    pub fn select(
        policy: PreviewScrubbing,
        server: Arc<dyn MediaServer>,
        item: &BaseItemDto,
        media_source: &MediaSourceInfo,
    ) -> Option<Self> {
        let item_id = item.id.as_deref()?;

        match policy {
            PreviewScrubbing::Disabled => None,
            PreviewScrubbing::Chapters => Self::chapters(server, item_id, item),
            PreviewScrubbing::Trickplay { fallback_to_chapters } => {
                let trickplay = media_source
                    .id
                    .as_deref()
                    .and_then(|source_id| {
                        item.trickplay_info(source_id)
                            .map(|(_, info)| (source_id, info.clone()))
                    });
                match trickplay {
                    Some((source_id, info)) => {
                        let runtime = item
                            .runtime()
                            .or_else(|| {
                                media_source
                                    .run_time_ticks
                                    .map(crate::api::types::ticks_to_duration)
                            })
                            .unwrap_or_else(|| {
                                Duration::from_millis(info.interval as u64 * info.thumbnail_count as u64)
                            });
                        debug!(item_id, width = info.width, "using trickplay previews");
                        Some(PreviewImageProvider::Trickplay(TrickplayPreviewImageProvider::new(
                            server, info, item_id, source_id, runtime,
                        )))
                    }
                    None if fallback_to_chapters => Self::chapters(server, item_id, item),
                    None => None,
                }
            }
        }
    }

    fn chapters(server: Arc<dyn MediaServer>, item_id: &str, item: &BaseItemDto) -> Option<Self> {
        let chapters = item.chapters.clone().filter(|c| !c.is_empty())?;
        debug!(item_id, count = chapters.len(), "using chapter previews");
        Some(PreviewImageProvider::Chapter(ChapterPreviewImageProvider::new(
            server, item_id, chapters,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{ChapterInfo, TrickplayInfo};
    use crate::tests::fixtures::FakeServer;
    use std::collections::HashMap;

    fn item(trickplay: bool, chapters: bool) -> BaseItemDto {
        let mut item = BaseItemDto {
            id: Some("item1".to_string()),
            run_time_ticks: Some(600 * crate::api::types::TICKS_PER_SECOND),
            ..Default::default()
        };
        if trickplay {
            let info = TrickplayInfo {
                width: 320,
                height: 180,
                tile_width: 10,
                tile_height: 10,
                thumbnail_count: 60,
                interval: 10_000,
                bandwidth: 0,
            };
            let widths = HashMap::from([("320".to_string(), info)]);
            item.trickplay = Some(HashMap::from([("src1".to_string(), widths)]));
        }
        if chapters {
            item.chapters = Some(vec![ChapterInfo::default()]);
        }
        item
    }

    fn source() -> MediaSourceInfo {
        MediaSourceInfo {
            id: Some("src1".to_string()),
            ..Default::default()
        }
    }

    fn select(policy: PreviewScrubbing, item: &BaseItemDto) -> Option<PreviewImageProvider> {
        PreviewImageProvider::select(policy, Arc::new(FakeServer::new()), item, &source())
    }

    #[test]
    fn test_policy_selection() {
        let both = item(true, true);
        let chapters_only = item(false, true);
        let neither = item(false, false);
        let fallback = PreviewScrubbing::Trickplay { fallback_to_chapters: true };
        let strict = PreviewScrubbing::Trickplay { fallback_to_chapters: false };

        assert!(select(PreviewScrubbing::Disabled, &both).is_none());
        assert!(matches!(select(fallback, &both), Some(PreviewImageProvider::Trickplay(_))));
        assert!(matches!(select(PreviewScrubbing::Chapters, &both), Some(PreviewImageProvider::Chapter(_))));
        assert!(matches!(select(fallback, &chapters_only), Some(PreviewImageProvider::Chapter(_))));
        assert!(select(strict, &chapters_only).is_none());
        assert!(select(fallback, &neither).is_none());
    }

    #[test]
    fn test_dispatch_image_index() {
        let provider = select(PreviewScrubbing::default(), &item(true, false)).unwrap();
        assert_eq!(provider.image_index(Duration::from_secs(25)), Some(2));
    }
}
