//! Scrub previews from chapter images.

use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;

use super::tiles::TileCache;
use super::PreviewImage;
use crate::api::client::item_image_url;
use crate::api::types::ChapterInfo;
use crate::api::MediaServer;
use crate::error::{PlaybackError, Result};

const CHAPTER_IMAGE_MAX_WIDTH: u32 = 500;
const CHAPTER_IMAGE_QUALITY: u32 = 90;

pub struct ChapterPreviewImageProvider {
    server: Arc<dyn MediaServer>,
    item_id: String,
    chapters: Vec<ChapterInfo>,
    images: TileCache<i64, Arc<DynamicImage>>,
}

impl ChapterPreviewImageProvider {
    /// `chapters` must be in playback order, as the server returns them.
    pub fn new(server: Arc<dyn MediaServer>, item_id: impl Into<String>, chapters: Vec<ChapterInfo>) -> Self {
        Self {
            server,
            item_id: item_id.into(),
            chapters,
            images: TileCache::new(),
        }
    }

    pub fn chapters(&self) -> &[ChapterInfo] {
        &self.chapters
    }

    /// Chapter playing at `t`. A chapter owns its own start instant.
    pub fn image_index(&self, t: Duration) -> Option<i64> {
        let ticks = crate::api::types::duration_to_ticks(t);
        match self
            .chapters
            .iter()
            .position(|c| c.start_position_ticks > ticks)
        {
            Some(0) => None,
            Some(next) => Some(next as i64 - 1),
            None if self.chapters.is_empty() => None,
            None => Some(self.chapters.len() as i64 - 1),
        }
    }

    pub async fn image(&self, t: Duration) -> Option<PreviewImage> {
        let index = self.image_index(t)?;
        let chapter = self.chapters.get(index as usize)?;
        let tag = chapter.image_tag.as_deref()?;

        let image = self
            .images
            .get_or_fetch(index, || self.fetch_chapter_image(index, tag))
            .await?;
        Some(PreviewImage { index, image })
    }

    async fn fetch_chapter_image(&self, index: i64, tag: &str) -> Result<Arc<DynamicImage>> {
        let position = usize::try_from(index)
            .map_err(|_| PlaybackError::UrlConstructionFailed(format!("chapter index {}", index)))?;
        let url = item_image_url(
            self.server.base_url(),
            &self.item_id,
            "Chapter",
            Some(position),
            CHAPTER_IMAGE_MAX_WIDTH,
            CHAPTER_IMAGE_QUALITY,
            Some(tag),
        )?;
        let bytes = self.server.fetch_bytes(&url).await?;
        Ok(Arc::new(image::load_from_memory(&bytes)?))
    }
}
