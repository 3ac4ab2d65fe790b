//! Scrub previews cut from server-generated trickplay tile sheets.

use image::DynamicImage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use super::tiles::TileCache;
use super::PreviewImage;
use crate::api::client::trickplay_sheet_url;
use crate::api::types::TrickplayInfo;
use crate::api::MediaServer;
use crate::error::Result;

/// Serves thumbnails out of `cols x rows` sheets, one sheet fetched at a
/// time and kept for the provider's lifetime.
pub struct TrickplayPreviewImageProvider {
    inner: Arc<Inner>,
    /// Neighbour prefetches. Dropping the provider aborts them.
    prefetch: Mutex<JoinSet<()>>,
}

struct Inner {
    server: Arc<dyn MediaServer>,
    info: TrickplayInfo,
    item_id: String,
    media_source_id: String,
    runtime: Duration,
    sheets: TileCache<i64, Arc<DynamicImage>>,
}

impl TrickplayPreviewImageProvider {
    pub fn new(
        server: Arc<dyn MediaServer>,
        info: TrickplayInfo,
        item_id: impl Into<String>,
        media_source_id: impl Into<String>,
        runtime: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                server,
                info,
                item_id: item_id.into(),
                media_source_id: media_source_id.into(),
                runtime,
                sheets: TileCache::new(),
            }),
            prefetch: Mutex::new(JoinSet::new()),
        }
    }

    pub fn info(&self) -> &TrickplayInfo {
        &self.inner.info
    }

    fn tiles_per_sheet(&self) -> i64 {
        self.inner.info.tile_width as i64 * self.inner.info.tile_height as i64
    }

    /// Thumbnail index covering `t`.
    pub fn image_index(&self, t: Duration) -> Option<i64> {
        let info = &self.inner.info;
        if info.interval == 0 || info.thumbnail_count == 0 {
            return None;
        }
        let bucket = t.as_millis() as i64 / info.interval as i64;
        Some(bucket.min(info.thumbnail_count as i64 - 1))
    }

    /// Sheet holding thumbnail `index`.
    pub fn sheet_index(&self, index: i64) -> Option<i64> {
        let per_sheet = self.tiles_per_sheet();
        (per_sheet > 0).then(|| index / per_sheet)
    }

    /// Whether a sheet is loaded or loading.
    pub fn is_sheet_cached(&self, sheet: i64) -> bool {
        self.inner.sheets.contains(&sheet)
    }

    pub async fn image(&self, t: Duration) -> Option<PreviewImage> {
        let index = self.image_index(t)?;
        let sheet_index = self.sheet_index(index)?;

        let sheet = self.inner.load_sheet(sheet_index).await?;
        self.prefetch_neighbours(t, sheet_index);

        let info = &self.inner.info;
        let pos = index % self.tiles_per_sheet();
        let cols = info.tile_width as i64;
        let x = ((pos % cols) * info.width as i64) as u32;
        let y = ((pos / cols) * info.height as i64) as u32;

        if x >= sheet.width() || y >= sheet.height() {
            debug!(index, sheet = sheet_index, x, y, "thumbnail outside of decoded sheet");
            return None;
        }
        let w = info.width.min(sheet.width() - x);
        let h = info.height.min(sheet.height() - y);

        Some(PreviewImage {
            index,
            image: Arc::new(sheet.crop_imm(x, y, w, h)),
        })
    }

    fn prefetch_neighbours(&self, t: Duration, sheet: i64) {
        let info = &self.inner.info;
        let sheet_duration = Duration::from_millis(info.interval as u64 * self.tiles_per_sheet() as u64);

        let mut wanted = Vec::with_capacity(2);
        if sheet > 1 {
            wanted.push(sheet - 1);
        }
        if t + sheet_duration < self.inner.runtime {
            wanted.push(sheet + 1);
        }

        let mut tasks = self.prefetch.lock();
        while tasks.try_join_next().is_some() {}

        for neighbour in wanted {
            if self.inner.sheets.contains(&neighbour) {
                continue;
            }
            trace!(sheet = neighbour, "prefetching trickplay sheet");
            let inner = self.inner.clone();
            tasks.spawn(async move {
                inner.load_sheet(neighbour).await;
            });
        }
    }
}

impl Inner {
    async fn load_sheet(&self, sheet: i64) -> Option<Arc<DynamicImage>> {
        self.sheets.get_or_fetch(sheet, || self.fetch_sheet(sheet)).await
    }

    async fn fetch_sheet(&self, sheet: i64) -> Result<Arc<DynamicImage>> {
        let url = trickplay_sheet_url(
            self.server.base_url(),
            &self.item_id,
            self.info.width,
            sheet,
            &self.media_source_id,
        )?;
        let bytes = self.server.fetch_bytes(&url).await?;
        let image = image::load_from_memory(&bytes)?;
        debug!(sheet, width = image.width(), height = image.height(), "loaded trickplay sheet");
        Ok(Arc::new(image))
    }
}
