//! One playback session.
//!
//! A `MediaPlayerItem` is what the UI and the player talk to while an item
//! plays: it owns the negotiated stream, the track index map and the
//! selection state, and forwards track changes to the attached transport.

mod build;

use image::DynamicImage;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, OnceCell};
use tracing::{debug, info};
use url::Url;

use crate::api::client::item_image_url;
use crate::api::types::{
    BaseItemDto, MediaSourceInfo, MediaStream, MediaStreamType, PlayMethod, SubtitleDeliveryMethod,
};
use crate::api::MediaServer;
use crate::bitrate::PlaybackBitrate;
use crate::error::{PlaybackError, Result};
use crate::negotiate::NegotiatedStream;
use crate::preview::PreviewImageProvider;
use crate::progress::{ProgressReporter, SessionInfo};
use crate::tracks::{build_index_map, resolve_index_map, PlayerTrack, TrackIndexMap};
use crate::transport::PlayerTransport;

pub use build::TrackSelection;

const THUMBNAIL_MAX_WIDTH: u32 = 100;
const THUMBNAIL_QUALITY: u32 = 90;

/// Result of a subtitle selection change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleChange {
    /// The player switched tracks.
    Switched,
    /// Nothing to switch to yet (unmapped index or no transport).
    Ignored,
    /// The new selection needs a fresh stream from the server.
    RebuildRequired,
}

/// Observers attached to a session.
pub enum Listener {
    Progress(ProgressReporter),
}

impl Listener {
    fn attach(&self, transport: &Arc<dyn PlayerTransport>) {
        match self {
            Listener::Progress(reporter) => reporter.attach(transport),
        }
    }

    async fn stop(&self) {
        match self {
            Listener::Progress(reporter) => reporter.stop().await,
        }
    }
}

pub struct MediaPlayerItem {
    server: Arc<dyn MediaServer>,
    base_item: BaseItemDto,
    media_source: MediaSourceInfo,
    play_session_id: String,
    url: Url,
    play_method: PlayMethod,
    requested_bitrate: PlaybackBitrate,

    video_streams: Vec<MediaStream>,
    audio_streams: Vec<MediaStream>,
    subtitle_streams: Vec<MediaStream>,

    index_map: RwLock<TrackIndexMap>,
    subtitles_resolved: AtomicBool,

    selected_audio: watch::Sender<i32>,
    selected_subtitle: watch::Sender<i32>,

    preview: Option<PreviewImageProvider>,
    thumbnail: OnceCell<Arc<DynamicImage>>,

    transport: RwLock<Option<Weak<dyn PlayerTransport>>>,
    listeners: Vec<Listener>,
}

impl MediaPlayerItem {
    pub fn new(
        server: Arc<dyn MediaServer>,
        stream: NegotiatedStream,
        requested_bitrate: PlaybackBitrate,
        selection: TrackSelection,
        preview: Option<PreviewImageProvider>,
        progress_interval: Duration,
    ) -> Self {
        let NegotiatedStream {
            item,
            media_source,
            play_session_id,
            url,
            play_method,
            ..
        } = stream;

        let streams = media_source.streams();
        let video_streams: Vec<MediaStream> = streams
            .iter()
            .filter(|s| s.is_type(MediaStreamType::Video))
            .cloned()
            .collect();
        let audio_streams: Vec<MediaStream> = streams
            .iter()
            .filter(|s| s.is_type(MediaStreamType::Audio) && !s.is_external())
            .cloned()
            .collect();
        let subtitle_streams: Vec<MediaStream> = streams
            .iter()
            .filter(|s| {
                s.is_type(MediaStreamType::Subtitle)
                    && s.delivery_method != Some(SubtitleDeliveryMethod::Drop)
            })
            .cloned()
            .collect();

        let audio = pick_index(
            &audio_streams,
            selection.audio,
            media_source.default_audio_stream_index,
            false,
        );
        // A source default of -1 means subtitles are off.
        let subtitle = pick_index(
            &subtitle_streams,
            selection.subtitle,
            media_source.default_subtitle_stream_index,
            true,
        );

        let index_map = build_index_map(streams, play_method, (audio >= 0).then_some(audio));

        let (selected_audio, audio_rx) = watch::channel(audio);
        let (selected_subtitle, subtitle_rx) = watch::channel(subtitle);

        let item_id = item.id.clone().unwrap_or_default();
        let reporter = ProgressReporter::new(
            server.clone(),
            SessionInfo {
                item_id,
                media_source_id: media_source.id.clone(),
                play_session_id: play_session_id.clone(),
                play_method,
            },
            audio_rx,
            subtitle_rx,
            progress_interval,
        );

        debug!(
            play_session_id = %play_session_id,
            audio,
            subtitle,
            mapped = index_map.len(),
            "created media player item"
        );

        Self {
            server,
            base_item: item,
            media_source,
            play_session_id,
            url,
            play_method,
            requested_bitrate,
            video_streams,
            audio_streams,
            subtitle_streams,
            index_map: RwLock::new(index_map),
            subtitles_resolved: AtomicBool::new(false),
            selected_audio,
            selected_subtitle,
            preview,
            thumbnail: OnceCell::new(),
            transport: RwLock::new(None),
            listeners: vec![Listener::Progress(reporter)],
        }
    }

    pub fn base_item(&self) -> &BaseItemDto {
        &self.base_item
    }

    pub fn media_source(&self) -> &MediaSourceInfo {
        &self.media_source
    }

    pub fn play_session_id(&self) -> &str {
        &self.play_session_id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn play_method(&self) -> PlayMethod {
        self.play_method
    }

    pub fn requested_bitrate(&self) -> PlaybackBitrate {
        self.requested_bitrate
    }

    pub fn video_streams(&self) -> &[MediaStream] {
        &self.video_streams
    }

    pub fn audio_streams(&self) -> &[MediaStream] {
        &self.audio_streams
    }

    pub fn subtitle_streams(&self) -> &[MediaStream] {
        &self.subtitle_streams
    }

    /// Snapshot of the current index map.
    pub fn index_map(&self) -> TrackIndexMap {
        self.index_map.read().clone()
    }

    pub fn preview(&self) -> Option<&PreviewImageProvider> {
        self.preview.as_ref()
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    pub fn selected_audio_stream_index(&self) -> i32 {
        *self.selected_audio.borrow()
    }

    pub fn selected_subtitle_stream_index(&self) -> i32 {
        *self.selected_subtitle.borrow()
    }

    pub fn subscribe_selected_audio(&self) -> watch::Receiver<i32> {
        self.selected_audio.subscribe()
    }

    pub fn subscribe_selected_subtitle(&self) -> watch::Receiver<i32> {
        self.selected_subtitle.subscribe()
    }

    fn transport(&self) -> Option<Arc<dyn PlayerTransport>> {
        self.transport.read().as_ref().and_then(Weak::upgrade)
    }

    fn mapped(&self, server_index: i32) -> Option<i32> {
        self.index_map.read().get(&server_index).copied()
    }

    /// Connect the session to a player. The item only keeps a weak handle.
    pub fn attach(&self, transport: &Arc<dyn PlayerTransport>) {
        *self.transport.write() = Some(Arc::downgrade(transport));
        for listener in &self.listeners {
            listener.attach(transport);
        }
        info!(play_session_id = %self.play_session_id, "transport attached");
    }

    pub fn set_selected_audio_stream_index(&self, index: i32) {
        self.selected_audio.send_replace(index);

        let Some(transport) = self.transport() else {
            debug!(index, "no transport attached, audio selection stored only");
            return;
        };
        match self.mapped(index) {
            Some(player_index) => transport.set_audio_track(player_index),
            None => debug!(index, "audio stream not mapped to a player track"),
        }
    }

    pub fn set_selected_subtitle_stream_index(&self, index: i32) -> SubtitleChange {
        let previous = self.selected_subtitle.send_replace(index);

        if self.is_rebuild_required(previous, index) {
            debug!(from = previous, to = index, "subtitle change requires a new stream");
            return SubtitleChange::RebuildRequired;
        }

        let Some(transport) = self.transport() else {
            debug!(index, "no transport attached, subtitle selection stored only");
            return SubtitleChange::Ignored;
        };

        if index == -1 {
            transport.set_subtitle_track(-1);
            return SubtitleChange::Switched;
        }
        match self.mapped(index) {
            Some(player_index) => {
                transport.set_subtitle_track(player_index);
                SubtitleChange::Switched
            }
            None => {
                debug!(index, "subtitle stream not mapped to a player track");
                SubtitleChange::Ignored
            }
        }
    }

    /// Burned-in and image-based subtitles cannot be toggled by the player.
    pub fn is_rebuild_required(&self, from: i32, to: i32) -> bool {
        let needs_server = |index: i32| {
            self.subtitle_streams
                .iter()
                .find(|s| s.index == Some(index))
                .map(|s| {
                    s.delivery_method == Some(SubtitleDeliveryMethod::Encode)
                        || !s.is_text_subtitle()
                })
                .unwrap_or(false)
        };
        needs_server(from) || needs_server(to)
    }

    /// Fold the player's subtitle track list into the index map. Runs once
    /// per session; later calls are ignored.
    pub fn get_subtitle_indexes(&self, tracks: &[PlayerTrack]) {
        if self.subtitles_resolved.swap(true, Ordering::SeqCst) {
            return;
        }

        let sidecars: Vec<MediaStream> = self
            .subtitle_streams
            .iter()
            .filter(|s| s.is_sidecar_subtitle())
            .cloned()
            .collect();

        let selected = self.selected_subtitle_stream_index();
        let newly_mapped = {
            let mut map = self.index_map.write();
            let was_mapped = map.contains_key(&selected);
            let resolved = resolve_index_map(
                &map,
                &sidecars,
                tracks,
                self.play_method == PlayMethod::Transcode,
            );
            debug!(before = map.len(), after = resolved.len(), "resolved sidecar subtitles");
            *map = resolved;
            if was_mapped {
                None
            } else {
                map.get(&selected).copied()
            }
        };

        if let Some(player_index) = newly_mapped {
            if let Some(transport) = self.transport() {
                transport.set_subtitle_track(player_index);
            }
        }
    }

    pub async fn preview_image(&self, t: Duration) -> Option<crate::preview::PreviewImage> {
        self.preview.as_ref()?.image(t).await
    }

    /// Small poster for now-playing surfaces: the item's own primary image,
    /// else its series or parent. Cached after the first success.
    pub async fn thumbnail(&self) -> Option<Arc<DynamicImage>> {
        let result = self
            .thumbnail
            .get_or_try_init(|| self.fetch_thumbnail())
            .await;
        match result {
            Ok(image) => Some(image.clone()),
            Err(e) => {
                debug!(error = %e, "no thumbnail available");
                None
            }
        }
    }

    async fn fetch_thumbnail(&self) -> Result<Arc<DynamicImage>> {
        let item = &self.base_item;
        let own_tag = item.image_tags.as_ref().and_then(|tags| tags.get("Primary")).cloned();

        let mut candidates: Vec<(String, Option<String>)> = Vec::new();
        if let Some(id) = &item.id {
            candidates.push((id.clone(), own_tag));
        }
        if let Some(series_id) = &item.series_id {
            candidates.push((series_id.clone(), item.series_primary_image_tag.clone()));
        }
        if let Some(parent_id) = &item.parent_id {
            candidates.push((parent_id.clone(), None));
        }

        let mut last_error = PlaybackError::MissingIdentifier;
        for (id, tag) in candidates {
            let url = item_image_url(
                self.server.base_url(),
                &id,
                "Primary",
                None,
                THUMBNAIL_MAX_WIDTH,
                THUMBNAIL_QUALITY,
                tag.as_deref(),
            )?;
            match self.server.fetch_bytes(&url).await {
                Ok(bytes) => match image::load_from_memory(&bytes) {
                    Ok(image) => return Ok(Arc::new(image)),
                    Err(e) => last_error = e.into(),
                },
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    /// End the session: listeners send their final reports.
    pub async fn stop(&self) {
        for listener in &self.listeners {
            listener.stop().await;
        }
    }
}

/// explicit > source default > first of type > -1
fn pick_index(
    streams: &[MediaStream],
    explicit: Option<i32>,
    default: Option<i32>,
    default_may_disable: bool,
) -> i32 {
    let exists = |index: i32| streams.iter().any(|s| s.index == Some(index));

    if let Some(index) = explicit {
        if index == -1 || exists(index) {
            return index;
        }
    }
    if let Some(index) = default.filter(|&i| (default_may_disable && i == -1) || exists(i)) {
        return index;
    }
    streams.iter().find_map(|s| s.index).unwrap_or(-1)
}
