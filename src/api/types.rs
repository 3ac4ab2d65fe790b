//! Jellyfin API types used by the playback pipeline.
//!
//! Only the fields the client reads or sends are modeled. Everything is
//! optional on the wire, so structs default missing fields.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Server time unit: 1 second = 10,000,000 ticks.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

pub fn ticks_to_duration(ticks: i64) -> Duration {
    Duration::from_nanos(u64::try_from(ticks).unwrap_or(0).saturating_mul(100))
}

pub fn duration_to_ticks(duration: Duration) -> i64 {
    (duration.as_nanos() / 100) as i64
}

//
// Items.
//

/// Item kind, as reported in `Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseItemKind {
    Movie,
    Episode,
    Video,
    MusicVideo,
    Trailer,
    TvChannel,
    LiveTvProgram,
    Audio,
    #[serde(other)]
    Other,
}

/// Media type of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Video,
    Audio,
    Photo,
    Book,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UserItemData {
    pub playback_position_ticks: Option<i64>,
    pub played: Option<bool>,
}

/// A chapter marker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ChapterInfo {
    pub start_position_ticks: i64,
    pub name: Option<String>,
    pub image_tag: Option<String>,
}

impl ChapterInfo {
    pub fn start(&self) -> Duration {
        ticks_to_duration(self.start_position_ticks)
    }
}

/// Trickplay tile-sheet layout for one media source at one width.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TrickplayInfo {
    /// Width of a single thumbnail.
    pub width: u32,
    /// Height of a single thumbnail.
    pub height: u32,
    /// Thumbnails per row in a sheet.
    pub tile_width: u32,
    /// Thumbnails per column in a sheet.
    pub tile_height: u32,
    /// Total thumbnails across all sheets.
    pub thumbnail_count: u32,
    /// Milliseconds between thumbnails.
    pub interval: u32,
    pub bandwidth: u32,
}

/// Library item (`BaseItemDto`), trimmed to what playback needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BaseItemDto {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "Type")]
    pub kind: Option<BaseItemKind>,
    pub media_type: Option<MediaType>,
    pub etag: Option<String>,
    pub run_time_ticks: Option<i64>,
    pub media_sources: Option<Vec<MediaSourceInfo>>,
    pub media_streams: Option<Vec<MediaStream>>,
    pub chapters: Option<Vec<ChapterInfo>>,
    /// media source id -> thumbnail width -> layout
    pub trickplay: Option<HashMap<String, HashMap<String, TrickplayInfo>>>,
    pub user_data: Option<UserItemData>,
    pub image_tags: Option<HashMap<String, String>>,
    pub parent_id: Option<String>,
    pub series_id: Option<String>,
    pub series_primary_image_tag: Option<String>,
}

impl BaseItemDto {
    pub fn is_live_stream(&self) -> bool {
        matches!(
            self.kind,
            Some(BaseItemKind::TvChannel) | Some(BaseItemKind::LiveTvProgram)
        )
    }

    pub fn is_video(&self) -> bool {
        self.media_type == Some(MediaType::Video)
    }

    pub fn runtime(&self) -> Option<Duration> {
        self.run_time_ticks.map(ticks_to_duration)
    }

    pub fn start_position(&self) -> Duration {
        self.user_data
            .as_ref()
            .and_then(|d| d.playback_position_ticks)
            .map(ticks_to_duration)
            .unwrap_or_default()
    }

    /// Trickplay layout for a media source. Several widths may exist;
    /// the narrowest one is used since previews are small.
    pub fn trickplay_info(&self, media_source_id: &str) -> Option<(u32, &TrickplayInfo)> {
        self.trickplay
            .as_ref()?
            .get(media_source_id)?
            .iter()
            .filter_map(|(width, info)| width.parse::<u32>().ok().map(|w| (w, info)))
            .min_by_key(|(w, _)| *w)
    }
}

//
// Media sources and streams.
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaStreamType {
    Audio,
    Video,
    Subtitle,
    EmbeddedImage,
    Data,
    Lyric,
    #[serde(other)]
    Unknown,
}

/// How the server delivers a subtitle stream for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubtitleDeliveryMethod {
    /// Burned into the video.
    Encode,
    /// Muxed into the container.
    Embed,
    /// Separate file the player loads itself.
    External,
    /// Rendition in the HLS playlist.
    Hls,
    /// Not delivered at all.
    Drop,
    /// Any method this client does not know about.
    #[serde(other)]
    Unknown,
}

const TEXT_SUBTITLE_CODECS: &[&str] = &[
    "srt", "subrip", "ass", "ssa", "vtt", "webvtt", "mov_text", "ttml", "sub", "smi",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MediaStream {
    pub index: Option<i32>,
    #[serde(rename = "Type")]
    pub stream_type: Option<MediaStreamType>,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub display_title: Option<String>,
    pub is_default: Option<bool>,
    pub is_forced: Option<bool>,
    pub is_external: Option<bool>,
    pub is_text_subtitle_stream: Option<bool>,
    pub delivery_method: Option<SubtitleDeliveryMethod>,
    pub delivery_url: Option<String>,
    pub channels: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

impl MediaStream {
    pub fn is_type(&self, ty: MediaStreamType) -> bool {
        self.stream_type == Some(ty)
    }

    pub fn is_external(&self) -> bool {
        self.is_external.unwrap_or(false)
    }

    /// Subtitle the player loads by itself rather than finding it in the container.
    pub fn is_sidecar_subtitle(&self) -> bool {
        self.is_type(MediaStreamType::Subtitle)
            && (self.is_external()
                || self.delivery_method == Some(SubtitleDeliveryMethod::External))
    }

    /// Text subtitles can be toggled by the player. Falls back to the codec
    /// when the server leaves `IsTextSubtitleStream` out.
    pub fn is_text_subtitle(&self) -> bool {
        match self.is_text_subtitle_stream {
            Some(text) => text,
            None => self.codec.as_deref().is_some_and(|codec| {
                TEXT_SUBTITLE_CODECS
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(codec))
            }),
        }
    }

    /// Title used to match the stream against player-reported tracks.
    pub fn match_title(&self) -> Option<&str> {
        self.display_title.as_deref().or(self.title.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MediaSourceInfo {
    pub id: Option<String>,
    pub path: Option<String>,
    pub protocol: Option<String>,
    pub container: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "ETag")]
    pub e_tag: Option<String>,
    pub run_time_ticks: Option<i64>,
    pub open_token: Option<String>,
    pub live_stream_id: Option<String>,
    pub supports_direct_play: Option<bool>,
    pub supports_direct_stream: Option<bool>,
    pub supports_transcoding: Option<bool>,
    pub transcoding_url: Option<String>,
    pub transcoding_sub_protocol: Option<String>,
    pub transcoding_container: Option<String>,
    pub default_audio_stream_index: Option<i32>,
    pub default_subtitle_stream_index: Option<i32>,
    pub media_streams: Option<Vec<MediaStream>>,
}

impl MediaSourceInfo {
    pub fn streams(&self) -> &[MediaStream] {
        self.media_streams.as_deref().unwrap_or_default()
    }

    pub fn streams_of(&self, ty: MediaStreamType) -> impl Iterator<Item = &MediaStream> {
        self.streams().iter().filter(move |s| s.is_type(ty))
    }

    pub fn stream(&self, index: i32) -> Option<&MediaStream> {
        self.streams().iter().find(|s| s.index == Some(index))
    }
}

//
// PlaybackInfo.
//

/// Request body for `POST /Items/{id}/PlaybackInfo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfoDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_streaming_bitrate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time_ticks: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_stream_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_stream_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_profile: Option<DeviceProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_open_live_stream: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PlaybackInfoResponse {
    pub media_sources: Option<Vec<MediaSourceInfo>>,
    pub play_session_id: Option<String>,
    pub error_code: Option<String>,
}

//
// Device profile.
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DlnaProfileType {
    Audio,
    Video,
    Photo,
    Subtitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingContext {
    Streaming,
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectPlayProfile {
    pub container: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(rename = "Type")]
    pub profile_type: DlnaProfileType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscodingProfile {
    pub container: String,
    #[serde(rename = "Type")]
    pub profile_type: DlnaProfileType,
    pub video_codec: String,
    pub audio_codec: String,
    pub protocol: String,
    pub context: EncodingContext,
    pub max_audio_channels: String,
    pub min_segments: i32,
    pub break_on_non_key_frames: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileCondition {
    pub condition: String,
    pub property: String,
    pub value: String,
    pub is_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodecProfile {
    #[serde(rename = "Type")]
    pub profile_type: String,
    pub codec: String,
    pub apply_conditions: Vec<ProfileCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubtitleProfile {
    pub format: String,
    pub method: SubtitleDeliveryMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseProfile {
    pub container: String,
    #[serde(rename = "Type")]
    pub profile_type: DlnaProfileType,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub max_streaming_bitrate: Option<i64>,
    pub max_static_bitrate: Option<i64>,
    pub music_streaming_transcoding_bitrate: Option<i64>,
    #[serde(default)]
    pub direct_play_profiles: Vec<DirectPlayProfile>,
    #[serde(default)]
    pub transcoding_profiles: Vec<TranscodingProfile>,
    #[serde(default)]
    pub codec_profiles: Vec<CodecProfile>,
    #[serde(default)]
    pub subtitle_profiles: Vec<SubtitleProfile>,
    #[serde(default)]
    pub response_profiles: Vec<ResponseProfile>,
}

//
// Playstate reporting.
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayMethod {
    Transcode,
    DirectStream,
    DirectPlay,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackStartInfo {
    pub item_id: Option<String>,
    pub media_source_id: Option<String>,
    pub play_session_id: Option<String>,
    pub session_id: Option<String>,
    pub audio_stream_index: Option<i32>,
    pub subtitle_stream_index: Option<i32>,
    pub position_ticks: Option<i64>,
    pub play_method: Option<PlayMethod>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackProgressInfo {
    pub item_id: Option<String>,
    pub media_source_id: Option<String>,
    pub play_session_id: Option<String>,
    pub session_id: Option<String>,
    pub audio_stream_index: Option<i32>,
    pub subtitle_stream_index: Option<i32>,
    pub position_ticks: Option<i64>,
    pub is_paused: bool,
    pub play_method: Option<PlayMethod>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackStopInfo {
    pub item_id: Option<String>,
    pub media_source_id: Option<String>,
    pub play_session_id: Option<String>,
    pub session_id: Option<String>,
    pub position_ticks: Option<i64>,
}
