//! Device profile construction.
//!
//! The profile tells the server what the local player can decode, which in
//! turn decides between direct play and a transcoding session.

use serde::{Deserialize, Serialize};

use crate::api::types::{
    CodecProfile, DeviceProfile, DirectPlayProfile, DlnaProfileType, EncodingContext,
    ProfileCondition, ResponseProfile, SubtitleDeliveryMethod, SubtitleProfile,
    TranscodingProfile,
};

/// Which playback engine the profile describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoPlayerType {
    /// Platform media engine. Narrow container support, no image subtitles.
    Native,
    /// Bundled software decoder. Accepts almost any container.
    #[default]
    Swiftfin,
}

/// How aggressively to prefer direct play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityMode {
    #[default]
    Auto,
    /// Only mp4/h264/aac plays directly, everything else transcodes.
    MostCompatible,
    /// Never ask for a transcode.
    DirectPlay,
}

const NATIVE_CONTAINERS: &str = "mpegts,mov,mp4,m4v,avi,3gp,3g2";
const NATIVE_AUDIO: &str = "aac,mp3,wav,ac3,eac3,alac,flac,opus";
const NATIVE_VIDEO: &str = "h264,hevc,mpeg4";

const SWIFTFIN_CONTAINERS: &str =
    "mpegts,mov,mp4,m4v,avi,3gp,3g2,mkv,webm,ogg,asf,wmv,mpeg,mpg,flv";
const SWIFTFIN_AUDIO: &str = "flac,alac,aac,eac3,ac3,dts,opus,vorbis,mp3,mp2,mp1,\
pcm_s24be,pcm_s24le,pcm_s16be,pcm_s16le,wavpack,wmav2,wmav1,wmapro,wmalossless";
const SWIFTFIN_VIDEO: &str = "h264,hevc,mpeg4,h263,flv1,vc1,vp8,vp9,av1,\
wmv1,wmv2,msmpeg4v2,msmpeg4v3,mpeg2video,theora";

const TEXT_SUBTITLES: &[&str] = &["subrip", "ass", "ssa", "vtt", "mov_text", "ttml", "text"];
const IMAGE_SUBTITLES: &[&str] = &["pgssub", "dvdsub", "dvbsub", "xsub"];

impl DeviceProfile {
    /// Build the profile sent with every PlaybackInfo request.
    pub fn build(player: VideoPlayerType, compatibility: CompatibilityMode, max_bitrate: i64) -> Self {
        let direct_play_profiles = match compatibility {
            CompatibilityMode::MostCompatible => vec![video_direct_play("mp4", "aac", "h264")],
            _ => match player {
                VideoPlayerType::Native => {
                    vec![video_direct_play(NATIVE_CONTAINERS, NATIVE_AUDIO, NATIVE_VIDEO)]
                }
                VideoPlayerType::Swiftfin => {
                    vec![video_direct_play(SWIFTFIN_CONTAINERS, SWIFTFIN_AUDIO, SWIFTFIN_VIDEO)]
                }
            },
        };

        let transcoding_profiles = match compatibility {
            CompatibilityMode::DirectPlay => Vec::new(),
            CompatibilityMode::MostCompatible => vec![hls_transcode("ts", "h264", "aac", "2")],
            CompatibilityMode::Auto => match player {
                VideoPlayerType::Native => vec![hls_transcode("ts", "h264,hevc", "aac,ac3,eac3", "6")],
                VideoPlayerType::Swiftfin => vec![hls_transcode(
                    "mp4",
                    "hevc,h264,av1,vp9,vc1,mpeg4,mpeg2video",
                    "flac,alac,aac,eac3,ac3,dts,opus,vorbis,mp3,mp2,mp1",
                    "8",
                )],
            },
        };

        Self {
            name: None,
            max_streaming_bitrate: Some(max_bitrate),
            max_static_bitrate: Some(max_bitrate),
            music_streaming_transcoding_bitrate: Some(max_bitrate),
            direct_play_profiles,
            transcoding_profiles,
            codec_profiles: vec![
                video_codec_profile("h264", "high|main|baseline|constrained baseline", "80"),
                video_codec_profile("hevc", "high|main|main 10", "175"),
            ],
            subtitle_profiles: subtitle_profiles(player),
            response_profiles: vec![ResponseProfile {
                container: "m4v".to_string(),
                profile_type: DlnaProfileType::Video,
                mime_type: "video/mp4".to_string(),
            }],
        }
    }
}

fn video_direct_play(container: &str, audio: &str, video: &str) -> DirectPlayProfile {
    DirectPlayProfile {
        container: container.to_string(),
        audio_codec: Some(audio.to_string()),
        video_codec: Some(video.to_string()),
        profile_type: DlnaProfileType::Video,
    }
}

fn hls_transcode(container: &str, video: &str, audio: &str, channels: &str) -> TranscodingProfile {
    TranscodingProfile {
        container: container.to_string(),
        profile_type: DlnaProfileType::Video,
        video_codec: video.to_string(),
        audio_codec: audio.to_string(),
        protocol: "hls".to_string(),
        context: EncodingContext::Streaming,
        max_audio_channels: channels.to_string(),
        min_segments: 2,
        break_on_non_key_frames: true,
    }
}

fn condition(condition: &str, property: &str, value: &str) -> ProfileCondition {
    ProfileCondition {
        condition: condition.to_string(),
        property: property.to_string(),
        value: value.to_string(),
        is_required: false,
    }
}

fn video_codec_profile(codec: &str, profiles: &str, max_level: &str) -> CodecProfile {
    CodecProfile {
        profile_type: "Video".to_string(),
        codec: codec.to_string(),
        apply_conditions: vec![
            condition("NotEquals", "IsAnamorphic", "true"),
            condition("EqualsAny", "VideoProfile", profiles),
            condition("LessThanEqual", "VideoLevel", max_level),
            condition("NotEquals", "IsInterlaced", "true"),
        ],
    }
}

fn subtitle_profiles(player: VideoPlayerType) -> Vec<SubtitleProfile> {
    // Image subtitles cannot be rendered by the native engine, so the server burns them in.
    let image_method = match player {
        VideoPlayerType::Native => SubtitleDeliveryMethod::Encode,
        VideoPlayerType::Swiftfin => SubtitleDeliveryMethod::Embed,
    };

    let mut profiles = Vec::new();
    for format in TEXT_SUBTITLES {
        profiles.push(SubtitleProfile {
            format: format.to_string(),
            method: SubtitleDeliveryMethod::Embed,
        });
    }
    for format in IMAGE_SUBTITLES {
        profiles.push(SubtitleProfile {
            format: format.to_string(),
            method: image_method,
        });
    }
    // External entries come last so the server prefers muxing when it can.
    for format in TEXT_SUBTITLES {
        profiles.push(SubtitleProfile {
            format: format.to_string(),
            method: SubtitleDeliveryMethod::External,
        });
    }
    profiles
}
