//! Mapping between server stream indices and player track indices.
//!
//! In direct play the player sees the container as-is, so server and player
//! indices coincide. A transcode only carries a subset of streams, which the
//! player numbers from zero. Sidecar subtitles are loaded by the player on
//! its own and only become addressable once it reports its track list.

use std::collections::{BTreeMap, HashSet};

use crate::api::types::{MediaStream, MediaStreamType, PlayMethod, SubtitleDeliveryMethod};

/// Server stream index -> player track index.
pub type TrackIndexMap = BTreeMap<i32, i32>;

/// A track as enumerated by the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerTrack {
    pub index: i32,
    pub title: String,
}

impl PlayerTrack {
    pub fn new(index: i32, title: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
        }
    }
}

fn is_dropped_subtitle(stream: &MediaStream) -> bool {
    stream.is_type(MediaStreamType::Subtitle)
        && stream.delivery_method == Some(SubtitleDeliveryMethod::Drop)
}

/// Build the initial map from the stream list. Sidecar and dropped subtitles
/// are never part of it.
pub fn build_index_map(
    streams: &[MediaStream],
    play_method: PlayMethod,
    selected_audio_index: Option<i32>,
) -> TrackIndexMap {
    let candidates = streams
        .iter()
        .filter(|s| !s.is_sidecar_subtitle() && !is_dropped_subtitle(s))
        .filter_map(|s| s.index.map(|index| (index, s)));

    if play_method != PlayMethod::Transcode {
        return candidates.map(|(index, _)| (index, index)).collect();
    }

    let audio_index = selected_audio_index
        .filter(|i| {
            streams
                .iter()
                .any(|s| s.index == Some(*i) && s.is_type(MediaStreamType::Audio))
        })
        .or_else(|| {
            streams
                .iter()
                .find(|s| s.is_type(MediaStreamType::Audio))
                .and_then(|s| s.index)
        });

    let mut survivors: Vec<i32> = candidates
        .filter(|(index, stream)| match stream.stream_type {
            Some(MediaStreamType::Video) => true,
            Some(MediaStreamType::Audio) => Some(*index) == audio_index,
            Some(MediaStreamType::Subtitle) => matches!(
                stream.delivery_method,
                Some(SubtitleDeliveryMethod::Embed) | Some(SubtitleDeliveryMethod::Hls)
            ),
            _ => false,
        })
        .map(|(index, _)| index)
        .collect();
    survivors.sort_unstable();

    survivors
        .into_iter()
        .zip(0..)
        .collect()
}

/// Extend `existing` with sidecar subtitles matched to player tracks by
/// exact title. Existing entries are never changed and each player track is
/// claimed at most once.
pub fn resolve_index_map(
    existing: &TrackIndexMap,
    sidecars: &[MediaStream],
    player_tracks: &[PlayerTrack],
    is_transcoding: bool,
) -> TrackIndexMap {
    let mut resolved = existing.clone();

    let sidecar_indices: HashSet<i32> = sidecars.iter().filter_map(|s| s.index).collect();
    let mut claimed: HashSet<i32> = existing
        .iter()
        .filter(|(server, _)| is_transcoding || sidecar_indices.contains(server))
        .map(|(_, player)| *player)
        .collect();

    for sidecar in sidecars {
        let Some(index) = sidecar.index else { continue };
        if resolved.contains_key(&index) {
            continue;
        }
        let Some(title) = sidecar.match_title() else { continue };

        if let Some(track) = player_tracks
            .iter()
            .find(|t| t.title == title && !claimed.contains(&t.index))
        {
            claimed.insert(track.index);
            resolved.insert(index, track.index);
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(index: i32, ty: MediaStreamType) -> MediaStream {
        MediaStream {
            index: Some(index),
            stream_type: Some(ty),
            ..Default::default()
        }
    }

    fn subtitle(index: i32, delivery: SubtitleDeliveryMethod) -> MediaStream {
        MediaStream {
            delivery_method: Some(delivery),
            is_text_subtitle_stream: Some(true),
            ..stream(index, MediaStreamType::Subtitle)
        }
    }

    fn sidecar(index: i32, title: &str) -> MediaStream {
        MediaStream {
            is_external: Some(true),
            display_title: Some(title.to_string()),
            ..subtitle(index, SubtitleDeliveryMethod::External)
        }
    }

    fn sample_streams() -> Vec<MediaStream> {
        vec![
            stream(0, MediaStreamType::Video),
            stream(1, MediaStreamType::Audio),
            stream(2, MediaStreamType::Audio),
            subtitle(3, SubtitleDeliveryMethod::Embed),
            subtitle(4, SubtitleDeliveryMethod::Encode),
            subtitle(5, SubtitleDeliveryMethod::Hls),
            subtitle(6, SubtitleDeliveryMethod::Drop),
            sidecar(7, "English (SRT)"),
        ]
    }

    #[test]
    fn test_direct_play_is_identity() {
        let map = build_index_map(&sample_streams(), PlayMethod::DirectPlay, None);
        let expected: TrackIndexMap = [0, 1, 2, 3, 4, 5].iter().map(|i| (*i, *i)).collect();
        assert_eq!(map, expected);
    }

    #[test]
    fn test_transcode_keeps_only_survivors() {
        let map = build_index_map(&sample_streams(), PlayMethod::Transcode, Some(2));
        let expected: TrackIndexMap = [(0, 0), (2, 1), (3, 2), (5, 3)].into_iter().collect();
        assert_eq!(map, expected);

        let values: HashSet<i32> = map.values().copied().collect();
        assert_eq!(values.len(), map.len());
        assert!(values.iter().all(|v| *v >= 0 && (*v as usize) < map.len()));
    }

    #[test]
    fn test_transcode_falls_back_to_first_audio() {
        let streams = sample_streams();
        for selected in [None, Some(3), Some(99)] {
            let map = build_index_map(&streams, PlayMethod::Transcode, selected);
            assert!(map.contains_key(&1));
            assert!(!map.contains_key(&2));
        }
    }

    #[test]
    fn test_transcode_without_audio() {
        let streams = vec![stream(0, MediaStreamType::Video), subtitle(1, SubtitleDeliveryMethod::Embed)];
        let map = build_index_map(&streams, PlayMethod::Transcode, Some(1));
        let expected: TrackIndexMap = [(0, 0), (1, 1)].into_iter().collect();
        assert_eq!(map, expected);
    }

    #[test]
    fn test_resolve_matches_sidecar_by_title() {
        let streams = sample_streams();
        let existing = build_index_map(&streams, PlayMethod::DirectPlay, None);
        let tracks = vec![PlayerTrack::new(3, "Embedded"), PlayerTrack::new(8, "English (SRT)")];

        let resolved = resolve_index_map(&existing, &[sidecar(7, "English (SRT)")], &tracks, false);
        assert_eq!(resolved.get(&7), Some(&8));
        for (k, v) in &existing {
            assert_eq!(resolved.get(k), Some(v));
        }
    }

    #[test]
    fn test_resolve_falls_back_to_title() {
        let mut side = sidecar(9, "ignored");
        side.display_title = None;
        side.title = Some("Commentary".to_string());
        let resolved = resolve_index_map(
            &TrackIndexMap::new(),
            &[side],
            &[PlayerTrack::new(0, "Commentary")],
            false,
        );
        assert_eq!(resolved.get(&9), Some(&0));
    }

    #[test]
    fn test_resolve_claims_each_track_once() {
        let sidecars = vec![sidecar(7, "English"), sidecar(8, "English")];
        let tracks = vec![PlayerTrack::new(4, "English")];
        let resolved = resolve_index_map(&TrackIndexMap::new(), &sidecars, &tracks, false);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.get(&7), Some(&4));
        assert!(!resolved.contains_key(&8));
    }

    #[test]
    fn test_resolve_skips_used_indices_when_transcoding() {
        let existing: TrackIndexMap = [(0, 0), (1, 1), (3, 2)].into_iter().collect();
        let tracks = vec![PlayerTrack::new(2, "English"), PlayerTrack::new(5, "English")];

        let resolved = resolve_index_map(&existing, &[sidecar(9, "English")], &tracks, true);
        assert_eq!(resolved.get(&9), Some(&5));

        let resolved = resolve_index_map(&existing, &[sidecar(9, "English")], &tracks, false);
        assert_eq!(resolved.get(&9), Some(&2));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let sidecars = vec![sidecar(7, "English"), sidecar(8, "English"), sidecar(9, "French")];
        let tracks = vec![
            PlayerTrack::new(0, "English"),
            PlayerTrack::new(1, "German"),
        ];
        let existing: TrackIndexMap = [(0, 0)].into_iter().collect();

        let once = resolve_index_map(&existing, &sidecars, &tracks, false);
        let twice = resolve_index_map(&once, &sidecars, &tracks, false);
        assert_eq!(once, twice);
        assert!(!once.contains_key(&8));
        assert!(!once.contains_key(&9));
    }

    #[test]
    fn test_resolve_never_overwrites() {
        let existing: TrackIndexMap = [(7, 3)].into_iter().collect();
        let resolved = resolve_index_map(
            &existing,
            &[sidecar(7, "English")],
            &[PlayerTrack::new(0, "English")],
            false,
        );
        assert_eq!(resolved.get(&7), Some(&3));
    }
}
