//! Seam to the native media engine.

use std::time::Duration;

/// Operations the playback core needs from whatever actually renders media.
///
/// Track indices are in the player's numbering; `-1` disables subtitles.
pub trait PlayerTransport: Send + Sync {
    fn set_audio_track(&self, index: i32);

    fn set_subtitle_track(&self, index: i32);

    /// Current playback position.
    fn position(&self) -> Duration;

    fn is_paused(&self) -> bool;
}
