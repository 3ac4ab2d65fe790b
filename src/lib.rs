pub mod api;
pub mod bitrate;
pub mod config;
pub(crate) mod error;
pub mod item;
pub mod negotiate;
pub mod preview;
pub mod profile;
pub mod progress;
pub mod tracks;
pub mod transport;

#[cfg(test)]
pub(crate) mod tests;

pub use api::{JellyfinClient, MediaServer};
pub use bitrate::PlaybackBitrate;
pub use config::{ClientConfig, LoggingSettings, PlaybackSettings, ServerSettings};
pub use error::{PlaybackError, Result};
pub use item::{Listener, MediaPlayerItem, SubtitleChange, TrackSelection};
pub use negotiate::{NegotiatedStream, NegotiationSettings, StreamNegotiator};
pub use preview::{PreviewImage, PreviewImageProvider, PreviewScrubbing};
pub use profile::{CompatibilityMode, VideoPlayerType};
pub use tracks::{build_index_map, resolve_index_map, PlayerTrack, TrackIndexMap};
pub use transport::PlayerTransport;
