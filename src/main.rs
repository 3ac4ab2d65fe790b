//! Playback diagnostic
//!
//! Negotiates a stream for one library item the way a player would and
//! prints what the server decided: URL, play method, track selection and
//! the server-to-player track index map.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jellyfin_playback::api::types::BaseItemDto;
use jellyfin_playback::{
    ClientConfig, JellyfinClient, LoggingSettings, MediaPlayerItem, MediaServer, Result,
    TrackSelection,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "jellyfin-playback";

#[derive(Parser, Debug)]
#[command(name = "jellyfin-playback")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML).
    #[arg(short, long, default_value = "client.toml")]
    config: PathBuf,

    /// Library item to negotiate.
    item_id: String,

    /// Server index of the audio stream to request.
    #[arg(long)]
    audio: Option<i32>,

    /// Server index of the subtitle stream to request, -1 for none.
    #[arg(long, allow_hyphen_values = true)]
    subtitle: Option<i32>,

    /// Also fetch the scrub preview at this many seconds.
    #[arg(long)]
    scrub: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = if args.config.exists() {
        ClientConfig::from_file(&args.config)?
    } else {
        ClientConfig::default()
    };

    init_logging(&config.logging);
    tracing::info!("{} v{} starting", APP_NAME, VERSION);

    if !args.config.exists() {
        tracing::warn!(path = %args.config.display(), "config file not found, using defaults");
    }
    config.validate()?;

    let server: Arc<dyn MediaServer> = Arc::new(JellyfinClient::new(&config.server)?);

    let item = BaseItemDto {
        id: Some(args.item_id.clone()),
        ..Default::default()
    };
    let selection = TrackSelection {
        audio: args.audio,
        subtitle: args.subtitle,
    };

    let player_item =
        MediaPlayerItem::build(server, &item, None, &config.playback, selection).await?;

    tracing::info!(
        url = %player_item.url(),
        play_method = ?player_item.play_method(),
        play_session_id = player_item.play_session_id(),
        "stream negotiated"
    );
    tracing::info!(
        audio = player_item.selected_audio_stream_index(),
        subtitle = player_item.selected_subtitle_stream_index(),
        "selected tracks"
    );
    for (server_index, player_index) in player_item.index_map() {
        tracing::info!(server_index, player_index, "track mapping");
    }

    if let Some(seconds) = args.scrub {
        match player_item.preview_image(Duration::from_secs(seconds)).await {
            Some(preview) => tracing::info!(
                index = preview.index,
                width = preview.image.width(),
                height = preview.image.height(),
                "preview image"
            ),
            None => tracing::warn!(seconds, "no preview image available"),
        }
    }

    Ok(())
}

/// Initialize logging with tracing
fn init_logging(settings: &LoggingSettings) {
    let json = settings.format == "json";
    let default_filter = format!("jellyfin_playback={}", settings.level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_args() {
        Args::command().debug_assert();

        let args = Args::try_parse_from([
            "jellyfin-playback",
            "--config",
            "c.toml",
            "abc123",
            "--audio",
            "2",
            "--subtitle",
            "-1",
            "--scrub",
            "90",
        ])
        .unwrap();
        assert_eq!(args.item_id, "abc123");
        assert_eq!(args.audio, Some(2));
        assert_eq!(args.subtitle, Some(-1));
        assert_eq!(args.scrub, Some(90));
    }
}
