use thiserror::Error;

/// Main error type for the playback core
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The item handed to the builder has no server id
    #[error("Item has no identifier")]
    MissingIdentifier,

    /// No signed-in user to scope the request to
    #[error("No user session")]
    MissingUserSession,

    /// The server answered PlaybackInfo without a usable media source
    #[error("Unable to find media source for item")]
    NoMediaSource,

    /// The server answered PlaybackInfo without a play session id
    #[error("No associated play session ID")]
    NoPlaySession,

    /// None of the stream URL candidates could be built
    #[error("Unable to make stream URL: {0}")]
    UrlConstructionFailed(String),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-success status
    #[error("Unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL could not be parsed or joined
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A fetched image could not be decoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PlaybackError>;
