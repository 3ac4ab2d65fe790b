//! Shared helpers for HTTP-level tests against a mock Jellyfin server.

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::time::Duration;
use wiremock::{Match, MockServer, Request};

use jellyfin_playback::{JellyfinClient, PlayerTransport, ServerSettings};

pub const USER_ID: &str = "user1";
pub const TOKEN: &str = "secret-token";

pub struct TestHarness {
    pub mock: MockServer,
    pub client: JellyfinClient,
}

impl TestHarness {
    pub async fn new() -> Self {
        let mock = MockServer::start().await;
        let settings = ServerSettings {
            url: mock.uri(),
            access_token: Some(TOKEN.to_string()),
            user_id: Some(USER_ID.to_string()),
            client_name: "Tests".to_string(),
            device_name: "CI".to_string(),
            device_id: "device-1".to_string(),
            client_version: "0.0.1".to_string(),
            request_timeout_secs: 5,
        };
        let client = JellyfinClient::new(&settings).unwrap();
        Self { mock, client }
    }

    pub fn expected_auth_header() -> String {
        format!(
            "MediaBrowser Client=\"Tests\", Device=\"CI\", DeviceId=\"device-1\", Version=\"0.0.1\", Token=\"{}\"",
            TOKEN
        )
    }
}

/// Matches requests carrying exactly the harness client's `Authorization` header.
pub struct ClientAuthorization;

impl Match for ClientAuthorization {
    fn matches(&self, request: &Request) -> bool {
        request
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == TestHarness::expected_auth_header())
            .unwrap_or(false)
    }
}

pub fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[derive(Default)]
pub struct RecordingTransport {
    pub audio: Mutex<Vec<i32>>,
    pub subtitle: Mutex<Vec<i32>>,
}

impl PlayerTransport for RecordingTransport {
    fn set_audio_track(&self, index: i32) {
        self.audio.lock().push(index);
    }

    fn set_subtitle_track(&self, index: i32) {
        self.subtitle.lock().push(index);
    }

    fn position(&self) -> Duration {
        Duration::from_secs(42)
    }

    fn is_paused(&self) -> bool {
        false
    }
}
