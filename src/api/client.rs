//! Jellyfin HTTP client.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use super::types::{
    BaseItemDto, PlaybackInfoDto, PlaybackInfoResponse, PlaybackProgressInfo, PlaybackStartInfo,
    PlaybackStopInfo,
};
use crate::config::ServerSettings;
use crate::error::{PlaybackError, Result};

/// The server operations the playback core depends on.
///
/// `JellyfinClient` is the production implementation. Tests substitute
/// in-memory doubles.
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Server root that relative URLs are resolved against.
    fn base_url(&self) -> &Url;

    /// Id of the signed-in user, if any.
    fn user_id(&self) -> Option<&str>;

    async fn get_item(&self, user_id: &str, item_id: &str) -> Result<BaseItemDto>;

    async fn playback_info(&self, item_id: &str, request: &PlaybackInfoDto) -> Result<PlaybackInfoResponse>;

    /// Download `size` bytes of filler and return the observed throughput in bits/s.
    async fn bitrate_test(&self, size: u64) -> Result<i64>;

    /// Fetch a binary resource (tile sheets, chapter images, posters).
    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes>;

    async fn report_playback_start(&self, info: &PlaybackStartInfo) -> Result<()>;

    async fn report_playback_progress(&self, info: &PlaybackProgressInfo) -> Result<()>;

    async fn report_playback_stopped(&self, info: &PlaybackStopInfo) -> Result<()>;
}

/// Append `path_and_query` to the server root, keeping any base path the
/// server is mounted under.
pub fn endpoint_url(base: &Url, path_and_query: &str) -> Result<Url> {
    let root = base.as_str().trim_end_matches('/');
    let path = path_and_query.trim_start_matches('/');
    Ok(Url::parse(&format!("{}/{}", root, path))?)
}

/// Static stream of the original file.
pub fn video_stream_url(
    base: &Url,
    item_id: &str,
    tag: Option<&str>,
    play_session_id: &str,
    media_source_id: &str,
) -> Result<Url> {
    let mut url = endpoint_url(base, &format!("Videos/{}/stream", item_id))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("static", "true");
        if let Some(tag) = tag {
            query.append_pair("tag", tag);
        }
        query.append_pair("playSessionId", play_session_id);
        query.append_pair("mediaSourceId", media_source_id);
    }
    Ok(url)
}

/// One trickplay tile sheet.
pub fn trickplay_sheet_url(
    base: &Url,
    item_id: &str,
    width: u32,
    sheet: i64,
    media_source_id: &str,
) -> Result<Url> {
    let mut url = endpoint_url(base, &format!("Videos/{}/Trickplay/{}/{}.jpg", item_id, width, sheet))?;
    url.query_pairs_mut().append_pair("mediaSourceId", media_source_id);
    Ok(url)
}

/// An item image. `index` is only used for indexed image types such as chapters.
pub fn item_image_url(
    base: &Url,
    item_id: &str,
    image_type: &str,
    index: Option<usize>,
    max_width: u32,
    quality: u32,
    tag: Option<&str>,
) -> Result<Url> {
    let path = match index {
        Some(index) => format!("Items/{}/Images/{}/{}", item_id, image_type, index),
        None => format!("Items/{}/Images/{}", item_id, image_type),
    };
    let mut url = endpoint_url(base, &path)?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("maxWidth", &max_width.to_string());
        query.append_pair("quality", &quality.to_string());
        if let Some(tag) = tag {
            query.append_pair("tag", tag);
        }
    }
    Ok(url)
}

/// Jellyfin HTTP client.
#[derive(Clone)]
pub struct JellyfinClient {
    inner: Arc<JellyfinClientInner>,
}

struct JellyfinClientInner {
    base_url: Url,
    user_id: Option<String>,
    http_client: Client,
}

impl JellyfinClient {
    /// Create a new client from the server section of the configuration.
    pub fn new(settings: &ServerSettings) -> Result<Self> {
        let base_url = Url::parse(&settings.url)?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&settings.authorization_header())
            .map_err(|e| PlaybackError::Config(format!("invalid authorization header: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);

        let http_client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            inner: Arc::new(JellyfinClientInner {
                base_url,
                user_id: settings.user_id.clone(),
                http_client,
            }),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(url = %url, "GET");
        let response = self.inner.http_client.get(url.clone()).send().await?;
        let response = check_status(response, &url)?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T> {
        debug!(url = %url, "POST");
        let response = self.inner.http_client.post(url.clone()).json(body).send().await?;
        let response = check_status(response, &url)?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post_no_content<B: Serialize + Sync>(&self, url: Url, body: &B) -> Result<()> {
        debug!(url = %url, "POST");
        let response = self.inner.http_client.post(url.clone()).json(body).send().await?;
        check_status(response, &url)?;
        Ok(())
    }
}

fn check_status(response: reqwest::Response, url: &Url) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(PlaybackError::Status {
            status,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl MediaServer for JellyfinClient {
    fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn user_id(&self) -> Option<&str> {
        self.inner.user_id.as_deref()
    }

    async fn get_item(&self, user_id: &str, item_id: &str) -> Result<BaseItemDto> {
        let url = endpoint_url(&self.inner.base_url, &format!("Users/{}/Items/{}", user_id, item_id))?;
        self.get_json(url).await
    }

    async fn playback_info(&self, item_id: &str, request: &PlaybackInfoDto) -> Result<PlaybackInfoResponse> {
        let url = endpoint_url(&self.inner.base_url, &format!("Items/{}/PlaybackInfo", item_id))?;
        self.post_json(url, request).await
    }

    async fn bitrate_test(&self, size: u64) -> Result<i64> {
        let mut url = endpoint_url(&self.inner.base_url, "Playback/BitrateTest")?;
        url.query_pairs_mut().append_pair("size", &size.to_string());

        let start = Instant::now();
        let body = self.fetch_bytes(&url).await?;
        let elapsed = start.elapsed().as_secs_f64().max(0.001);

        let bits = body.len() as f64 * 8.0;
        let bps = (bits / elapsed) as i64;
        debug!(bytes = body.len(), elapsed_ms = (elapsed * 1000.0) as u64, bps, "bitrate test finished");
        Ok(bps)
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes> {
        debug!(url = %url, "GET");
        let response = self.inner.http_client.get(url.clone()).send().await?;
        let response = check_status(response, url)?;
        Ok(response.bytes().await?)
    }

    async fn report_playback_start(&self, info: &PlaybackStartInfo) -> Result<()> {
        let url = endpoint_url(&self.inner.base_url, "Sessions/Playing")?;
        self.post_no_content(url, info).await
    }

    async fn report_playback_progress(&self, info: &PlaybackProgressInfo) -> Result<()> {
        let url = endpoint_url(&self.inner.base_url, "Sessions/Playing/Progress")?;
        self.post_no_content(url, info).await
    }

    async fn report_playback_stopped(&self, info: &PlaybackStopInfo) -> Result<()> {
        let url = endpoint_url(&self.inner.base_url, "Sessions/Playing/Stopped")?;
        self.post_no_content(url, info).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://media.example.com/jellyfin/").unwrap()
    }

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let url = endpoint_url(&base(), "/Items/1/PlaybackInfo").unwrap();
        assert_eq!(url.as_str(), "https://media.example.com/jellyfin/Items/1/PlaybackInfo");

        let no_slash = Url::parse("http://host:8096").unwrap();
        let url = endpoint_url(&no_slash, "videos/1/master.m3u8?a=b").unwrap();
        assert_eq!(url.as_str(), "http://host:8096/videos/1/master.m3u8?a=b");
    }

    #[test]
    fn test_video_stream_url() {
        let url = video_stream_url(&base(), "item1", Some("etag1"), "sess1", "item1").unwrap();
        assert_eq!(url.path(), "/jellyfin/Videos/item1/stream");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            query,
            vec![
                ("static".to_string(), "true".to_string()),
                ("tag".to_string(), "etag1".to_string()),
                ("playSessionId".to_string(), "sess1".to_string()),
                ("mediaSourceId".to_string(), "item1".to_string()),
            ]
        );
    }

    #[test]
    fn test_trickplay_and_chapter_urls() {
        let url = trickplay_sheet_url(&base(), "item1", 320, 4, "src1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://media.example.com/jellyfin/Videos/item1/Trickplay/320/4.jpg?mediaSourceId=src1"
        );

        let url = item_image_url(&base(), "item1", "Chapter", Some(2), 500, 90, Some("t")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://media.example.com/jellyfin/Items/item1/Images/Chapter/2?maxWidth=500&quality=90&tag=t"
        );

        let url = item_image_url(&base(), "item1", "Primary", None, 100, 90, None).unwrap();
        assert_eq!(url.path(), "/jellyfin/Items/item1/Images/Primary");
    }

    #[test]
    fn test_client_requires_valid_url() {
        let settings = ServerSettings {
            url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(JellyfinClient::new(&settings), Err(PlaybackError::Url(_))));
    }
}
