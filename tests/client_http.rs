//! JellyfinClient against a mock server.

mod common;

use common::{png, ClientAuthorization, TestHarness, USER_ID};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use jellyfin_playback::api::types::{BaseItemDto, PlaybackStartInfo, TrickplayInfo};
use jellyfin_playback::preview::TrickplayPreviewImageProvider;
use jellyfin_playback::{
    MediaServer, NegotiationSettings, PlaybackBitrate, PlaybackError, StreamNegotiator,
};

fn item_json() -> serde_json::Value {
    json!({
        "Id": "item1",
        "Name": "A Movie",
        "Type": "Movie",
        "MediaType": "Video",
        "Etag": "itemtag",
        "RunTimeTicks": 72_000_000_000i64,
        "MediaSources": [{"Id": "item1", "ETag": "srctag"}]
    })
}

fn settings(bitrate: PlaybackBitrate) -> NegotiationSettings {
    NegotiationSettings {
        player: Default::default(),
        bitrate,
        compatibility: Default::default(),
        bitrate_test_size: 500_000,
    }
}

async fn mount_item(h: &TestHarness) {
    Mock::given(method("GET"))
        .and(path(format!("/Users/{}/Items/item1", USER_ID)))
        .and(ClientAuthorization)
        .respond_with(ResponseTemplate::new(200).set_body_json(item_json()))
        .expect(1)
        .mount(&h.mock)
        .await;
}

#[tokio::test]
async fn get_item_decodes_dto() {
    let h = TestHarness::new().await;
    mount_item(&h).await;

    let item = h.client.get_item(USER_ID, "item1").await.unwrap();
    assert_eq!(item.name.as_deref(), Some("A Movie"));
    assert!(item.is_video());
    assert_eq!(item.runtime(), Some(Duration::from_secs(7200)));
    assert_eq!(item.media_sources.unwrap()[0].e_tag.as_deref(), Some("srctag"));
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let h = TestHarness::new().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.mock)
        .await;

    let err = h.client.get_item(USER_ID, "missing").await.unwrap_err();
    match err {
        PlaybackError::Status { status, url } => {
            assert_eq!(status.as_u16(), 404);
            assert!(url.ends_with("/Users/user1/Items/missing"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn negotiation_prefers_transcoding_url() {
    let h = TestHarness::new().await;
    mount_item(&h).await;
    Mock::given(method("POST"))
        .and(path("/Items/item1/PlaybackInfo"))
        .and(body_partial_json(json!({
            "UserId": USER_ID,
            "MaxStreamingBitrate": 4_000_000,
            "MediaSourceId": "item1",
            "AutoOpenLiveStream": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "PlaySessionId": "sess-42",
            "MediaSources": [{
                "Id": "item1",
                "ETag": "srctag",
                "Path": "http://nas/movie.mkv",
                "TranscodingUrl": "/videos/item1/master.m3u8?PlaySessionId=sess-42"
            }]
        })))
        .expect(1)
        .mount(&h.mock)
        .await;

    let negotiator = StreamNegotiator::new(Arc::new(h.client.clone()));
    let item = BaseItemDto {
        id: Some("item1".to_string()),
        ..Default::default()
    };
    let stream = negotiator
        .negotiate(&item, None, &settings(PlaybackBitrate::Fixed(4_000_000)), None, None)
        .await
        .unwrap();

    assert_eq!(stream.play_session_id, "sess-42");
    assert_eq!(
        stream.url.as_str(),
        format!("{}/videos/item1/master.m3u8?PlaySessionId=sess-42", h.mock.uri())
    );
}

#[tokio::test]
async fn negotiation_builds_static_stream_url() {
    let h = TestHarness::new().await;
    mount_item(&h).await;
    Mock::given(method("POST"))
        .and(path("/Items/item1/PlaybackInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "PlaySessionId": "sess-7",
            "MediaSources": [{"Id": "item1", "ETag": "srctag"}]
        })))
        .mount(&h.mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/Playback/BitrateTest"))
        .and(query_param("size", "500000"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 500_000]))
        .expect(1)
        .mount(&h.mock)
        .await;

    let negotiator = StreamNegotiator::new(Arc::new(h.client.clone()));
    let item = BaseItemDto {
        id: Some("item1".to_string()),
        ..Default::default()
    };
    let stream = negotiator
        .negotiate(&item, None, &settings(PlaybackBitrate::Auto), None, None)
        .await
        .unwrap();

    assert_eq!(stream.url.path(), "/Videos/item1/stream");
    let query = stream.url.query().unwrap();
    assert!(query.contains("static=true"));
    assert!(query.contains("tag=itemtag"));
    assert!(query.contains("playSessionId=sess-7"));
    assert!(query.contains("mediaSourceId=item1"));
    assert!(stream.max_bitrate >= jellyfin_playback::bitrate::MIN_AUTO_BITRATE);
    assert!(stream.max_bitrate <= jellyfin_playback::bitrate::MAX_BITRATE);
}

#[tokio::test]
async fn trickplay_sheet_is_fetched_once_over_http() {
    let h = TestHarness::new().await;
    Mock::given(method("GET"))
        .and(path("/Videos/item1/Trickplay/16/0.jpg"))
        .and(query_param("mediaSourceId", "src1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(png(32, 18, [200, 10, 10]))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&h.mock)
        .await;

    let info = TrickplayInfo {
        width: 16,
        height: 9,
        tile_width: 2,
        tile_height: 2,
        thumbnail_count: 4,
        interval: 1000,
        bandwidth: 0,
    };
    let provider = TrickplayPreviewImageProvider::new(
        Arc::new(h.client.clone()),
        info,
        "item1",
        "src1",
        Duration::from_secs(4),
    );

    let (a, b) = tokio::join!(
        provider.image(Duration::from_millis(500)),
        provider.image(Duration::from_millis(1500))
    );
    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!((a.index, b.index), (0, 1));
    assert_eq!((a.image.width(), a.image.height()), (16, 9));
    // Mock expectations are verified when the server is dropped.
}

#[tokio::test]
async fn playstate_reports_are_posted() {
    let h = TestHarness::new().await;
    Mock::given(method("POST"))
        .and(path("/Sessions/Playing"))
        .and(body_partial_json(json!({"ItemId": "item1", "PositionTicks": 10_000_000})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.mock)
        .await;

    h.client
        .report_playback_start(&PlaybackStartInfo {
            item_id: Some("item1".to_string()),
            position_ticks: Some(10_000_000),
            ..Default::default()
        })
        .await
        .unwrap();
}
