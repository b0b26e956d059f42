use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::FixedOffset;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

use streamclip_server::config::{
    Config, IndexConfig, RetentionConfig, ServerConfig, StorageConfig, TimeConfig,
};
use streamclip_server::{create_router, AppState, ClipResult, TranscriptIndex, Transcription};

#[derive(Default)]
struct MockIndex {
    phrase_hits: Vec<Transcription>,
    range_hits: Vec<Transcription>,
    recorded_ranges: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl TranscriptIndex for MockIndex {
    async fn search_phrase(&self, _phrase: &str) -> ClipResult<Vec<Transcription>> {
        Ok(self.phrase_hits.clone())
    }

    async fn fetch_range(
        &self,
        channel: &str,
        start: &str,
        end: &str,
    ) -> ClipResult<Vec<Transcription>> {
        self.recorded_ranges.lock().unwrap().push((
            channel.to_string(),
            start.to_string(),
            end.to_string(),
        ));
        Ok(self.range_hits.clone())
    }
}

fn test_config(root: &Path) -> Config {
    Config {
        storage: StorageConfig {
            video_dir: root.join("channels"),
            output_dir: root.join("clips"),
            segment_ext: "ts".to_string(),
            clip_ext: "mp4".to_string(),
            ffmpeg_path: "ffmpeg".into(),
            remux_timeout_secs: 60,
            max_concat_segments: 20,
        },
        time: TimeConfig {
            fixed_offset: FixedOffset::east_opt(0).unwrap(),
            fallback_clip_secs: 90,
            max_clip_secs: 300,
        },
        index: IndexConfig {
            url: "http://localhost:9200".to_string(),
            index: "streaming_tv".to_string(),
            username: "elastic".to_string(),
            password: String::new(),
            accept_invalid_certs: false,
            lookback_hours: 24,
            per_channel_hits: 10,
        },
        server: ServerConfig {
            port: 0,
            default_radius: 3,
            max_radius: 10,
        },
        retention: RetentionConfig {
            retention_hours: 2,
            sweep_interval_secs: 1800,
        },
    }
}

fn setup_app(root: &Path, index: Arc<MockIndex>) -> Router {
    let state = Arc::new(AppState {
        config: test_config(root),
        index,
    });
    create_router().with_state(state)
}

fn make_segments(root: &Path, channel: &str, names: &[&str]) {
    let dir = root.join("channels").join(channel);
    std::fs::create_dir_all(&dir).unwrap();
    for name in names {
        std::fs::write(dir.join(name), b"segment-bytes").unwrap();
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn sample_hit(text: &str, timestamp: &str) -> Transcription {
    Transcription {
        text: text.to_string(),
        channel: "a24".to_string(),
        display_name: "A24 Noticias".to_string(),
        timestamp: timestamp.to_string(),
        service: "whisper".to_string(),
        channel_id: "ch-7".to_string(),
    }
}

#[tokio::test]
async fn test_health() {
    let root = TempDir::new().unwrap();
    let app = setup_app(root.path(), Arc::new(MockIndex::default()));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_videos_unknown_channel_is_empty_not_error() {
    let root = TempDir::new().unwrap();
    let app = setup_app(root.path(), Arc::new(MockIndex::default()));

    let response = app
        .oneshot(get("/videos?channel=nope&timestamp=2025-01-01T10:01:30Z"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "videos": [] }));
}

#[tokio::test]
async fn test_videos_blind_spot_is_empty_not_error() {
    let root = TempDir::new().unwrap();
    make_segments(
        root.path(),
        "a24",
        &["a24_20250101_100000_20250101_100130.ts"],
    );
    let app = setup_app(root.path(), Arc::new(MockIndex::default()));

    let response = app
        .oneshot(get("/videos?channel=a24&timestamp=2025-01-01T18:00:00Z"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "videos": [] }));
}

#[tokio::test]
async fn test_videos_returns_clamped_neighborhood() {
    let root = TempDir::new().unwrap();
    make_segments(
        root.path(),
        "a24",
        &[
            "a24_20250101_100000_20250101_100130.ts",
            "a24_20250101_100130_20250101_100300.ts",
            "a24_20250101_100300_20250101_100430.ts",
        ],
    );
    let app = setup_app(root.path(), Arc::new(MockIndex::default()));

    // the boundary instant resolves to the middle segment
    let response = app
        .oneshot(get(
            "/videos?channel=a24&timestamp=2025-01-01T10:01:30Z&radius=1",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["videos"],
        json!([
            "a24_20250101_100000_20250101_100130.ts",
            "a24_20250101_100130_20250101_100300.ts",
            "a24_20250101_100300_20250101_100430.ts",
        ])
    );
}

#[tokio::test]
async fn test_videos_malformed_timestamp_is_bad_request() {
    let root = TempDir::new().unwrap();
    let app = setup_app(root.path(), Arc::new(MockIndex::default()));

    let response = app
        .oneshot(get("/videos?channel=a24&timestamp=yesterday"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("malformed timestamp"));
}

#[tokio::test]
async fn test_videos_traversal_channel_rejected() {
    let root = TempDir::new().unwrap();
    let app = setup_app(root.path(), Arc::new(MockIndex::default()));

    let response = app
        .oneshot(get("/videos?channel=..%2Fetc&timestamp=2025-01-01T10:00:00Z"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_empty_phrase_is_bad_request() {
    let root = TempDir::new().unwrap();
    let app = setup_app(root.path(), Arc::new(MockIndex::default()));

    let response = app.oneshot(get("/search?phrase=%20")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_returns_index_hits() {
    let root = TempDir::new().unwrap();
    let index = Arc::new(MockIndex {
        phrase_hits: vec![sample_hit("la noticia", "2025-09-05T23:41:06Z")],
        ..MockIndex::default()
    });
    let app = setup_app(root.path(), index);

    let response = app.oneshot(get("/search?phrase=noticia")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["results"][0]["text"], "la noticia");
}

#[tokio::test]
async fn test_concat_empty_segment_list_is_bad_request() {
    let root = TempDir::new().unwrap();
    let app = setup_app(root.path(), Arc::new(MockIndex::default()));

    let response = app
        .oneshot(post_json(
            "/videos/concat",
            json!({ "channel": "a24", "segments": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_concat_missing_segment_is_not_found() {
    let root = TempDir::new().unwrap();
    let app = setup_app(root.path(), Arc::new(MockIndex::default()));
    make_segments(root.path(), "a24", &[]);

    let response = app
        .oneshot(post_json(
            "/videos/concat",
            json!({ "channel": "a24", "segments": ["a24_20250101_100000_20250101_100130.ts"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("a24_20250101_100000_20250101_100130.ts"));
}

#[tokio::test]
async fn test_transcript_falls_back_to_grid_window() {
    let root = TempDir::new().unwrap();
    let index = Arc::new(MockIndex::default());
    let app = setup_app(root.path(), index.clone());

    // no channel directory exists, so the 90s grid window applies:
    // 00:01:00 floors to [00:00:00, 00:01:30)
    let response = app
        .oneshot(get(
            "/transcripts/clip?channel=a24&timestamp=2025-01-01T00:01:00Z&duration_secs=90",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["window_source"], "fixed_grid");
    assert_eq!(body["window_start"], "2025-01-01T00:00:00Z");
    assert_eq!(body["window_end"], "2025-01-01T00:01:30Z");
    assert_eq!(
        body["text"],
        "no transcriptions available for this time range"
    );

    let ranges = index.recorded_ranges.lock().unwrap();
    assert_eq!(
        ranges.as_slice(),
        &[(
            "a24".to_string(),
            "2025-01-01T00:00:00Z".to_string(),
            "2025-01-01T00:01:30Z".to_string()
        )]
    );
}

#[tokio::test]
async fn test_transcript_uses_segment_boundaries_when_covered() {
    let root = TempDir::new().unwrap();
    make_segments(
        root.path(),
        "a24",
        &["a24_20250101_000030_20250101_000200.ts"],
    );
    let index = Arc::new(MockIndex {
        range_hits: vec![
            sample_hit("primera parte", "2025-01-01T00:00:40Z"),
            sample_hit("segunda parte", "2025-01-01T00:01:10Z"),
        ],
        ..MockIndex::default()
    });
    let app = setup_app(root.path(), index.clone());

    let response = app
        .oneshot(get(
            "/transcripts/clip?channel=a24&timestamp=2025-01-01T00:01:00Z",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["window_source"], "segment_boundaries");
    assert_eq!(body["window_start"], "2025-01-01T00:00:30Z");
    assert_eq!(body["window_end"], "2025-01-01T00:02:00Z");
    assert_eq!(body["text"], "primera parte segunda parte");
}

#[tokio::test]
async fn test_download_traversal_rejected_and_absent_clip_404() {
    let root = TempDir::new().unwrap();
    let app = setup_app(root.path(), Arc::new(MockIndex::default()));

    let response = app
        .clone()
        .oneshot(get("/clips/download?clip=..%2Fsecret.mp4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get("/clips/download?clip=nope.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get("/clips/download?clip=a24-20250101_100000_100130.mp4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cleanup_endpoint_reports_deletions() {
    let root = TempDir::new().unwrap();
    let app = setup_app(root.path(), Arc::new(MockIndex::default()));

    let response = app
        .oneshot(post_json("/maintenance/cleanup?max_age_hours=1", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deleted_count"], 0);
    assert_eq!(body["deleted"], json!([]));
}

#[tokio::test]
async fn test_stats_endpoint() {
    let root = TempDir::new().unwrap();
    let app = setup_app(root.path(), Arc::new(MockIndex::default()));

    let response = app.oneshot(get("/maintenance/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 0);
}
