//! HTTP surface.
//!
//! Thin routing and shaping layer over the core: handlers validate
//! inputs, call one core operation and map its tagged errors onto
//! status codes. "Nothing existed" renders as an empty result or 404;
//! "something broke" is always a distinct 5xx with the diagnostic text.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Json as JsonResponse, Response},
    routing::{get, post},
    serve, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::cleanup::{clip_stats, sweep_old_clips, ClipStats};
use crate::concat::{concatenate, remux_segment};
use crate::config::Config;
use crate::error::ClipError;
use crate::time_utils::{format_timestamp_for_query, parse_timestamp};
use crate::transcripts::{transcript_for_clip, TranscriptIndex, Transcription};
use crate::validation::{validate_channel_name, validate_file_name};

const MAX_PHRASE_LEN: usize = 200;

pub struct AppState {
    pub config: Config,
    pub index: Arc<dyn TranscriptIndex>,
}

type ApiError = (StatusCode, JsonResponse<Value>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, JsonResponse(json!({ "error": message.into() })))
}

fn clip_error_response(err: ClipError) -> ApiError {
    let status = match &err {
        ClipError::MalformedTimestamp(_)
        | ClipError::EmptyInput
        | ClipError::InvalidName(_) => StatusCode::BAD_REQUEST,
        ClipError::ChannelNotFound(_) | ClipError::SegmentNotFound(_) => StatusCode::NOT_FOUND,
        ClipError::ConcatenationFailed(_)
        | ClipError::RemuxTimeout(_)
        | ClipError::Index(_)
        | ClipError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

// Request structs
#[derive(Deserialize)]
struct SearchQuery {
    phrase: String,
}

#[derive(Deserialize)]
struct VideosQuery {
    channel: String,
    timestamp: String,
    radius: Option<usize>,
}

#[derive(Deserialize)]
pub struct ConcatRequest {
    pub channel: String,
    pub segments: Vec<String>,
}

#[derive(Deserialize)]
struct DownloadQuery {
    clip: String,
}

#[derive(Deserialize)]
struct PlayQuery {
    channel: String,
    file: String,
}

#[derive(Deserialize)]
struct TranscriptQuery {
    channel: String,
    timestamp: String,
    duration_secs: Option<i64>,
}

#[derive(Deserialize)]
struct CleanupQuery {
    max_age_hours: Option<u64>,
}

// Response structs
#[derive(Serialize)]
struct SearchResponse {
    results: Vec<Transcription>,
}

#[derive(Serialize)]
struct VideosResponse {
    videos: Vec<String>,
}

async fn health() -> JsonResponse<Value> {
    JsonResponse(json!({ "status": "ok" }))
}

async fn search_transcripts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<JsonResponse<SearchResponse>, ApiError> {
    let phrase = query.phrase.trim();
    if phrase.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "search phrase cannot be empty",
        ));
    }
    if phrase.len() > MAX_PHRASE_LEN {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("search phrase exceeds {} characters", MAX_PHRASE_LEN),
        ));
    }

    let results = state
        .index
        .search_phrase(phrase)
        .await
        .map_err(clip_error_response)?;
    Ok(JsonResponse(SearchResponse { results }))
}

/// List the segments around the one containing the requested instant.
///
/// A missing channel directory and an uncovered instant both render as
/// an empty listing: a blind spot is a valid outcome, not a failure.
async fn list_videos(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VideosQuery>,
) -> Result<JsonResponse<VideosResponse>, ApiError> {
    validate_channel_name(&query.channel).map_err(clip_error_response)?;
    let instant = parse_timestamp(&query.timestamp, state.config.time.fixed_offset)
        .map_err(clip_error_response)?;
    let radius = query
        .radius
        .unwrap_or(state.config.server.default_radius)
        .clamp(1, state.config.server.max_radius);

    let catalog = match Catalog::build(
        &state.config.storage,
        state.config.time.fixed_offset,
        query.channel.trim(),
    )
    .await
    {
        Ok(catalog) => catalog,
        Err(ClipError::ChannelNotFound(channel)) => {
            debug!("no directory for channel {}, returning empty listing", channel);
            return Ok(JsonResponse(VideosResponse { videos: Vec::new() }));
        }
        Err(e) => return Err(clip_error_response(e)),
    };

    let videos = match catalog.locate(instant) {
        Some((index, _)) => catalog
            .neighbors(index, radius)
            .iter()
            .map(|segment| segment.name.clone())
            .collect(),
        None => {
            debug!(
                "no segment of {} covers {}, returning empty listing",
                query.channel, instant
            );
            Vec::new()
        }
    };

    Ok(JsonResponse(VideosResponse { videos }))
}

async fn concat_videos(
    State(state): State<Arc<AppState>>,
    JsonResponse(request): JsonResponse<ConcatRequest>,
) -> Result<JsonResponse<Value>, ApiError> {
    validate_channel_name(&request.channel).map_err(clip_error_response)?;
    if request.segments.len() > state.config.storage.max_concat_segments {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!(
                "at most {} segments per concatenation",
                state.config.storage.max_concat_segments
            ),
        ));
    }

    let artifact = concatenate(
        &state.config.storage,
        request.channel.trim(),
        &request.segments,
    )
    .await
    .map_err(clip_error_response)?;

    Ok(JsonResponse(json!({
        "message": "segments concatenated",
        "clip": artifact.file_name,
        "size_bytes": artifact.size_bytes,
        "download_url": format!("/clips/download?clip={}", artifact.file_name),
    })))
}

async fn download_clip(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    validate_file_name(&query.clip).map_err(clip_error_response)?;
    if !query.clip.ends_with(&format!(".{}", state.config.storage.clip_ext)) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("only .{} clips can be downloaded", state.config.storage.clip_ext),
        ));
    }

    let path = state.config.storage.output_dir.join(&query.clip);
    stream_file(&path, "video/mp4", Some(query.clip.as_str())).await
}

/// Serve one recorded segment for playback, remuxed into the clip
/// container. When the remux tool fails the raw segment is served
/// instead of an error.
async fn play_video(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PlayQuery>,
) -> Result<Response, ApiError> {
    validate_channel_name(&query.channel).map_err(clip_error_response)?;
    validate_file_name(&query.file).map_err(clip_error_response)?;
    if !query.file.ends_with(&format!(".{}", state.config.storage.segment_ext)) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("only .{} files can be played", state.config.storage.segment_ext),
        ));
    }

    match remux_segment(&state.config.storage, query.channel.trim(), &query.file).await {
        Ok(path) => stream_file(&path, "video/mp4", None).await,
        Err(e @ (ClipError::ConcatenationFailed(_) | ClipError::RemuxTimeout(_))) => {
            warn!("remux failed for {}, serving raw segment: {}", query.file, e);
            let raw = state
                .config
                .storage
                .video_dir
                .join(query.channel.trim())
                .join(&query.file);
            stream_file(&raw, "video/mp2t", None).await
        }
        Err(e) => Err(clip_error_response(e)),
    }
}

async fn clip_transcript(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TranscriptQuery>,
) -> Result<JsonResponse<Value>, ApiError> {
    validate_channel_name(&query.channel).map_err(clip_error_response)?;
    let instant = parse_timestamp(&query.timestamp, state.config.time.fixed_offset)
        .map_err(clip_error_response)?;
    let duration_secs = query
        .duration_secs
        .unwrap_or(state.config.time.fallback_clip_secs)
        .clamp(1, state.config.time.max_clip_secs);

    let transcript = transcript_for_clip(
        state.index.as_ref(),
        &state.config.storage,
        &state.config.time,
        query.channel.trim(),
        instant,
        duration_secs,
    )
    .await
    .map_err(clip_error_response)?;

    let text = if transcript.text.is_empty() {
        "no transcriptions available for this time range".to_string()
    } else {
        transcript.text
    };

    Ok(JsonResponse(json!({
        "channel": query.channel,
        "timestamp": query.timestamp,
        "text": text,
        "window_start": format_timestamp_for_query(&transcript.window.start),
        "window_end": format_timestamp_for_query(&transcript.window.end),
        "window_source": transcript.window.source,
    })))
}

async fn run_cleanup(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CleanupQuery>,
) -> JsonResponse<Value> {
    let max_age_hours = query.max_age_hours.unwrap_or(1).clamp(1, 24);
    let result = sweep_old_clips(&state.config.storage, max_age_hours).await;
    JsonResponse(json!({
        "message": format!("cleanup done: {} clip(s) deleted", result.count()),
        "deleted_count": result.count(),
        "deleted": result.deleted,
        "failed": result.failed,
    }))
}

async fn maintenance_stats(State(state): State<Arc<AppState>>) -> JsonResponse<ClipStats> {
    JsonResponse(clip_stats(&state.config.storage).await)
}

async fn stream_file(
    path: &Path,
    content_type: &str,
    attachment: Option<&str>,
) -> Result<Response, ApiError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(error_response(StatusCode::NOT_FOUND, "file not found"))
        }
        Err(e) => {
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to open file: {}", e),
            ))
        }
    };

    let mut builder = Response::builder().header(header::CONTENT_TYPE, content_type);
    builder = match attachment {
        Some(name) => builder.header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", name),
        ),
        None => builder
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CACHE_CONTROL, "public, max-age=3600"),
    };

    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| {
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to build response: {}", e),
            )
        })
}

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/search", get(search_transcripts))
        .route("/videos", get(list_videos))
        .route("/videos/concat", post(concat_videos))
        .route("/videos/play", get(play_video))
        .route("/clips/download", get(download_clip))
        .route("/transcripts/clip", get(clip_transcript))
        .route("/maintenance/cleanup", post(run_cleanup))
        .route("/maintenance/stats", get(maintenance_stats))
        .layer(CorsLayer::permissive())
}

pub struct Server {
    state: Arc<AppState>,
    addr: SocketAddr,
}

impl Server {
    pub fn new(state: Arc<AppState>, addr: SocketAddr) -> Self {
        Server { state, addr }
    }

    pub async fn start(self) -> std::io::Result<()> {
        let app = create_router().with_state(self.state);
        info!("starting server on {}", self.addr);
        serve(
            TcpListener::bind(self.addr).await?,
            app.into_make_service(),
        )
        .await
    }
}
