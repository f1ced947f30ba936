use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Form, Json, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use libtubetag_pipeline::tubetag::{
    ArtifactResult, ErrorKind, MediaMetadata, Pipeline, PipelineError, Stage,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Semaphore, SemaphorePermit};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const MISSING_URL: &str = "No URL provided";
const NO_PROGRESSIVE_STREAM: &str = "No progressive mp4 stream found";

#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
    workers: Arc<Semaphore>,
}

impl AppState {
    /// `workers` bounds how many requests run their pipeline at once. The rest wait for a slot.
    pub fn new(pipeline: Pipeline, workers: usize) -> Self {
        Self {
            pipeline,
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    async fn worker(&self) -> Result<SemaphorePermit<'_>, PipelineError> {
        self.workers.acquire().await.map_err(|e| {
            PipelineError::new(Stage::Scope, ErrorKind::InternalError, e.to_string())
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/info", post(info))
        .route("/download", post(download_mp3))
        .route("/download_mp3", post(download_mp3))
        .route("/download_mp4", post(download_mp4))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize, Debug, Default)]
struct UrlRequest {
    #[serde(default)]
    url: Option<String>,
}

impl UrlRequest {
    /// Blank values count as missing.
    fn into_url(self) -> Option<String> {
        self.url.filter(|u| !u.trim().is_empty())
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct InfoResponse {
    title: String,
    author: String,
    thumbnail_url: String,
    length: u64,
}

impl From<MediaMetadata> for InfoResponse {
    fn from(metadata: MediaMetadata) -> Self {
        Self {
            title: metadata.title,
            author: metadata.author,
            thumbnail_url: metadata.thumbnail_url,
            length: metadata.duration_seconds,
        }
    }
}

/// Only caller-fixable input problems and access denials get their own status. Everything else,
/// including a source that doesn't exist, is a generic failure.
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InputError | ErrorKind::NoAudioStream => StatusCode::BAD_REQUEST,
        ErrorKind::Unavailable => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn pipeline_json_error(e: &PipelineError) -> Response {
    json_error(status_for(e.kind), &e.cause)
}

async fn info(
    State(state): State<AppState>,
    request: Result<Json<UrlRequest>, JsonRejection>,
) -> Response {
    let Some(url) = request.ok().and_then(|Json(r)| r.into_url()) else {
        return json_error(StatusCode::BAD_REQUEST, MISSING_URL);
    };
    info!("info request for {url}");

    let result = match state.worker().await {
        Ok(_permit) => state.pipeline.info(&url).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(metadata) => Json(InfoResponse::from(metadata)).into_response(),
        Err(e) => {
            error!("info for {url} failed: {e}");
            pipeline_json_error(&e)
        }
    }
}

async fn download_mp3(
    State(state): State<AppState>,
    form: Result<Form<UrlRequest>, FormRejection>,
) -> Response {
    let Some(url) = form.ok().and_then(|Form(r)| r.into_url()) else {
        return (StatusCode::BAD_REQUEST, format!("Error: {MISSING_URL}")).into_response();
    };
    info!("mp3 request for {url}");

    let result = match state.worker().await {
        Ok(_permit) => state.pipeline.download_audio(&url).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(artifact) => artifact_response(artifact),
        Err(e) if e.kind == ErrorKind::NoAudioStream => {
            (StatusCode::BAD_REQUEST, e.cause).into_response()
        }
        Err(e) => (status_for(e.kind), format!("Error: {}", e.cause)).into_response(),
    }
}

async fn download_mp4(
    State(state): State<AppState>,
    form: Result<Form<UrlRequest>, FormRejection>,
) -> Response {
    let Some(url) = form.ok().and_then(|Form(r)| r.into_url()) else {
        return json_error(StatusCode::BAD_REQUEST, MISSING_URL);
    };
    info!("mp4 request for {url}");

    let result = match state.worker().await {
        Ok(_permit) => state.pipeline.download_video(&url).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(artifact) => artifact_response(artifact),
        // selection only fails when no progressive stream exists
        Err(e) if e.stage == Stage::Select => {
            json_error(StatusCode::NOT_FOUND, NO_PROGRESSIVE_STREAM)
        }
        Err(e) => pipeline_json_error(&e),
    }
}

fn artifact_response(artifact: ArtifactResult) -> Response {
    info!(
        "sending {} ({} bytes)",
        artifact.suggested_file_name,
        artifact.bytes.len()
    );
    (
        [
            (header::CONTENT_TYPE, artifact.mime_type.to_owned()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&artifact.suggested_file_name),
            ),
        ],
        artifact.bytes,
    )
        .into_response()
}

/// `attachment` disposition for `file_name`. Names that aren't plain printable ASCII get an
/// ASCII fallback plus an RFC 5987 `filename*` parameter carrying the real name.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if fallback == file_name {
        format!("attachment; filename=\"{file_name}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(file_name)
        )
    }
}
