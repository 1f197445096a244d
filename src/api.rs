#![forbid(unsafe_code)]

//! HTTP surface used by the browser extension.
//!
//! Every handler is stateless and single-pass. The only shared state is the
//! immutable [`ServerConfig`] and the extractor handle, both behind `Arc`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    config::ServerConfig,
    download::{self, DownloadError, DownloadOutcome, MediaKind},
    extractor::{Extractor, VideoInfo},
    validate::Platform,
};

const GENERIC_DOWNLOAD_FAILURE: &str = "Download failed";

/// Handles shared by every request.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
    extractor: Arc<dyn Extractor>,
}

impl AppState {
    pub fn new(config: ServerConfig, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            config: Arc::new(config),
            extractor,
        }
    }
}

/// Body accepted by `/info` and both download endpoints.
///
/// A missing `url` is treated like an empty one so the handler can answer
/// with the same 400 in both cases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "audioOnly")]
    pub audio_only: Option<bool>,
}

impl DownloadRequest {
    fn media_kind(&self) -> MediaKind {
        if self.audio_only.unwrap_or(true) {
            MediaKind::Audio
        } else {
            MediaKind::Video
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub path: String,
}

impl DownloadResponse {
    fn completed(message: &str, outcome: DownloadOutcome) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            filename: outcome.filename,
            path: outcome.path.to_string_lossy().into_owned(),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn method_not_allowed(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        if err.is_client_error() {
            Self::bad_request(err.to_string())
        } else {
            Self::internal(GENERIC_DOWNLOAD_FAILURE)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            Json(body),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Builds the full router, including the popup's `/youtube/*` aliases, CORS
/// for extension content scripts and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/info", post(get_info))
        .route("/youtube/info", post(get_info))
        .route("/download", post(download_tiktok))
        .route("/download-youtube", post(download_youtube))
        .route("/youtube/download", post(download_youtube))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

pub async fn get_info(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<Json<VideoInfo>> {
    let Json(request) = payload?;
    if request.url.is_empty() {
        return Err(DownloadError::MissingUrl.into());
    }

    let extractor = state.extractor.clone();
    let url = request.url.clone();
    let info = tokio::task::spawn_blocking(move || extractor.fetch_info(&url))
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;

    match info {
        Ok(info) => Ok(Json(info)),
        Err(err) => {
            warn!(url = %request.url, error = %err, "metadata lookup failed");
            Err(ApiError::bad_request(err.to_string()))
        }
    }
}

pub async fn download_tiktok(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<Json<DownloadResponse>> {
    let Json(request) = payload?;
    let outcome = run(&state, Platform::TikTok, MediaKind::Video, &request.url).await?;
    Ok(Json(DownloadResponse::completed(
        "Video downloaded successfully",
        outcome,
    )))
}

pub async fn download_youtube(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<Json<DownloadResponse>> {
    let Json(request) = payload?;
    let kind = request.media_kind();
    let outcome = run(&state, Platform::YouTube, kind, &request.url).await?;
    Ok(Json(DownloadResponse::completed("Download completed", outcome)))
}

async fn run(
    state: &AppState,
    platform: Platform,
    kind: MediaKind,
    url: &str,
) -> Result<DownloadOutcome, DownloadError> {
    download::run_download(
        state.extractor.clone(),
        &state.config.download_dir,
        platform,
        kind,
        url,
    )
    .await
    .inspect_err(|err| download::log_failure(platform, url, err))
}

async fn not_found() -> ApiError {
    ApiError::not_found("endpoint not found")
}

async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed("method not allowed")
}
