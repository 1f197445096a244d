#![forbid(unsafe_code)]

//! Single-shot download orchestration: validate, name, extract, verify.
//!
//! Each call is independent. The extractor runs on the blocking pool and the
//! caller waits for it; nothing is queued and nothing is retried.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::{
    extractor::{ExtractError, Extractor},
    naming::{self, OutputTarget},
    validate::Platform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Best combined audio+video, `.mp4`.
    Video,
    /// Audio-only transcode, `.mp3`.
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("No URL provided")]
    MissingUrl,
    #[error("Invalid {0} URL")]
    InvalidUrl(Platform),
    #[error("extractor failed: {0}")]
    Engine(#[from] ExtractError),
    #[error("extractor reported success but {} is missing", .0.display())]
    MissingOutput(PathBuf),
    #[error("download directory unavailable: {0}")]
    Filesystem(#[from] io::Error),
    #[error("extractor worker panicked: {0}")]
    Worker(#[from] JoinError),
}

impl DownloadError {
    /// Input problems the client can fix, as opposed to failures on our side.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingUrl | Self::InvalidUrl(_))
    }
}

/// Checks a URL against the platform pattern without touching the extractor.
pub fn check_url(platform: Platform, url: &str) -> Result<(), DownloadError> {
    if url.is_empty() {
        return Err(DownloadError::MissingUrl);
    }
    if !platform.matches(url) {
        return Err(DownloadError::InvalidUrl(platform));
    }
    Ok(())
}

pub async fn run_download(
    extractor: Arc<dyn Extractor>,
    download_dir: &Path,
    platform: Platform,
    kind: MediaKind,
    url: &str,
) -> Result<DownloadOutcome, DownloadError> {
    download_with_stamp(
        extractor,
        download_dir,
        platform,
        kind,
        url,
        &naming::local_timestamp(),
    )
    .await
}

async fn download_with_stamp(
    extractor: Arc<dyn Extractor>,
    download_dir: &Path,
    platform: Platform,
    kind: MediaKind,
    url: &str,
    stamp: &str,
) -> Result<DownloadOutcome, DownloadError> {
    check_url(platform, url)?;

    // The directory is created at startup but may have been removed since.
    std::fs::create_dir_all(download_dir)?;

    let target = match kind {
        MediaKind::Video => naming::video_target(download_dir, platform, stamp),
        MediaKind::Audio => naming::audio_target(download_dir, platform, stamp),
    };
    info!(%platform, ?kind, url, file = %target.filename, "starting download");

    let OutputTarget {
        template,
        filename,
        path,
    } = target;
    let url_owned = url.to_string();
    tokio::task::spawn_blocking(move || match kind {
        MediaKind::Video => extractor.fetch_video(&url_owned, &template),
        MediaKind::Audio => extractor.fetch_audio(&url_owned, &template),
    })
    .await??;

    // Audio output is not re-checked: the engine picks the final suffix.
    if kind == MediaKind::Video && !path.exists() {
        return Err(DownloadError::MissingOutput(path));
    }

    info!(file = %filename, path = %path.display(), "download finished");
    Ok(DownloadOutcome { filename, path })
}

/// Logs the typed cause of a failed download. Clients only ever see a
/// generic message for non-input failures.
pub fn log_failure(platform: Platform, url: &str, err: &DownloadError) {
    if err.is_client_error() {
        info!(%platform, url, error = %err, "rejected download request");
    } else {
        warn!(%platform, url, error = %err, "download failed");
    }
}
