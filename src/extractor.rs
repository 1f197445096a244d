#![forbid(unsafe_code)]

//! Boundary to the external extraction engine.
//!
//! Everything site-specific (format negotiation, network retrieval, audio
//! transcoding) belongs to `yt-dlp`. This module only decides which flags to
//! pass, where the output goes, and how failures are reported back. The
//! [`Extractor`] trait is the seam the HTTP handlers depend on so tests can
//! swap in a stub.

use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Output, Stdio},
};
use thiserror::Error;
use tracing::debug;

/// Codec requested for audio-only downloads.
pub const AUDIO_CODEC: &str = "mp3";
/// Bitrate requested for audio-only downloads.
pub const AUDIO_QUALITY: &str = "192K";

const UNKNOWN: &str = "Unknown";

/// Read-only metadata projection returned by `/info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub author: String,
    pub thumbnail: String,
    pub duration: serde_json::Number,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{message}")]
    Engine { status: Option<i32>, message: String },
    #[error("could not decode extractor metadata: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Capability interface over the extraction engine. All calls block until
/// the engine returns; there is no timeout.
pub trait Extractor: Send + Sync {
    fn fetch_info(&self, url: &str) -> Result<VideoInfo, ExtractError>;

    /// Best combined audio+video format, written to exactly `output`.
    fn fetch_video(&self, url: &str, output: &Path) -> Result<(), ExtractError>;

    /// Best audio stream transcoded to [`AUDIO_CODEC`]. `output_base` has no
    /// extension; the engine appends it.
    fn fetch_audio(&self, url: &str, output_base: &Path) -> Result<(), ExtractError>;
}

/// Subset of `yt-dlp --dump-single-json` that `/info` exposes.
#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    duration: Option<serde_json::Number>,
}

impl From<RawInfo> for VideoInfo {
    fn from(raw: RawInfo) -> Self {
        Self {
            title: raw.title.unwrap_or_else(|| UNKNOWN.to_string()),
            author: raw.uploader.unwrap_or_else(|| UNKNOWN.to_string()),
            thumbnail: raw.thumbnail.unwrap_or_default(),
            duration: raw.duration.unwrap_or_else(|| serde_json::Number::from(0)),
        }
    }
}

/// `yt-dlp` driven as a subprocess.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs `<program> --version`, used at startup to warn early when the
    /// engine is missing.
    pub fn version(&self) -> Result<String, ExtractError> {
        let output = self.run(vec![OsString::from("--version")])?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run(&self, args: Vec<OsString>) -> Result<Output, ExtractError> {
        debug!(program = %self.program.display(), ?args, "running extractor");
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExtractError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(engine_failure(output.status, &output.stderr));
        }
        Ok(output)
    }
}

impl Extractor for YtDlp {
    fn fetch_info(&self, url: &str) -> Result<VideoInfo, ExtractError> {
        let output = self.run(info_args(url))?;
        let raw: RawInfo = serde_json::from_slice(&output.stdout)?;
        Ok(raw.into())
    }

    fn fetch_video(&self, url: &str, output: &Path) -> Result<(), ExtractError> {
        self.run(video_args(url, output)).map(drop)
    }

    fn fetch_audio(&self, url: &str, output_base: &Path) -> Result<(), ExtractError> {
        self.run(audio_args(url, output_base)).map(drop)
    }
}

fn common_flags() -> [&'static str; 3] {
    ["--no-playlist", "--quiet", "--no-warnings"]
}

/// Ends option parsing before the URL so a value starting with `-` can never
/// be read as a flag.
fn push_url(args: &mut Vec<OsString>, url: &str) {
    args.push(OsString::from("--"));
    args.push(OsString::from(url));
}

fn info_args(url: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["--dump-single-json", "--skip-download"]
        .into_iter()
        .chain(common_flags())
        .map(OsString::from)
        .collect();
    push_url(&mut args, url);
    args
}

fn video_args(url: &str, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["--format", "best"]
        .into_iter()
        .chain(common_flags())
        .map(OsString::from)
        .collect();
    args.push(OsString::from("--output"));
    args.push(output.as_os_str().to_owned());
    push_url(&mut args, url);
    args
}

fn audio_args(url: &str, output_base: &Path) -> Vec<OsString> {
    let mut template = output_base.as_os_str().to_owned();
    template.push(".%(ext)s");

    let mut args: Vec<OsString> = [
        "--format",
        "bestaudio/best",
        "--extract-audio",
        "--audio-format",
        AUDIO_CODEC,
        "--audio-quality",
        AUDIO_QUALITY,
    ]
    .into_iter()
    .chain(common_flags())
    .map(OsString::from)
    .collect();
    args.push(OsString::from("--output"));
    args.push(template);
    push_url(&mut args, url);
    args
}

/// Picks the most useful line out of the engine's stderr: the last `ERROR:`
/// line, else the last non-empty line, else the exit status.
fn engine_failure(status: ExitStatus, stderr: &[u8]) -> ExtractError {
    let stderr = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let message = lines
        .iter()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|line| line.to_string())
        .unwrap_or_else(|| format!("extractor exited with {status}"));
    ExtractError::Engine {
        status: status.code(),
        message,
    }
}
