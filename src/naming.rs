#![forbid(unsafe_code)]

//! Output naming: `<platform>_<YYYYMMDD_HHMMSS>[.<ext>]` inside the download
//! directory. Two requests landing in the same second share a name.

use chrono::{DateTime, Local, TimeZone};
use std::path::{Path, PathBuf};

use crate::validate::Platform;

pub const VIDEO_EXTENSION: &str = "mp4";
/// Extension the extractor appends after the audio transcode.
pub const AUDIO_EXTENSION: &str = "mp3";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Where a download is asked to go and where the file is expected to end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    /// Path given to the extractor. Has no extension for audio downloads.
    pub template: PathBuf,
    /// File name reported back to the client.
    pub filename: String,
    /// Absolute path of the final file.
    pub path: PathBuf,
}

pub fn timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format(TIMESTAMP_FORMAT).to_string()
}

pub fn local_timestamp() -> String {
    timestamp(&Local::now())
}

pub fn video_target(dir: &Path, platform: Platform, stamp: &str) -> OutputTarget {
    let filename = format!("{}_{stamp}.{VIDEO_EXTENSION}", platform.file_prefix());
    let path = dir.join(&filename);
    OutputTarget {
        template: path.clone(),
        filename,
        path,
    }
}

pub fn audio_target(dir: &Path, platform: Platform, stamp: &str) -> OutputTarget {
    let base = format!("{}_{stamp}", platform.file_prefix());
    let filename = format!("{base}.{AUDIO_EXTENSION}");
    OutputTarget {
        template: dir.join(&base),
        path: dir.join(&filename),
        filename,
    }
}
