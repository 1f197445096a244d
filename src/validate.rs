#![forbid(unsafe_code)]

//! URL shape checks performed before anything is handed to the extractor.
//!
//! Patterns are anchored at the start only; whatever follows the host path
//! separator is accepted verbatim. No normalization or redirect resolution
//! happens here.

use regex::Regex;
use std::{fmt, sync::LazyLock};

static TIKTOK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://((?:vm|vt|www)\.)?tiktok\.com/").expect("valid TikTok pattern")
});

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.)?(youtube\.com|youtu\.be)/").expect("valid YouTube pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    TikTok,
    YouTube,
}

impl Platform {
    pub fn matches(self, url: &str) -> bool {
        match self {
            Self::TikTok => TIKTOK_URL.is_match(url),
            Self::YouTube => YOUTUBE_URL.is_match(url),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::TikTok => "TikTok",
            Self::YouTube => "YouTube",
        }
    }

    /// Prefix used for downloaded file names.
    pub fn file_prefix(self) -> &'static str {
        match self {
            Self::TikTok => "tiktok",
            Self::YouTube => "youtube",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
