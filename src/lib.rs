#![forbid(unsafe_code)]

//! Local helper server for the short-video downloader extension.
//!
//! The browser extension posts TikTok / YouTube Shorts URLs here; the server
//! checks their shape, hands them to `yt-dlp` and reports where the file
//! landed.

pub mod api;
pub mod config;
pub mod download;
pub mod extractor;
pub mod naming;
pub mod validate;
