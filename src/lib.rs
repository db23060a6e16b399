//! vidgrab - scrape a video from a social-media page and download it.
//!
//! Drives a headless Chromium instance over CDP to find a playable video
//! source on the target page, fetches the bytes (directly over HTTP, or via
//! an in-page fetch when the source is an ephemeral blob URL), and writes
//! them to a timestamped file for downstream AI processing.

pub mod browser;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod handoff;
pub mod locate;
pub mod pipeline;
