//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so no runtime file I/O is
//! involved. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub app_title: String,
  pub backend_url: String,

  // Backend API
  pub videos_path: String,
  pub search_path: String,

  // HTTP client
  pub connect_timeout_secs: u64,
  pub request_timeout_secs: u64,
  pub user_agent: String,

  // mpv playback
  pub mpv_volume: u32,

  // UI loop
  pub poll_interval_ms: u64,
  pub error_dismiss_secs: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
