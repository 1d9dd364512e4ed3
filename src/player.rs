use std::process::Stdio;
use thiserror::Error;
use tokio::{
  io::BufReader as TokioBufReader,
  io::AsyncBufReadExt,
  process::{Child as TokioChild, Command},
  sync::mpsc,
  task::JoinHandle,
};
use tracing::{debug, info};

use crate::constants::constants;
use crate::session::PlaylistEntry;

// --- Format detection ---

/// Container format inferred from a playback URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
  M3u8,
  Mp4,
  Webm,
  Unknown,
}

impl MediaFormat {
  pub fn label(self) -> &'static str {
    match self {
      MediaFormat::M3u8 => "m3u8",
      MediaFormat::Mp4 => "mp4",
      MediaFormat::Webm => "webm",
      MediaFormat::Unknown => "unknown",
    }
  }
}

/// Infer the media format from a URL by substring match.
///
/// Checks `.m3u8`, then `.mp4`, then `.webm`; the first hit wins, so
/// `a.m3u8?x=mp4` is HLS. Anything else is `Unknown`.
pub fn detect_format(url: &str) -> MediaFormat {
  if url.contains(".m3u8") {
    MediaFormat::M3u8
  } else if url.contains(".mp4") {
    MediaFormat::Mp4
  } else if url.contains(".webm") {
    MediaFormat::Webm
  } else {
    MediaFormat::Unknown
  }
}

// --- Errors ---

#[derive(Debug, Error)]
pub enum PlayerError {
  #[error("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")]
  MpvMissing,
  #[error("HLS playback unavailable: this mpv build lacks the hls protocol")]
  HlsUnavailable,
  #[error("Unsupported video format ({})", .0.label())]
  UnsupportedFormat(MediaFormat),
  #[error("mpv process error: {0}")]
  Process(#[source] std::io::Error),
  #[error("mpv IPC error: {0}")]
  Ipc(String),
}

// --- Adapter seam ---

/// Seam between the playback session and the concrete video player.
///
/// `ensure_supported` runs before any teardown, so a failed precheck
/// leaves a previously live instance untouched. At most one instance is
/// live at a time.
pub trait PlayerAdapter {
  /// Whether a player instance is currently live.
  fn is_live(&self) -> bool;

  /// Verify the adapter can play `url` without touching the live instance.
  async fn ensure_supported(&mut self, url: &str) -> Result<(), PlayerError>;

  /// Tear down any live instance and spawn a new one for `entry`.
  async fn launch(&mut self, entry: &PlaylistEntry) -> Result<(), PlayerError>;

  /// Tear down the live instance, if any. Idempotent.
  async fn shutdown(&mut self) -> Result<(), PlayerError>;

  /// True if the player exited on its own since the last check; clears
  /// the live handle when it did.
  fn poll_exited(&mut self) -> bool;
}

// --- mpv implementation ---

/// Whether `protocol` appears in `mpv --list-protocols` output.
fn protocol_listed(listing: &str, protocol: &str) -> bool {
  listing.lines().map(|l| l.trim().trim_end_matches(':')).any(|l| l == protocol)
}

pub struct MpvPlayer {
  process: Option<TokioChild>,
  monitor_handle: Option<JoinHandle<()>>,
  status_rx: Option<mpsc::Receiver<String>>,
  last_status: Option<String>,
  ipc_socket_path: Option<String>,
  pub paused: bool,
  /// Cached result of the protocol probe. None until the first HLS play.
  hls_supported: Option<bool>,
}

impl MpvPlayer {
  pub fn new() -> Self {
    Self {
      process: None,
      monitor_handle: None,
      status_rx: None,
      last_status: None,
      ipc_socket_path: None,
      paused: false,
      hls_supported: None,
    }
  }

  /// Drain status lines from the mpv monitor task.
  pub fn check_status(&mut self) {
    if let Some(rx) = &mut self.status_rx {
      while let Ok(status) = rx.try_recv() {
        self.last_status = Some(status);
      }
    }
  }

  pub fn last_status(&self) -> Option<String> {
    self.last_status.clone()
  }

  /// Probe `mpv --list-protocols` for the `hls` protocol, caching the
  /// answer. HLS URLs are handed straight to mpv, so a build without the
  /// protocol must be rejected before any teardown happens.
  async fn ensure_hls(&mut self) -> Result<(), PlayerError> {
    if let Some(supported) = self.hls_supported {
      return if supported { Ok(()) } else { Err(PlayerError::HlsUnavailable) };
    }

    let output = Command::new("mpv")
      .arg("--list-protocols")
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::null())
      .output()
      .await
      .map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound { PlayerError::MpvMissing } else { PlayerError::Process(e) }
      })?;

    let listing = String::from_utf8_lossy(&output.stdout);
    let supported = protocol_listed(&listing, "hls");
    self.hls_supported = Some(supported);
    debug!(supported, "mpv hls protocol probe");
    if supported { Ok(()) } else { Err(PlayerError::HlsUnavailable) }
  }

  /// Toggle pause over the mpv IPC socket.
  pub async fn toggle_pause(&mut self) -> Result<(), PlayerError> {
    let Some(ref socket_path) = self.ipc_socket_path else {
      return Ok(());
    };
    let stream = tokio::net::UnixStream::connect(socket_path)
      .await
      .map_err(|e| PlayerError::Ipc(format!("connect to mpv socket: {}", e)))?;
    stream.writable().await.map_err(|e| PlayerError::Ipc(format!("mpv socket not writable: {}", e)))?;
    let cmd = b"{\"command\":[\"cycle\",\"pause\"]}\n";
    let written = stream.try_write(cmd).map_err(|e| PlayerError::Ipc(format!("send pause command: {}", e)))?;
    if written < cmd.len() {
      return Err(PlayerError::Ipc(format!("partial write: wrote {} of {} bytes", written, cmd.len())));
    }
    self.paused = !self.paused;
    Ok(())
  }
}

impl Default for MpvPlayer {
  fn default() -> Self {
    Self::new()
  }
}

impl PlayerAdapter for MpvPlayer {
  fn is_live(&self) -> bool {
    self.process.is_some()
  }

  async fn ensure_supported(&mut self, url: &str) -> Result<(), PlayerError> {
    match detect_format(url) {
      MediaFormat::M3u8 => self.ensure_hls().await,
      MediaFormat::Mp4 | MediaFormat::Webm => Ok(()),
      MediaFormat::Unknown => Err(PlayerError::UnsupportedFormat(MediaFormat::Unknown)),
    }
  }

  async fn launch(&mut self, entry: &PlaylistEntry) -> Result<(), PlayerError> {
    self.shutdown().await?;

    let socket_path = std::env::temp_dir().join(format!("mytv-mpv-{}.sock", std::process::id()));
    let socket_path_str = socket_path
      .to_str()
      .ok_or_else(|| PlayerError::Ipc("temp dir path is not valid UTF-8".to_string()))?
      .to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let mut cmd = Command::new("mpv");
    cmd.args([
      "--term-status-msg=Time: ${time-pos/full} / ${duration/full} | Title: ${media-title} | ${pause} ${percent-pos}%",
      &format!("--force-media-title={}", entry.title),
      &format!("--volume={}", constants().mpv_volume),
      &format!("--input-ipc-server={}", socket_path_str),
      &entry.url,
    ]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    // Send stderr to null; if piped but never drained, the pipe buffer
    // fills and mpv blocks.
    cmd.stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound { PlayerError::MpvMissing } else { PlayerError::Process(e) }
    })?;

    let stdout = child.stdout.take().ok_or_else(|| PlayerError::Ipc("failed to capture mpv stdout".to_string()))?;
    let (tx, rx) = mpsc::channel::<String>(10);
    self.status_rx = Some(rx);

    let monitor_handle = tokio::spawn(async move {
      let reader = TokioBufReader::new(stdout);
      let mut lines = reader.lines();
      while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
          break;
        }
      }
    });

    info!(url = %entry.url, title = %entry.title, "mpv: playback started");
    self.process = Some(child);
    self.monitor_handle = Some(monitor_handle);
    self.ipc_socket_path = Some(socket_path_str);
    self.paused = false;
    Ok(())
  }

  async fn shutdown(&mut self) -> Result<(), PlayerError> {
    if let Some(handle) = self.monitor_handle.take() {
      handle.abort();
      let _ = handle.await;
    }
    self.status_rx = None;
    self.last_status = None;

    if let Some(mut child) = self.process.take() {
      child.kill().await.map_err(PlayerError::Process)?;
      let _ = child.wait().await;
      debug!("mpv: process stopped");
    }

    self.paused = false;

    if let Some(path) = self.ipc_socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
    Ok(())
  }

  fn poll_exited(&mut self) -> bool {
    let exited = match self.process.as_mut() {
      Some(child) => matches!(child.try_wait(), Ok(Some(_))),
      None => false,
    };
    if exited {
      // The process is already gone; drop the handles without killing.
      self.process = None;
      if let Some(handle) = self.monitor_handle.take() {
        handle.abort();
      }
      self.status_rx = None;
      self.last_status = None;
      self.paused = false;
      if let Some(path) = self.ipc_socket_path.take() {
        let _ = std::fs::remove_file(&path);
      }
      info!("mpv: player exited on its own");
    }
    exited
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- detect_format ---

  #[test]
  fn detect_format_by_extension() {
    assert_eq!(detect_format("http://v.example/show/ep1.m3u8"), MediaFormat::M3u8);
    assert_eq!(detect_format("http://v.example/show/ep1.mp4"), MediaFormat::Mp4);
    assert_eq!(detect_format("http://v.example/show/ep1.webm"), MediaFormat::Webm);
  }

  #[test]
  fn detect_format_first_match_wins() {
    // `.m3u8` is checked before `.mp4`, so the query string does not flip the result.
    assert_eq!(detect_format("a.m3u8?x=mp4"), MediaFormat::M3u8);
    assert_eq!(detect_format("a.mp4?x=webm"), MediaFormat::Mp4);
  }

  #[test]
  fn detect_format_unknown() {
    assert_eq!(detect_format("a.ts"), MediaFormat::Unknown);
    assert_eq!(detect_format("http://v.example/stream"), MediaFormat::Unknown);
    assert_eq!(detect_format(""), MediaFormat::Unknown);
  }

  #[test]
  fn detect_format_is_case_sensitive() {
    assert_eq!(detect_format("a.M3U8"), MediaFormat::Unknown);
  }

  #[test]
  fn detect_format_deterministic() {
    let url = "http://v.example/a.m3u8";
    assert_eq!(detect_format(url), detect_format(url));
  }

  // --- protocol_listed ---

  #[test]
  fn protocol_listed_finds_hls() {
    let listing = "List of enabled protocols:\n appending\n crypto\n fd\n file\n hls\n http\n https\n";
    assert!(protocol_listed(listing, "hls"));
    assert!(protocol_listed(listing, "https"));
    assert!(!protocol_listed(listing, "rtmp"));
  }

  #[test]
  fn protocol_listed_ignores_trailing_colon() {
    let listing = " av:\n hls:\n";
    assert!(protocol_listed(listing, "hls"));
    assert!(protocol_listed(listing, "av"));
  }

  #[test]
  fn protocol_listed_no_substring_match() {
    let listing = " https\n";
    assert!(!protocol_listed(listing, "http"));
  }
}
