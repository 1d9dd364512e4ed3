use thiserror::Error;
use tracing::{debug, info};

use crate::api::Episode;
use crate::player::{PlayerAdapter, PlayerError};

// --- Playlist ---

/// One playable entry in the active playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
  pub url: String,
  pub title: String,
}

/// Build a playlist from an episode group. Episodes with a blank name get
/// a numbered fallback title so every entry stays addressable in the UI.
pub fn playlist_from_episodes(episodes: &[Episode]) -> Vec<PlaylistEntry> {
  episodes
    .iter()
    .enumerate()
    .map(|(idx, ep)| {
      let title = if ep.name.is_empty() { format!("第{}集", idx + 1) } else { ep.name.clone() };
      PlaylistEntry { url: ep.url.clone(), title }
    })
    .collect()
}

// --- Errors ---

#[derive(Debug, Error)]
pub enum SessionError {
  #[error("Episode index {index} out of range (playlist has {len})")]
  IndexOutOfRange { index: usize, len: usize },
  /// The precheck failed; playlist, index, and any live player are intact.
  #[error(transparent)]
  Rejected(PlayerError),
  /// The old player was torn down but no new one is live; the session is
  /// positioned on the new entry with no player.
  #[error(transparent)]
  LaunchFailed(PlayerError),
}

// --- Session ---

/// Coarse lifecycle state, derived from the playlist and player liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  /// No playlist selected yet.
  Idle,
  /// A playlist is loaded but no player is live.
  Ready,
  /// A player is live for the current entry.
  Playing,
}

/// Owns the active playlist, the current index, and the player lifecycle.
///
/// The playlist is replaced wholesale by `select_episode`; navigation only
/// moves the index. Whenever a player is live, `current_index` is in
/// bounds and the player is bound to `playlist[current_index].url`.
pub struct PlaybackSession<P: PlayerAdapter> {
  playlist: Vec<PlaylistEntry>,
  current_index: usize,
  player: P,
}

impl<P: PlayerAdapter> PlaybackSession<P> {
  pub fn new(player: P) -> Self {
    Self { playlist: Vec::new(), current_index: 0, player }
  }

  pub fn state(&self) -> SessionState {
    if self.player.is_live() {
      SessionState::Playing
    } else if self.playlist.is_empty() {
      SessionState::Idle
    } else {
      SessionState::Ready
    }
  }

  pub fn is_playing(&self) -> bool {
    self.player.is_live()
  }

  pub fn playlist(&self) -> &[PlaylistEntry] {
    &self.playlist
  }

  pub fn current_index(&self) -> usize {
    self.current_index
  }

  /// The entry the session is positioned on, if a playlist is loaded.
  pub fn current_entry(&self) -> Option<&PlaylistEntry> {
    self.playlist.get(self.current_index)
  }

  pub fn player(&self) -> &P {
    &self.player
  }

  pub fn player_mut(&mut self) -> &mut P {
    &mut self.player
  }

  /// Replace the playlist and start playback at `index`.
  ///
  /// The format precheck runs before anything is touched: on failure the
  /// previous playlist, index, and player (possibly still live) survive
  /// unchanged. After the precheck the old player is torn down before the
  /// new one is spawned, so at most one instance is ever live. A launch
  /// failure leaves the session at the new position with no live player.
  pub async fn select_episode(&mut self, playlist: Vec<PlaylistEntry>, index: usize) -> Result<(), SessionError> {
    if index >= playlist.len() {
      return Err(SessionError::IndexOutOfRange { index, len: playlist.len() });
    }
    self.player.ensure_supported(&playlist[index].url).await.map_err(SessionError::Rejected)?;

    self.playlist = playlist;
    self.current_index = index;
    self.resolve_current().await
  }

  /// Step to the previous entry. Silently does nothing at the start.
  pub async fn play_previous(&mut self) -> Result<(), SessionError> {
    if self.playlist.is_empty() || self.current_index == 0 {
      debug!("play_previous: already at the start");
      return Ok(());
    }
    self.step_to(self.current_index - 1).await
  }

  /// Step to the next entry. Silently does nothing at the end.
  pub async fn play_next(&mut self) -> Result<(), SessionError> {
    if self.playlist.is_empty() || self.current_index >= self.playlist.len() - 1 {
      debug!("play_next: already at the end");
      return Ok(());
    }
    self.step_to(self.current_index + 1).await
  }

  /// Move to `target` with the same precheck-then-commit order as
  /// `select_episode`, so a rejected format never moves the index away
  /// from the entry the live player is bound to.
  async fn step_to(&mut self, target: usize) -> Result<(), SessionError> {
    self.player.ensure_supported(&self.playlist[target].url).await.map_err(SessionError::Rejected)?;
    self.current_index = target;
    self.resolve_current().await
  }

  /// Tear down the old player and launch one for the current entry.
  async fn resolve_current(&mut self) -> Result<(), SessionError> {
    self.player.shutdown().await.map_err(SessionError::LaunchFailed)?;
    // Safety: current_index was bounds-checked by every caller.
    let entry = &self.playlist[self.current_index];
    info!(index = self.current_index, title = %entry.title, url = %entry.url, "session: playing entry");
    self.player.launch(entry).await.map_err(SessionError::LaunchFailed)?;
    Ok(())
  }

  /// Stop playback, keeping the playlist and position.
  pub async fn stop(&mut self) -> Result<(), SessionError> {
    self.player.shutdown().await.map_err(SessionError::LaunchFailed)?;
    Ok(())
  }

  /// Clear the live handle if the player exited on its own.
  /// Returns true when an exit was reaped.
  pub fn reap(&mut self) -> bool {
    self.player.poll_exited()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::player::{MediaFormat, detect_format};

  // --- Fake player ---

  struct FakePlayer {
    live_url: Option<String>,
    launches: Vec<String>,
    shutdowns: usize,
    hls_available: bool,
    fail_next_launch: bool,
    exited: bool,
  }

  impl FakePlayer {
    fn new() -> Self {
      Self {
        live_url: None,
        launches: Vec::new(),
        shutdowns: 0,
        hls_available: true,
        fail_next_launch: false,
        exited: false,
      }
    }
  }

  impl PlayerAdapter for FakePlayer {
    fn is_live(&self) -> bool {
      self.live_url.is_some()
    }

    async fn ensure_supported(&mut self, url: &str) -> Result<(), PlayerError> {
      match detect_format(url) {
        MediaFormat::M3u8 if !self.hls_available => Err(PlayerError::HlsUnavailable),
        MediaFormat::Unknown => Err(PlayerError::UnsupportedFormat(MediaFormat::Unknown)),
        _ => Ok(()),
      }
    }

    async fn launch(&mut self, entry: &PlaylistEntry) -> Result<(), PlayerError> {
      assert!(self.live_url.is_none(), "launch while a player is live");
      if self.fail_next_launch {
        self.fail_next_launch = false;
        return Err(PlayerError::MpvMissing);
      }
      self.launches.push(entry.url.clone());
      self.live_url = Some(entry.url.clone());
      Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), PlayerError> {
      if self.live_url.take().is_some() {
        self.shutdowns += 1;
      }
      Ok(())
    }

    fn poll_exited(&mut self) -> bool {
      if self.exited && self.live_url.is_some() {
        self.live_url = None;
        self.exited = false;
        return true;
      }
      false
    }
  }

  fn make_playlist(urls: &[&str]) -> Vec<PlaylistEntry> {
    urls.iter().enumerate().map(|(i, u)| PlaylistEntry { url: u.to_string(), title: format!("EP{}", i + 1) }).collect()
  }

  fn make_episode(name: &str, url: &str) -> Episode {
    Episode { name: name.to_string(), url: url.to_string() }
  }

  // --- playlist_from_episodes ---

  #[test]
  fn playlist_titles_use_episode_names() {
    let episodes = [make_episode("EP1", "http://v/1.mp4"), make_episode("Finale", "http://v/2.mp4")];
    let playlist = playlist_from_episodes(&episodes);
    assert_eq!(playlist[0].title, "EP1");
    assert_eq!(playlist[1].title, "Finale");
  }

  #[test]
  fn playlist_blank_names_get_numbered_fallback() {
    let episodes = [make_episode("", "http://v/1.mp4"), make_episode("", "http://v/2.mp4")];
    let playlist = playlist_from_episodes(&episodes);
    assert_eq!(playlist[0].title, "第1集");
    assert_eq!(playlist[1].title, "第2集");
  }

  #[test]
  fn playlist_empty_input_empty_output() {
    assert!(playlist_from_episodes(&[]).is_empty());
  }

  // --- select_episode ---

  #[tokio::test]
  async fn select_binds_player_to_entry() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    let playlist = make_playlist(&["http://v/1.mp4", "http://v/2.mp4"]);

    session.select_episode(playlist, 1).await.unwrap();

    assert_eq!(session.state(), SessionState::Playing);
    assert_eq!(session.current_index(), 1);
    assert_eq!(session.player().live_url.as_deref(), Some("http://v/2.mp4"));
    assert_eq!(session.current_entry().map(|e| e.title.as_str()), Some("EP2"));
  }

  #[tokio::test]
  async fn select_out_of_range_leaves_state_untouched() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    let playlist = make_playlist(&["http://v/1.mp4"]);

    let err = session.select_episode(playlist, 5).await.unwrap_err();

    assert!(matches!(err, SessionError::IndexOutOfRange { index: 5, len: 1 }));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.playlist().is_empty());
    assert!(session.player().launches.is_empty());
  }

  #[tokio::test]
  async fn select_replaces_playlist_wholesale() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    session.select_episode(make_playlist(&["http://old/1.mp4", "http://old/2.mp4"]), 0).await.unwrap();

    let replacement = make_playlist(&["http://new/1.mp4", "http://new/2.mp4", "http://new/3.mp4"]);
    session.select_episode(replacement.clone(), 2).await.unwrap();

    assert_eq!(session.playlist(), replacement.as_slice());
    assert_eq!(session.current_index(), 2);
    assert_eq!(session.player().live_url.as_deref(), Some("http://new/3.mp4"));
    // The old instance was destroyed exactly once.
    assert_eq!(session.player().shutdowns, 1);
  }

  #[tokio::test]
  async fn select_unsupported_keeps_old_player_running() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    let old = make_playlist(&["http://old/1.mp4"]);
    session.select_episode(old.clone(), 0).await.unwrap();

    let err = session.select_episode(make_playlist(&["http://new/1.ts"]), 0).await.unwrap_err();

    assert!(matches!(err, SessionError::Rejected(PlayerError::UnsupportedFormat(_))));
    assert_eq!(session.playlist(), old.as_slice());
    assert_eq!(session.current_index(), 0);
    assert_eq!(session.state(), SessionState::Playing);
    assert_eq!(session.player().live_url.as_deref(), Some("http://old/1.mp4"));
    assert_eq!(session.player().shutdowns, 0);
  }

  #[tokio::test]
  async fn select_hls_without_support_is_rejected_before_teardown() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    session.player_mut().hls_available = false;

    let err = session.select_episode(make_playlist(&["http://v/1.m3u8"]), 0).await.unwrap_err();

    assert!(matches!(err, SessionError::Rejected(PlayerError::HlsUnavailable)));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.player().launches.is_empty());
  }

  #[tokio::test]
  async fn launch_failure_leaves_no_dangling_handle() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    session.select_episode(make_playlist(&["http://old/1.mp4"]), 0).await.unwrap();

    session.player_mut().fail_next_launch = true;
    let replacement = make_playlist(&["http://new/1.mp4"]);
    let err = session.select_episode(replacement.clone(), 0).await.unwrap_err();

    assert!(matches!(err, SessionError::LaunchFailed(_)));
    // Committed to the new playlist, but nothing is live.
    assert_eq!(session.playlist(), replacement.as_slice());
    assert_eq!(session.state(), SessionState::Ready);
    assert!(!session.is_playing());
    assert_eq!(session.player().shutdowns, 1);
  }

  // --- navigation ---

  #[tokio::test]
  async fn next_advances_and_swaps_player() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    session.select_episode(make_playlist(&["http://v/1.mp4", "http://v/2.mp4"]), 0).await.unwrap();

    session.play_next().await.unwrap();

    assert_eq!(session.current_index(), 1);
    assert_eq!(session.player().live_url.as_deref(), Some("http://v/2.mp4"));
    assert_eq!(session.player().launches, ["http://v/1.mp4", "http://v/2.mp4"]);
    assert_eq!(session.player().shutdowns, 1);
  }

  #[tokio::test]
  async fn previous_at_start_is_exact_noop() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    session.select_episode(make_playlist(&["http://v/1.mp4", "http://v/2.mp4"]), 0).await.unwrap();

    session.play_previous().await.unwrap();

    assert_eq!(session.current_index(), 0);
    assert_eq!(session.player().live_url.as_deref(), Some("http://v/1.mp4"));
    // The live player was not recreated.
    assert_eq!(session.player().launches.len(), 1);
    assert_eq!(session.player().shutdowns, 0);
  }

  #[tokio::test]
  async fn next_at_end_is_exact_noop() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    session.select_episode(make_playlist(&["http://v/1.mp4", "http://v/2.mp4"]), 1).await.unwrap();

    session.play_next().await.unwrap();

    assert_eq!(session.current_index(), 1);
    assert_eq!(session.player().launches.len(), 1);
    assert_eq!(session.player().shutdowns, 0);
  }

  #[tokio::test]
  async fn next_then_previous_round_trips() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    session.select_episode(make_playlist(&["http://v/1.mp4", "http://v/2.mp4"]), 0).await.unwrap();

    session.play_next().await.unwrap();
    session.play_previous().await.unwrap();

    assert_eq!(session.current_index(), 0);
    assert_eq!(session.player().live_url.as_deref(), Some("http://v/1.mp4"));
    assert_eq!(session.player().launches, ["http://v/1.mp4", "http://v/2.mp4", "http://v/1.mp4"]);
  }

  #[tokio::test]
  async fn empty_playlist_navigation_never_launches() {
    let mut session = PlaybackSession::new(FakePlayer::new());

    session.play_next().await.unwrap();
    session.play_previous().await.unwrap();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.is_playing());
    assert!(session.player().launches.is_empty());
  }

  #[tokio::test]
  async fn navigation_precheck_failure_keeps_index_and_player() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    session.select_episode(make_playlist(&["http://v/1.mp4", "http://v/2.ts"]), 0).await.unwrap();

    let err = session.play_next().await.unwrap_err();

    assert!(matches!(err, SessionError::Rejected(_)));
    assert_eq!(session.current_index(), 0);
    assert_eq!(session.player().live_url.as_deref(), Some("http://v/1.mp4"));
    assert_eq!(session.player().launches.len(), 1);
  }

  // --- stop / reap ---

  #[tokio::test]
  async fn stop_keeps_position_and_navigation_resumes() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    session.select_episode(make_playlist(&["http://v/1.mp4", "http://v/2.mp4"]), 0).await.unwrap();

    session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.current_index(), 0);

    session.play_next().await.unwrap();
    assert_eq!(session.state(), SessionState::Playing);
    assert_eq!(session.player().live_url.as_deref(), Some("http://v/2.mp4"));
  }

  #[tokio::test]
  async fn reap_clears_live_handle() {
    let mut session = PlaybackSession::new(FakePlayer::new());
    session.select_episode(make_playlist(&["http://v/1.mp4"]), 0).await.unwrap();

    session.player_mut().exited = true;
    assert!(session.reap());

    assert!(!session.is_playing());
    assert_eq!(session.state(), SessionState::Ready);
    assert!(!session.reap());
  }

  // --- end to end through the catalog model ---

  #[tokio::test]
  async fn catalog_scenario_drama_s1_ep1() {
    let json = r#"{
      "Drama": [{
        "vod_id": 1,
        "source": "S1",
        "vod_name": "Drama",
        "play_urls": {"HD": [{"name": "EP1", "url": "http://v.example/u1.m3u8"}, {"name": "EP2", "url": "http://v.example/u2.m3u8"}]}
      }]
    }"#;
    let catalog: crate::api::Catalog = serde_json::from_str(json).unwrap();

    let sources = &catalog["Drama"];
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].source, "S1");

    let playlist = playlist_from_episodes(&sources[0].play_urls["HD"]);
    assert_eq!(playlist.len(), 2);
    assert_eq!(playlist[0].title, "EP1");
    assert_eq!(playlist[1].title, "EP2");

    let mut session = PlaybackSession::new(FakePlayer::new());
    session.select_episode(playlist, 0).await.unwrap();

    assert_eq!(session.state(), SessionState::Playing);
    assert_eq!(session.current_index(), 0);
    assert_eq!(session.player().live_url.as_deref(), Some("http://v.example/u1.m3u8"));

    session.play_next().await.unwrap();
    assert_eq!(session.current_index(), 1);
    assert_eq!(session.player().live_url.as_deref(), Some("http://v.example/u2.m3u8"));
    assert_eq!(session.current_entry().map(|e| e.title.as_str()), Some("EP2"));
  }
}
