use anyhow::Result;
use chrono::{DateTime, Local};
use ratatui::crossterm::{ExecutableCommand, terminal::SetTitle};
use ratatui::widgets::ListState;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::api::{Catalog, CatalogClient, Episode, VideoSource};
use crate::config::Config;
use crate::constants::constants;
use crate::player::MpvPlayer;
use crate::session::{PlaybackSession, playlist_from_episodes};
use crate::theme::THEMES;

// --- Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Input,
  Categories,
  Sources,
  Episodes,
}

/// Where the live playlist came from, so the episode list can show the
/// playing marker only when the user is looking at that same group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayingOrigin {
  pub category: String,
  pub source: String,
  pub group: String,
}

/// In-flight async task receivers.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) catalog_rx: Option<oneshot::Receiver<Result<Catalog>>>,
  pub(crate) search_rx: Option<oneshot::Receiver<Result<()>>>,
}

pub struct App {
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub mode: AppMode,
  pub theme_index: usize,
  pub catalog: Catalog,
  pub refreshed_at: Option<DateTime<Local>>,
  pub category_state: ListState,
  pub source_index: usize,
  pub group_index: usize,
  pub episode_state: ListState,
  pub session: PlaybackSession<MpvPlayer>,
  pub playing_origin: Option<PlayingOrigin>,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  pub should_quit: bool,
  client: CatalogClient,
  config: Config,
  pub(crate) tasks: AsyncTasks,
  /// When the last error was set, for auto-dismiss.
  error_time: Option<Instant>,
}

impl App {
  pub fn new(backend_override: Option<String>) -> Result<Self> {
    let config = Config::load();
    let theme_index =
      if let Some(ref name) = config.theme_name { THEMES.iter().position(|t| t.name == name).unwrap_or(0) } else { 0 };
    let backend = backend_override
      .or_else(|| config.backend_url.clone())
      .unwrap_or_else(|| constants().backend_url.clone());
    let client = CatalogClient::new(&backend)?;

    Ok(Self {
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      mode: AppMode::Categories,
      theme_index,
      catalog: Catalog::new(),
      refreshed_at: None,
      category_state: ListState::default(),
      source_index: 0,
      group_index: 0,
      episode_state: ListState::default(),
      session: PlaybackSession::new(MpvPlayer::new()),
      playing_origin: None,
      last_error: None,
      status_message: None,
      should_quit: false,
      client,
      config,
      tasks: AsyncTasks::default(),
      error_time: None,
    })
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    // Safety: theme_index is always bounded by modular arithmetic in next_theme()
    // and clamped to THEMES.len() - 1 on initialization.
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.save();
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  /// Clear the current error message and its expiry timer.
  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after the configured dismiss interval.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_dismiss_secs)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  // --- Catalog navigation ---

  pub fn current_category_name(&self) -> Option<&str> {
    let idx = self.category_state.selected()?;
    self.catalog.keys().nth(idx).map(String::as_str)
  }

  pub fn current_sources(&self) -> &[VideoSource] {
    self
      .category_state
      .selected()
      .and_then(|idx| self.catalog.values().nth(idx))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  pub fn current_source(&self) -> Option<&VideoSource> {
    self.current_sources().get(self.source_index)
  }

  pub fn group_names(&self) -> Vec<&str> {
    self.current_source().map(|s| s.play_urls.keys().map(String::as_str).collect()).unwrap_or_default()
  }

  pub fn current_group_name(&self) -> Option<&str> {
    self.current_source().and_then(|s| s.play_urls.keys().nth(self.group_index)).map(String::as_str)
  }

  pub fn current_episodes(&self) -> &[Episode] {
    self
      .current_source()
      .and_then(|s| s.play_urls.values().nth(self.group_index))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// Called after the selected category or source changes; deeper
  /// selections are stale and start over.
  pub fn reset_browse_position(&mut self) {
    self.source_index = 0;
    self.group_index = 0;
    self.reset_episode_selection();
  }

  pub fn reset_episode_selection(&mut self) {
    if self.current_episodes().is_empty() {
      self.episode_state.select(None);
    } else {
      self.episode_state.select(Some(0));
    }
  }

  /// Clamp every selection level against a freshly loaded catalog.
  fn clamp_catalog_selection(&mut self) {
    if self.catalog.is_empty() {
      self.category_state.select(None);
      self.source_index = 0;
      self.group_index = 0;
      self.episode_state.select(None);
      return;
    }
    let sel = self.category_state.selected().unwrap_or(0).min(self.catalog.len() - 1);
    self.category_state.select(Some(sel));
    if self.source_index >= self.current_sources().len() {
      self.source_index = 0;
    }
    if self.group_index >= self.group_names().len() {
      self.group_index = 0;
    }
    let count = self.current_episodes().len();
    if count == 0 {
      self.episode_state.select(None);
    } else {
      let sel = self.episode_state.selected().unwrap_or(0).min(count - 1);
      self.episode_state.select(Some(sel));
    }
  }

  /// Row to mark as playing in the episode list, only when the list being
  /// viewed is the group the live playlist was built from.
  pub fn playing_row(&self) -> Option<usize> {
    if !self.session.is_playing() {
      return None;
    }
    let origin = self.playing_origin.as_ref()?;
    if self.current_category_name()? != origin.category {
      return None;
    }
    if self.current_source()?.source != origin.source {
      return None;
    }
    if self.current_group_name()? != origin.group {
      return None;
    }
    Some(self.session.current_index())
  }

  /// Keep the episode highlight on the playing entry after navigation.
  fn sync_episode_highlight(&mut self) {
    if let Some(row) = self.playing_row() {
      self.episode_state.select(Some(row));
    }
  }

  // --- Playback ---

  /// Build a fresh playlist from the viewed episode group and start
  /// playback at the highlighted entry.
  pub async fn play_selected(&mut self) {
    let Some(selected) = self.episode_state.selected() else { return };
    let Some(category) = self.current_category_name().map(str::to_string) else { return };
    let Some(source) = self.current_source().map(|s| s.source.clone()) else { return };
    let Some(group) = self.current_group_name().map(str::to_string) else { return };
    let playlist = playlist_from_episodes(self.current_episodes());
    if selected >= playlist.len() {
      return;
    }

    match self.session.select_episode(playlist, selected).await {
      Ok(()) => {
        self.clear_error();
        info!(category = %category, source = %source, group = %group, index = selected, "playback started");
        self.playing_origin = Some(PlayingOrigin { category, source, group });
      }
      Err(e) => {
        self.set_error(format!("Playback failed: {}", e));
        if !self.session.is_playing() {
          self.playing_origin = None;
        }
      }
    }
    self.update_title();
  }

  pub async fn play_next(&mut self) {
    if let Err(e) = self.session.play_next().await {
      self.set_error(format!("Playback failed: {}", e));
    }
    self.sync_episode_highlight();
    self.update_title();
  }

  pub async fn play_previous(&mut self) {
    if let Err(e) = self.session.play_previous().await {
      self.set_error(format!("Playback failed: {}", e));
    }
    self.sync_episode_highlight();
    self.update_title();
  }

  pub async fn toggle_pause(&mut self) {
    if self.session.is_playing()
      && let Err(e) = self.session.player_mut().toggle_pause().await
    {
      self.set_error(format!("Pause error: {}", e));
    }
  }

  pub async fn stop_playback(&mut self) {
    if let Err(e) = self.session.stop().await {
      self.set_error(format!("Failed to stop playback: {}", e));
    }
    self.playing_origin = None;
    self.update_title();
  }

  /// Terminal title mirrors the playing episode; plain app title at rest.
  fn update_title(&self) {
    let title = match self.session.current_entry() {
      Some(entry) if self.session.is_playing() => format!("{} - {}", constants().app_title, entry.title),
      _ => constants().app_title.clone(),
    };
    let _ = std::io::stdout().execute(SetTitle(title));
  }

  /// Per-frame housekeeping: reap an mpv that exited on its own, drain
  /// its status lines, expire stale errors.
  pub fn tick(&mut self) {
    if self.session.reap() {
      self.playing_origin = None;
      self.update_title();
    }
    self.session.player_mut().check_status();
    self.expire_error();
  }

  pub async fn shutdown(&mut self) {
    if let Err(e) = self.session.stop().await {
      warn!(err = %e, "failed to stop playback on exit");
    }
    self.playing_origin = None;
    self.update_title();
  }

  // --- Async tasks ---

  pub fn trigger_catalog_load(&mut self) {
    if self.tasks.catalog_rx.is_some() {
      return;
    }
    self.status_message = Some("Loading catalog…".to_string());

    let client = self.client.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(client.fetch_catalog().await);
    });
    self.tasks.catalog_rx = Some(rx);
  }

  pub fn trigger_search(&mut self) {
    let keyword = self.input.trim().to_string();
    if keyword.is_empty() {
      self.set_error("Enter a search keyword.".to_string());
      return;
    }
    info!(keyword = %keyword, "search triggered");
    self.tasks.search_rx = None;
    self.clear_error();
    self.status_message = Some(format!("Searching '{}'…", keyword));

    let client = self.client.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(client.search(&keyword).await);
    });
    self.tasks.search_rx = Some(rx);
  }

  pub async fn check_pending(&mut self) -> Result<()> {
    if let Some(mut rx) = self.tasks.catalog_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.status_message = None;
          match result {
            Ok(catalog) => {
              info!(categories = catalog.len(), "catalog loaded");
              self.catalog = catalog;
              self.refreshed_at = Some(Local::now());
              self.clamp_catalog_selection();
              if self.catalog.is_empty() {
                self.set_error("The catalog is empty. Try a search.".to_string());
              }
            }
            Err(e) => {
              self.set_error(format!("Catalog load failed: {:#}", e));
            }
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.catalog_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.set_error("Catalog task failed.".to_string());
        }
      }
    }

    if let Some(mut rx) = self.tasks.search_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.status_message = None;
          match result {
            Ok(()) => {
              // The backend rebuilt its catalog from the search; fetch it.
              self.mode = AppMode::Categories;
              self.trigger_catalog_load();
            }
            Err(e) => {
              self.set_error(format!("Search failed: {:#}", e));
            }
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.search_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.set_error("Search task failed.".to_string());
        }
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_catalog() -> Catalog {
    serde_json::from_str(
      r#"{
        "Drama": [
          {
            "vod_id": 1,
            "source": "S1",
            "vod_name": "Drama",
            "play_urls": {
              "HD": [{"name": "EP1", "url": "http://v/u1.m3u8"}, {"name": "EP2", "url": "http://v/u2.m3u8"}],
              "SD": [{"name": "EP1", "url": "http://v/sd1.mp4"}]
            }
          },
          {"vod_id": 2, "source": "S2", "vod_name": "Drama", "play_urls": {}}
        ],
        "Anime": [
          {"vod_id": 3, "source": "S1", "vod_name": "Anime", "play_urls": {"HD": [{"name": "", "url": "http://v/a1.mp4"}]}}
        ]
      }"#,
    )
    .unwrap()
  }

  fn test_app() -> App {
    let mut app = App::new(Some("http://localhost:8080".to_string())).unwrap();
    app.catalog = sample_catalog();
    app.category_state.select(Some(0));
    app.reset_browse_position();
    app
  }

  // --- blank search ---

  #[tokio::test]
  async fn blank_search_is_rejected_before_any_request() {
    let mut app = App::new(Some("http://localhost:8080".to_string())).unwrap();
    app.input = "   ".to_string();

    app.trigger_search();

    assert!(app.tasks.search_rx.is_none());
    assert_eq!(app.last_error.as_deref(), Some("Enter a search keyword."));
  }

  // --- navigation mapping ---

  #[tokio::test]
  async fn categories_iterate_sorted_and_map_to_sources() {
    let app = test_app();
    // BTreeMap order: Anime before Drama.
    assert_eq!(app.current_category_name(), Some("Anime"));
    assert_eq!(app.current_sources().len(), 1);
    assert_eq!(app.current_source().map(|s| s.source.as_str()), Some("S1"));
  }

  #[tokio::test]
  async fn group_and_episode_accessors_follow_indices() {
    let mut app = test_app();
    app.category_state.select(Some(1)); // Drama
    app.reset_browse_position();

    assert_eq!(app.current_category_name(), Some("Drama"));
    assert_eq!(app.group_names(), ["HD", "SD"]);
    assert_eq!(app.current_group_name(), Some("HD"));
    assert_eq!(app.current_episodes().len(), 2);

    app.group_index = 1;
    assert_eq!(app.current_group_name(), Some("SD"));
    assert_eq!(app.current_episodes().len(), 1);
  }

  #[tokio::test]
  async fn reset_browse_position_selects_first_episode() {
    let mut app = test_app();
    app.category_state.select(Some(1)); // Drama, S1/HD has episodes
    app.reset_browse_position();
    assert_eq!(app.episode_state.selected(), Some(0));

    app.source_index = 1; // S2 has no play groups
    app.group_index = 0;
    app.reset_episode_selection();
    assert_eq!(app.episode_state.selected(), None);
  }

  #[tokio::test]
  async fn clamp_survives_catalog_shrinking() {
    let mut app = test_app();
    app.category_state.select(Some(1));
    app.source_index = 1;
    app.group_index = 5;
    app.episode_state.select(Some(9));

    app.catalog = serde_json::from_str(
      r#"{"Anime": [{"source": "S1", "play_urls": {"HD": [{"name": "EP1", "url": "http://v/a1.mp4"}]}}]}"#,
    )
    .unwrap();
    app.clamp_catalog_selection();

    assert_eq!(app.category_state.selected(), Some(0));
    assert_eq!(app.source_index, 0);
    assert_eq!(app.group_index, 0);
    assert_eq!(app.episode_state.selected(), Some(0));
  }

  #[tokio::test]
  async fn clamp_empty_catalog_clears_selection() {
    let mut app = test_app();
    app.catalog = Catalog::new();
    app.clamp_catalog_selection();
    assert_eq!(app.category_state.selected(), None);
    assert_eq!(app.episode_state.selected(), None);
  }

  // --- playing marker ---

  #[tokio::test]
  async fn playing_row_is_none_without_live_player() {
    let mut app = test_app();
    app.playing_origin = Some(PlayingOrigin {
      category: "Anime".to_string(),
      source: "S1".to_string(),
      group: "HD".to_string(),
    });
    // No mpv was ever launched, so nothing is live.
    assert_eq!(app.playing_row(), None);
  }

  #[tokio::test]
  async fn playing_row_is_none_when_viewing_another_group() {
    let mut app = test_app();
    app.playing_origin = Some(PlayingOrigin {
      category: "Drama".to_string(),
      source: "S1".to_string(),
      group: "HD".to_string(),
    });
    // Viewing Anime while the origin says Drama.
    assert_eq!(app.current_category_name(), Some("Anime"));
    assert_eq!(app.playing_row(), None);
  }
}
