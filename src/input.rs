use anyhow::Result;
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Next selection index, wrapping past the end.
fn next_index(selected: Option<usize>, count: usize) -> usize {
  selected.map_or(0, |i| (i + 1) % count)
}

/// Previous selection index, wrapping past the start.
fn prev_index(selected: Option<usize>, count: usize) -> usize {
  selected.map_or(0, |i| if i == 0 { count - 1 } else { i - 1 })
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
    if app.session.is_playing() {
      app.stop_playback().await;
    }
    return Ok(());
  }

  // Playback keys work from every browse mode; in Input mode these
  // characters belong to the search text.
  if app.mode != AppMode::Input {
    match key.code {
      KeyCode::Char('n') => {
        app.play_next().await;
        return Ok(());
      }
      KeyCode::Char('p') => {
        app.play_previous().await;
        return Ok(());
      }
      KeyCode::Char(' ') => {
        app.toggle_pause().await;
        return Ok(());
      }
      KeyCode::Char('/') => {
        app.mode = AppMode::Input;
        return Ok(());
      }
      _ => {}
    }
  }

  match app.mode {
    AppMode::Input => handle_input_key(app, key),
    AppMode::Categories => handle_categories_key(app, key),
    AppMode::Sources => handle_sources_key(app, key),
    AppMode::Episodes => handle_episodes_key(app, key).await,
  }
  Ok(())
}

fn handle_input_key(app: &mut App, key: event::KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Enter => {
      app.trigger_search();
    }
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    KeyCode::Esc => {
      if !app.input.is_empty() {
        app.input.clear();
        app.cursor_position = 0;
        app.input_scroll = 0;
      } else if !app.catalog.is_empty() {
        app.mode = AppMode::Categories;
      } else {
        app.should_quit = true;
      }
    }
    KeyCode::Down => {
      if !app.catalog.is_empty() {
        app.mode = AppMode::Categories;
      }
    }
    _ => {}
  }
}

fn handle_categories_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => {
      let count = app.catalog.len();
      if count > 0 {
        let i = next_index(app.category_state.selected(), count);
        app.category_state.select(Some(i));
        app.reset_browse_position();
      }
    }
    KeyCode::Up | KeyCode::Char('k') => {
      let count = app.catalog.len();
      if count > 0 {
        let i = prev_index(app.category_state.selected(), count);
        app.category_state.select(Some(i));
        app.reset_browse_position();
      }
    }
    KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
      if !app.current_sources().is_empty() {
        app.mode = AppMode::Sources;
      }
    }
    KeyCode::Char('r') => {
      app.trigger_catalog_load();
    }
    KeyCode::Esc => {
      app.mode = AppMode::Input;
    }
    _ => {}
  }
}

fn handle_sources_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Right | KeyCode::Char('l') | KeyCode::Tab => {
      let count = app.current_sources().len();
      if count > 0 {
        app.source_index = (app.source_index + 1) % count;
        app.group_index = 0;
        app.reset_episode_selection();
      }
    }
    KeyCode::Left | KeyCode::Char('h') | KeyCode::BackTab => {
      let count = app.current_sources().len();
      if count > 0 {
        app.source_index = if app.source_index == 0 { count - 1 } else { app.source_index - 1 };
        app.group_index = 0;
        app.reset_episode_selection();
      }
    }
    KeyCode::Enter | KeyCode::Down | KeyCode::Char('j') => {
      if !app.current_episodes().is_empty() {
        if app.episode_state.selected().is_none() {
          app.episode_state.select(Some(0));
        }
        app.mode = AppMode::Episodes;
      }
    }
    KeyCode::Esc => {
      app.mode = AppMode::Categories;
    }
    _ => {}
  }
}

async fn handle_episodes_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      app.play_selected().await;
    }
    KeyCode::Down | KeyCode::Char('j') => {
      let count = app.current_episodes().len();
      if count > 0 {
        let i = next_index(app.episode_state.selected(), count);
        app.episode_state.select(Some(i));
      }
    }
    KeyCode::Up | KeyCode::Char('k') => {
      let count = app.current_episodes().len();
      if count > 0 {
        let i = prev_index(app.episode_state.selected(), count);
        app.episode_state.select(Some(i));
      }
    }
    KeyCode::Tab | KeyCode::Char('g') => {
      let count = app.group_names().len();
      if count > 0 {
        app.group_index = (app.group_index + 1) % count;
        app.reset_episode_selection();
      }
    }
    KeyCode::BackTab => {
      let count = app.group_names().len();
      if count > 0 {
        app.group_index = if app.group_index == 0 { count - 1 } else { app.group_index - 1 };
        app.reset_episode_selection();
      }
    }
    KeyCode::Esc | KeyCode::Left | KeyCode::Char('h') => {
      app.mode = AppMode::Sources;
    }
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- char_to_byte_index ---

  #[test]
  fn char_to_byte_ascii() {
    assert_eq!(char_to_byte_index("hello", 0), 0);
    assert_eq!(char_to_byte_index("hello", 3), 3);
    assert_eq!(char_to_byte_index("hello", 5), 5); // past end
  }

  #[test]
  fn char_to_byte_multibyte() {
    let s = "a第集"; // a=1 byte, CJK=3 bytes each
    assert_eq!(char_to_byte_index(s, 0), 0);
    assert_eq!(char_to_byte_index(s, 1), 1);
    assert_eq!(char_to_byte_index(s, 2), 4);
    assert_eq!(char_to_byte_index(s, 3), 7); // past end
  }

  #[test]
  fn char_to_byte_empty() {
    assert_eq!(char_to_byte_index("", 0), 0);
    assert_eq!(char_to_byte_index("", 5), 0);
  }

  // --- wrap helpers ---

  #[test]
  fn next_index_wraps() {
    assert_eq!(next_index(None, 3), 0);
    assert_eq!(next_index(Some(0), 3), 1);
    assert_eq!(next_index(Some(2), 3), 0);
  }

  #[test]
  fn prev_index_wraps() {
    assert_eq!(prev_index(None, 3), 0);
    assert_eq!(prev_index(Some(0), 3), 2);
    assert_eq!(prev_index(Some(2), 3), 1);
  }
}
