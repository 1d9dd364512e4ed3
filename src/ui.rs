use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, List, ListItem, Padding, Paragraph, Tabs},
};

use crate::app::{App, AppMode};
use crate::player::detect_format;
use crate::session::SessionState;
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(Span::styled(" ▶ MyTV ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  if app.catalog.is_empty() {
    render_welcome(frame, app.theme(), area);
    return;
  }

  let browse_area = if app.session.state() != SessionState::Idle {
    let [browse, now] = Layout::vertical([Constraint::Min(3), Constraint::Length(6)]).areas(area);
    render_now_playing(frame, app, now);
    browse
  } else {
    area
  };

  let [categories_area, detail_area] =
    Layout::horizontal([Constraint::Percentage(28), Constraint::Percentage(72)]).areas(browse_area);

  render_categories(frame, app, categories_area);
  render_sources_panel(frame, app, detail_area);
}

fn render_welcome(frame: &mut Frame, theme: &Theme, area: Rect) {
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("▶  Welcome to MyTV", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Browse the catalog. Play episodes. In the terminal.", Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled("Press / to search, or r to reload the catalog.", Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
    Block::bordered()
      .border_type(ratatui::widgets::BorderType::Rounded)
      .border_style(Style::default().fg(theme.border)),
  );
  frame.render_widget(paragraph, area);
}

fn render_categories(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  // Area minus 2 borders minus 2 chars for the highlight symbol.
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = app
    .catalog
    .iter()
    .enumerate()
    .map(|(i, (name, sources))| {
      let is_selected = Some(i) == app.category_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };

      let count = format!("{}", sources.len());
      let name_max = inner_w.saturating_sub(count.chars().count() + 2);
      let name = truncate_str(name, name_max);
      let gap = inner_w.saturating_sub(name.chars().count() + count.chars().count());
      let line = Line::from(vec![
        Span::styled(name, Style::default().fg(fg)),
        Span::raw(" ".repeat(gap)),
        Span::styled(count, Style::default().fg(theme.muted)),
      ]);
      ListItem::new(line).bg(bg)
    })
    .collect();

  let title = match app.refreshed_at {
    Some(ts) => format!(" Categories — {} ", ts.format("%H:%M:%S")),
    None => " Categories ".to_string(),
  };
  let border_color = if app.mode == AppMode::Categories { theme.accent } else { theme.border };

  let list = List::new(items)
    .block(
      Block::bordered()
        .title(title)
        .title_style(Style::default().fg(border_color).add_modifier(Modifier::BOLD))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .border_style(Style::default().fg(border_color)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.category_state);
}

fn render_sources_panel(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();

  if app.current_sources().is_empty() {
    let block = Block::bordered()
      .title(" Sources ")
      .border_type(ratatui::widgets::BorderType::Rounded)
      .border_style(Style::default().fg(theme.border));
    let hint = Paragraph::new(Line::from(Span::styled("No sources in this category.", Style::default().fg(theme.muted))))
      .alignment(Alignment::Center)
      .block(block);
    frame.render_widget(hint, area);
    return;
  }

  let [tabs_area, detail_area, episodes_area] =
    Layout::vertical([Constraint::Length(3), Constraint::Length(4), Constraint::Min(3)]).areas(area);

  render_source_tabs(frame, app, tabs_area);
  render_source_detail(frame, app, detail_area);
  render_episodes(frame, app, episodes_area);
}

fn render_source_tabs(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let titles: Vec<Line> = app.current_sources().iter().map(|s| Line::from(s.source.clone())).collect();
  let border_color = if app.mode == AppMode::Sources { theme.accent } else { theme.border };

  let tabs = Tabs::new(titles)
    .select(app.source_index)
    .style(Style::default().fg(theme.muted))
    .highlight_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .block(
      Block::bordered()
        .title(" Sources ")
        .title_style(Style::default().fg(border_color).add_modifier(Modifier::BOLD))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .border_style(Style::default().fg(border_color)),
    );
  frame.render_widget(tabs, area);
}

fn render_source_detail(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let block = Block::bordered()
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
    .padding(Padding::horizontal(1));

  let Some(source) = app.current_source() else {
    frame.render_widget(block, area);
    return;
  };

  let inner_w = area.width.saturating_sub(4) as usize;
  let mut title_spans =
    vec![Span::styled(truncate_str(&source.vod_name, inner_w), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))];
  if !source.vod_sub.is_empty() {
    let sub_max = inner_w.saturating_sub(source.vod_name.chars().count() + 2);
    if sub_max > 1 {
      title_spans.push(Span::raw("  "));
      title_spans.push(Span::styled(truncate_str(&source.vod_sub, sub_max), Style::default().fg(theme.muted)));
    }
  }
  let mut lines = vec![Line::from(title_spans)];
  if !source.vod_content.is_empty() {
    lines.push(Line::from(Span::styled(truncate_str(&source.vod_content, inner_w), Style::default().fg(theme.muted))));
  }

  frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_episodes(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let playing_row = app.playing_row();
  // Borders plus "▶ " highlight symbol.
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = app
    .current_episodes()
    .iter()
    .enumerate()
    .map(|(i, ep)| {
      let is_selected = Some(i) == app.episode_state.selected();
      let is_playing = Some(i) == playing_row;
      let fg = if is_selected {
        theme.highlight_fg
      } else if is_playing {
        theme.accent
      } else {
        theme.fg
      };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };

      let name = if ep.name.is_empty() { format!("第{}集", i + 1) } else { ep.name.clone() };
      let marker = if is_playing { "♪ " } else { "" };
      let format = detect_format(&ep.url).label();
      let name_max = inner_w.saturating_sub(marker.chars().count() + format.len() + 2);
      let name = truncate_str(&name, name_max);
      let gap = inner_w.saturating_sub(marker.chars().count() + name.chars().count() + format.len());

      let line = Line::from(vec![
        Span::styled(marker.to_string(), Style::default().fg(fg).add_modifier(Modifier::BOLD)),
        Span::styled(name, Style::default().fg(fg)),
        Span::raw(" ".repeat(gap)),
        Span::styled(format.to_string(), Style::default().fg(theme.muted)),
      ]);
      ListItem::new(line).bg(bg)
    })
    .collect();

  let title = {
    let groups = app.group_names();
    match app.current_group_name() {
      Some(group) if groups.len() > 1 => {
        format!(" Episodes — {} [{}/{}] ", group, app.group_index + 1, groups.len())
      }
      Some(group) => format!(" Episodes — {} ", group),
      None => " Episodes ".to_string(),
    }
  };
  let border_color = if app.mode == AppMode::Episodes { theme.accent } else { theme.border };

  let list = List::new(items)
    .block(
      Block::bordered()
        .title(title)
        .title_style(Style::default().fg(border_color).add_modifier(Modifier::BOLD))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .border_style(Style::default().fg(border_color)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.episode_state);
}

fn render_now_playing(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let paused = app.session.player().paused;
  let state_label = match app.session.state() {
    SessionState::Playing if paused => "paused",
    SessionState::Playing => "playing",
    _ => "stopped",
  };
  let block_title = Line::from(vec![
    Span::styled(" Now Playing ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(format!("[{}] ", state_label), Style::default().fg(theme.muted)),
  ]);
  let block = Block::bordered()
    .title(block_title)
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
    .padding(Padding::horizontal(1));

  let Some(entry) = app.session.current_entry() else {
    frame.render_widget(block, area);
    return;
  };

  let inner_w = area.width.saturating_sub(4) as usize;
  let position = format!("Episode {}/{}", app.session.current_index() + 1, app.session.playlist().len());
  let lines = vec![
    Line::from(vec![
      Span::styled(truncate_str(&entry.title, inner_w.saturating_sub(position.len() + 2)), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD)),
      Span::raw("  "),
      Span::styled(position, Style::default().fg(theme.muted)),
    ]),
    Line::from(Span::styled(
      truncate_str(&entry.url, inner_w),
      Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED),
    )),
  ];
  frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else {
    match app.session.player().last_status() {
      Some(status) => (format!(" ♪ {}", status), Style::default().fg(theme.status)),
      None => (" Ready".to_string(), Style::default().fg(theme.muted)),
    }
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let border_color = if app.mode == AppMode::Input { theme.accent } else { theme.border };
  let input_block = Block::bordered()
    .title(" Search catalog ")
    .title_style(Style::default().fg(border_color))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.input, app.cursor_position);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if app.mode == AppMode::Input {
    let cursor_x = area.x + 2 + (cursor_col - app.input_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let is_playing = app.session.is_playing();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Input => {
      let mut k = vec![("Enter", "Search"), ("^t", "Theme")];
      if !app.catalog.is_empty() {
        k.push(("Esc", "Browse"));
      } else {
        k.push(("Esc", "Quit"));
      }
      k
    }
    AppMode::Categories => {
      let mut k = vec![("j/k", "Navigate"), ("Enter", "Sources"), ("/", "Search"), ("r", "Reload")];
      if is_playing {
        k.push(("^s", "Stop"));
      }
      k.push(("^t", "Theme"));
      k
    }
    AppMode::Sources => {
      let mut k = vec![("h/l", "Source"), ("Enter", "Episodes")];
      if is_playing {
        k.push(("^s", "Stop"));
      }
      k.push(("Esc", "Back"));
      k
    }
    AppMode::Episodes => {
      let mut k = vec![("j/k", "Navigate"), ("Enter", "Play"), ("Tab", "Group")];
      if is_playing {
        let pause_label = if app.session.player().paused { "Resume" } else { "Pause" };
        k.push(("Space", pause_label));
        k.push(("n/p", "Next/Prev"));
        k.push(("^s", "Stop"));
      }
      k.push(("Esc", "Back"));
      k
    }
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}
