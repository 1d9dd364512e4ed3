use ratatui::style::Color;

/// A named UI color palette. Cycled with Ctrl+T and persisted in prefs.toml.
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub status: Color,
  pub error: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub const THEMES: [Theme; 4] = [
  Theme {
    name: "pastel",
    bg: Color::Rgb(0x28, 0x2a, 0x36),
    fg: Color::Rgb(0xe6, 0xe6, 0xf0),
    accent: Color::Rgb(0xff, 0xb3, 0xc1),
    muted: Color::Rgb(0x8a, 0x8d, 0xa3),
    border: Color::Rgb(0x44, 0x47, 0x5a),
    status: Color::Rgb(0xa3, 0xe6, 0xcb),
    error: Color::Rgb(0xff, 0x8a, 0x8a),
    highlight_fg: Color::Rgb(0x28, 0x2a, 0x36),
    highlight_bg: Color::Rgb(0xff, 0xb3, 0xc1),
    stripe_bg: Color::Rgb(0x2e, 0x30, 0x3e),
    key_fg: Color::Rgb(0x28, 0x2a, 0x36),
    key_bg: Color::Rgb(0x8a, 0x8d, 0xa3),
  },
  Theme {
    name: "ink",
    bg: Color::Rgb(0x10, 0x12, 0x16),
    fg: Color::Rgb(0xd4, 0xd4, 0xd8),
    accent: Color::Rgb(0x7a, 0xa2, 0xf7),
    muted: Color::Rgb(0x56, 0x5f, 0x72),
    border: Color::Rgb(0x2a, 0x2e, 0x3a),
    status: Color::Rgb(0x9e, 0xce, 0x6a),
    error: Color::Rgb(0xf7, 0x76, 0x8e),
    highlight_fg: Color::Rgb(0x10, 0x12, 0x16),
    highlight_bg: Color::Rgb(0x7a, 0xa2, 0xf7),
    stripe_bg: Color::Rgb(0x16, 0x18, 0x20),
    key_fg: Color::Rgb(0x10, 0x12, 0x16),
    key_bg: Color::Rgb(0x56, 0x5f, 0x72),
  },
  Theme {
    name: "paper",
    bg: Color::Rgb(0xfa, 0xf6, 0xee),
    fg: Color::Rgb(0x3a, 0x38, 0x32),
    accent: Color::Rgb(0xc0, 0x5b, 0x4d),
    muted: Color::Rgb(0x9a, 0x94, 0x86),
    border: Color::Rgb(0xd8, 0xd2, 0xc4),
    status: Color::Rgb(0x5a, 0x8a, 0x5a),
    error: Color::Rgb(0xb0, 0x3a, 0x2e),
    highlight_fg: Color::Rgb(0xfa, 0xf6, 0xee),
    highlight_bg: Color::Rgb(0xc0, 0x5b, 0x4d),
    stripe_bg: Color::Rgb(0xf1, 0xec, 0xe1),
    key_fg: Color::Rgb(0xfa, 0xf6, 0xee),
    key_bg: Color::Rgb(0x9a, 0x94, 0x86),
  },
  Theme {
    name: "mint",
    bg: Color::Rgb(0x1b, 0x26, 0x22),
    fg: Color::Rgb(0xd9, 0xe8, 0xdf),
    accent: Color::Rgb(0x6f, 0xd6, 0xa8),
    muted: Color::Rgb(0x6e, 0x82, 0x78),
    border: Color::Rgb(0x33, 0x44, 0x3c),
    status: Color::Rgb(0x6f, 0xd6, 0xa8),
    error: Color::Rgb(0xe8, 0x8a, 0x7a),
    highlight_fg: Color::Rgb(0x1b, 0x26, 0x22),
    highlight_bg: Color::Rgb(0x6f, 0xd6, 0xa8),
    stripe_bg: Color::Rgb(0x20, 0x2d, 0x28),
    key_fg: Color::Rgb(0x1b, 0x26, 0x22),
    key_bg: Color::Rgb(0x6e, 0x82, 0x78),
  },
];
