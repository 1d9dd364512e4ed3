mod api;
mod app;
mod config;
mod constants;
mod input;
mod player;
mod session;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::App;
use constants::constants;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(name = "mytv", author, version = env!("CARGO_PKG_VERSION"), about = "Terminal client for a MyTV catalog backend", long_about = None)]
struct Args {
  /// Backend base URL (overrides the config file)
  #[arg(short, long)]
  backend: Option<String>,

  /// Print shell completions to stdout and exit
  #[arg(long, value_enum, value_name = "SHELL")]
  completions: Option<Shell>,
}

// --- Logging ---

/// Log to a rolling file under the platform data dir; stdout belongs to
/// the TUI. The returned guard must stay alive for the writer to flush.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let proj_dirs = ProjectDirs::from("", "", "mytv")?;
  let log_dir = proj_dirs.data_dir().join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "mytv.log"));
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mytv=info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
    return Ok(());
  }

  let _log_guard = init_logging();
  info!(version = env!("CARGO_PKG_VERSION"), "mytv starting");

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, args: Args) -> Result<()> {
  let mut app = App::new(args.backend).context("Failed to initialize")?;
  app.trigger_catalog_load();

  loop {
    app.check_pending().await?;
    app.tick();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(constants().poll_interval_ms))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.shutdown().await;
  Ok(())
}
