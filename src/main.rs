mod api;
mod app;
mod cache;
mod commands;
mod config;
mod context;
mod event;
mod filter;
mod query;
mod toast;
mod ui;
mod validate;

use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::api::ApiClient;
use crate::cache::ResourceCache;
use crate::context::AppContext;
use crate::toast::ToastQueue;

#[derive(Parser, Debug)]
#[command(name = "taskdeck")]
#[command(about = "A terminal client for project and task boards")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/taskdeck/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Open this project's board instead of the project list
  #[arg(short, long)]
  project: Option<String>,
}

/// Log to a file; the terminal belongs to the UI.
///
/// Filter with `TASKDECK_LOG` (default `taskdeck=info`).
fn init_logging() -> Result<WorkerGuard> {
  let dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("taskdeck");
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::never(&dir, "taskdeck.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter =
    EnvFilter::try_from_env("TASKDECK_LOG").unwrap_or_else(|_| EnvFilter::new("taskdeck=info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging()?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override project if specified on command line
  let config = if let Some(project) = args.project {
    config::Config {
      default_project: Some(project),
      ..config
    }
  } else {
    config
  };

  let client = ApiClient::new(&config.api)?;
  let cache = ResourceCache::new(client).with_keep_unused(config.cache.keep_unused());
  let toasts = ToastQueue::new(config.toasts.duration_ms);
  let ctx = AppContext::new(cache, toasts, config);

  // Initialize and run the app
  let mut app = app::App::new(ctx);
  app.run().await?;

  Ok(())
}
