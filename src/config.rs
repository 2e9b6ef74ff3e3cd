use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  /// Project whose board opens on startup
  pub default_project: Option<String>,
  pub toasts: ToastConfig,
  pub cache: CacheConfig,
  pub board: BoardConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL of the service, including the `/api` prefix
  pub url: String,
  /// Email used for automatic sign-in (password comes from the environment)
  pub email: Option<String>,
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: DEFAULT_API_URL.to_string(),
      email: None,
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToastConfig {
  /// Lifetime of a toast; zero or negative keeps toasts until dismissed
  pub duration_ms: i64,
}

impl Default for ToastConfig {
  fn default() -> Self {
    Self { duration_ms: 5000 }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// How long data nobody is looking at is reused before refetching
  pub keep_unused_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      keep_unused_secs: 60,
    }
  }
}

impl CacheConfig {
  pub fn keep_unused(&self) -> Duration {
    Duration::from_secs(self.keep_unused_secs)
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BoardMode {
  /// One row per task
  #[default]
  List,
  /// One column per status
  Kanban,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
  pub default_mode: BoardMode,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./taskdeck.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/taskdeck/config.yaml
  ///
  /// Without a file the defaults apply. `TASKDECK_API_URL` overrides the
  /// API url in every case.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Ok(url) = std::env::var("TASKDECK_API_URL") {
      if !url.trim().is_empty() {
        config.api.url = url;
      }
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("taskdeck.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("taskdeck").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> serde_yaml::Result<Self> {
    // An empty file is a valid, all-defaults config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Get the account password from the environment.
  ///
  /// Checks TASKDECK_PASSWORD.
  pub fn get_password() -> Option<String> {
    std::env::var("TASKDECK_PASSWORD")
      .ok()
      .filter(|p| !p.is_empty())
  }

  /// Text shown in the header
  pub fn header_title(&self) -> String {
    self.title.clone().unwrap_or_else(|| {
      self
        .api
        .url
        .strip_prefix("https://")
        .or_else(|| self.api.url.strip_prefix("http://"))
        .unwrap_or(&self.api.url)
        .split('/')
        .next()
        .unwrap_or(&self.api.url)
        .to_string()
    })
  }
}
