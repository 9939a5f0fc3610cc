use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub monitor: MonitorConfig,
  #[serde(default = "CollectionConfig::issue_defaults")]
  pub issues: CollectionConfig,
  #[serde(default)]
  pub comments: CollectionConfig,
  /// Drop responses overtaken by a newer intent of the same kind
  #[serde(default = "default_true")]
  pub discard_stale_responses: bool,
  /// Log filter used when ISSUEDESK_LOG is not set
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// API root, e.g. "http://localhost:8080/api/"
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
  #[serde(default = "default_poll_interval_secs")]
  pub poll_interval_secs: u64,
  /// Issue subsets shown on the dashboard, top to bottom
  #[serde(default = "default_monitor_subsets")]
  pub subsets: Vec<String>,
}

impl Default for MonitorConfig {
  fn default() -> Self {
    Self {
      poll_interval_secs: default_poll_interval_secs(),
      subsets: default_monitor_subsets(),
    }
  }
}

impl MonitorConfig {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs.max(1))
  }
}

/// Per entity type settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionConfig {
  /// Named subset -> endpoint path relative to the API root
  #[serde(default)]
  pub subsets: BTreeMap<String, String>,
}

impl CollectionConfig {
  fn issue_defaults() -> Self {
    Self {
      subsets: BTreeMap::from([
        ("open".to_string(), "openissues".to_string()),
        ("reviewed".to_string(), "reviewedissues".to_string()),
      ]),
    }
  }
}

fn default_true() -> bool {
  true
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_poll_interval_secs() -> u64 {
  10
}

fn default_monitor_subsets() -> Vec<String> {
  vec!["open".to_string(), "reviewed".to_string()]
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./issuedesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/issuedesk/config.yaml
  ///
  /// When no file is found, `url_override` alone is enough to run with
  /// defaults. An override always replaces the file's `api.url`.
  pub fn load(explicit_path: Option<&Path>, url_override: Option<&str>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match (path, url_override) {
      (Some(p), _) => Self::load_from_path(&p)?,
      (None, Some(url)) => Self::from_url(url),
      (None, None) => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/issuedesk/config.yaml\n\
                 or pass the API root with --url."
        ))
      }
    };

    if let Some(url) = url_override {
      config.api.url = url.to_string();
    }

    Ok(config)
  }

  /// Defaults for everything but the API root
  pub fn from_url(url: &str) -> Self {
    Self {
      api: ApiConfig {
        url: url.to_string(),
        timeout_secs: default_timeout_secs(),
      },
      monitor: MonitorConfig::default(),
      issues: CollectionConfig::issue_defaults(),
      comments: CollectionConfig::default(),
      discard_stale_responses: true,
      log_level: default_log_level(),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("issuedesk.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("issuedesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Directory for the log file
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;
    Ok(data_dir.join("issuedesk"))
  }

  /// Bearer token for the API, from ISSUEDESK_TOKEN if set.
  pub fn api_token() -> Option<String> {
    std::env::var("ISSUEDESK_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}
