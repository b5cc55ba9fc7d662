use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::constants;

/// How the video list pages through the catalog.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
  /// `load_more` requests `offset = loaded count` and appends.
  #[default]
  Offset,
  /// Page jumps request `(page, limit)` and replace the list.
  Page,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct Config {
  pub base_url: Option<String>,
  pub page_limit: Option<u32>,
  pub pagination: Option<PaginationMode>,
  pub request_timeout_secs: Option<u64>,
  pub log_dir: Option<PathBuf>,
}

impl Config {
  /// Load `prefs.toml` from the platform config dir, falling back to defaults.
  pub fn load() -> Self {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "vision-client") {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(config) = Self::from_path(&config_file) {
        return config;
      }
    }
    Self::default()
  }

  pub fn from_path(path: &Path) -> Result<Self> {
    let content =
      std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))
  }

  pub fn base_url(&self) -> &str {
    self.base_url.as_deref().unwrap_or(&constants().default_base_url)
  }

  pub fn page_limit(&self) -> u32 {
    self.page_limit.filter(|l| *l > 0).unwrap_or(constants().default_page_limit)
  }

  pub fn pagination(&self) -> PaginationMode {
    self.pagination.unwrap_or_default()
  }

  pub fn request_timeout(&self) -> Duration {
    self.request_timeout_secs.map(Duration::from_secs).unwrap_or_else(|| constants().request_timeout())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_come_from_constants() {
    let config = Config::default();
    assert_eq!(config.base_url(), "http://localhost:8000");
    assert_eq!(config.page_limit(), 20);
    assert_eq!(config.pagination(), PaginationMode::Offset);
    assert_eq!(config.request_timeout(), Duration::from_secs(30));
  }

  #[test]
  fn parses_toml_prefs() {
    let config: Config = toml::from_str(
      r#"
        base_url = "http://cams.local:8000"
        page_limit = 50
        pagination = "page"
      "#,
    )
    .unwrap();
    assert_eq!(config.base_url(), "http://cams.local:8000");
    assert_eq!(config.page_limit(), 50);
    assert_eq!(config.pagination(), PaginationMode::Page);
  }

  #[test]
  fn zero_page_limit_falls_back() {
    let config = Config { page_limit: Some(0), ..Config::default() };
    assert_eq!(config.page_limit(), 20);
  }

  #[test]
  fn missing_file_is_an_error() {
    let err = Config::from_path(Path::new("/nonexistent/vision-client/prefs.toml")).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read config file"));
  }
}
