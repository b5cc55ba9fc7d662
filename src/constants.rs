//! Client constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available —
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable client constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Catalog HTTP client
  pub default_base_url: String,
  pub request_timeout_secs: u64,
  pub health_path: String,

  // Video list
  pub default_page_limit: u32,

  // Metadata cache
  pub metadata_namespace: String,
  pub metadata_ttl_secs: u64,
  pub cache_sweep_interval_secs: u64,

  // Playback
  pub min_playback_rate: f64,
  pub max_playback_rate: f64,
  pub skip_step_secs: f64,
}

impl Constants {
  pub fn metadata_ttl(&self) -> Duration {
    Duration::from_secs(self.metadata_ttl_secs)
  }

  pub fn cache_sweep_interval(&self) -> Duration {
    Duration::from_secs(self.cache_sweep_interval_secs)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed client constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
