//! Wire and domain types shared by the catalog client and the controllers.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Processing state of a recording on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
  Completed,
  Processing,
  Failed,
}

/// One recording from the catalog. Read-only on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
  pub file_id: String,
  pub camera_name: String,
  pub filename: String,
  #[serde(rename = "file_size_bytes", alias = "size_bytes")]
  pub size_bytes: u64,
  pub format: String,
  pub status: VideoStatus,
  #[serde(deserialize_with = "deserialize_timestamp")]
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub is_streamable: bool,
  #[serde(default)]
  pub needs_conversion: bool,
}

/// Technical metadata for one recording, fetched lazily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
  pub duration_seconds: f64,
  pub width: u32,
  pub height: u32,
  pub fps: f64,
  pub codec: String,
  pub aspect_ratio: f64,
}

/// How the stream endpoint serves a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingInfo {
  pub content_type: String,
  pub supports_range_requests: bool,
  pub chunk_size_bytes: u64,
}

/// Metadata and streaming info for one recording, cached together.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDetails {
  pub metadata: VideoMetadata,
  pub streaming_info: StreamingInfo,
}

/// Inclusive creation-time window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
  pub start: Option<DateTime<Utc>>,
  pub end: Option<DateTime<Utc>>,
}

/// Which slice of the catalog a list query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
  /// Raw offset; no page metadata is derived.
  Offset(u64),
  /// 1-based page; the client converts to an offset and derives page metadata.
  Page(u32),
}

/// Parameters of one list fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
  pub camera_name: Option<String>,
  pub date_range: Option<DateRange>,
  pub limit: u32,
  pub window: Window,
  pub include_metadata: bool,
}

impl ListQuery {
  pub fn new(limit: u32, window: Window) -> Self {
    Self { camera_name: None, date_range: None, limit, window, include_metadata: false }
  }

  /// Offset sent on the wire: `(page - 1) * limit` for page windows.
  pub fn offset(&self) -> u64 {
    match self.window {
      Window::Offset(offset) => offset,
      Window::Page(page) => u64::from(page.max(1) - 1) * u64::from(self.limit),
    }
  }
}

/// Page metadata derived from `total_count` for page-based queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
  pub page: u32,
  pub total_pages: u32,
  pub has_next: bool,
  pub has_previous: bool,
}

impl PageInfo {
  /// `total_pages = ceil(total_count / limit)`, `has_next = page < total_pages`, `has_previous = page > 1`.
  pub fn derive(page: u32, limit: u32, total_count: u64) -> Self {
    let page = page.max(1);
    let total_pages =
      if limit == 0 { 0 } else { u32::try_from(total_count.div_ceil(u64::from(limit))).unwrap_or(u32::MAX) };
    PageInfo { page, total_pages, has_next: page < total_pages, has_previous: page > 1 }
  }
}

/// Raw body of `GET /videos/`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VideoListBody {
  pub videos: Vec<VideoRecord>,
  pub total_count: u64,
}

/// Raw body of `GET /videos/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VideoInfoBody {
  #[allow(dead_code)]
  pub file_id: String,
  pub metadata: Option<VideoMetadata>,
}

/// Result of a list fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ListResponse {
  pub videos: Vec<VideoRecord>,
  pub total_count: u64,
  /// Present only when the query used [`Window::Page`].
  pub page: Option<PageInfo>,
}

impl ListResponse {
  pub(crate) fn from_body(body: VideoListBody, query: &ListQuery) -> Self {
    let page = match query.window {
      Window::Page(page) => Some(PageInfo::derive(page, query.limit, body.total_count)),
      Window::Offset(_) => None,
    };
    ListResponse { videos: body.videos, total_count: body.total_count, page }
  }
}

/// Accept RFC 3339 or naive ISO-8601 (treated as UTC); the backend emits both.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = String::deserialize(deserializer)?;
  parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.with_timezone(&Utc));
  }
  ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    .map(|naive| naive.and_utc())
}
