//! Scripted in-memory catalog for controller tests.

use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

use crate::catalog::VideoCatalog;
use crate::error::CatalogError;
use crate::models::{ListQuery, ListResponse, PageInfo, StreamingInfo, VideoMetadata, VideoRecord, VideoStatus, Window};

pub(crate) fn video(file_id: &str, camera: &str, created_secs: i64, size_bytes: u64) -> VideoRecord {
  VideoRecord {
    file_id: file_id.to_string(),
    camera_name: camera.to_string(),
    filename: format!("{}.mp4", file_id),
    size_bytes,
    format: "mp4".to_string(),
    status: VideoStatus::Completed,
    created_at: Utc.timestamp_opt(1_750_000_000 + created_secs, 0).single().unwrap_or_default(),
    is_streamable: true,
    needs_conversion: false,
  }
}

/// `count` videos for `camera`, ids `<camera>-<n>`.
pub(crate) fn library(camera: &str, count: usize) -> Vec<VideoRecord> {
  (0..count).map(|i| video(&format!("{}-{:03}", camera, i), camera, i as i64 * 60, 1000 + i as u64)).collect()
}

pub(crate) fn list_key(query: &ListQuery) -> String {
  format!("{}@{}", query.camera_name.as_deref().unwrap_or("*"), query.offset())
}

type ListGate = oneshot::Receiver<Result<ListResponse, CatalogError>>;

/// Catalog fake. Unscripted list calls are answered from `videos`; gated calls wait until the
/// test sends their response, so tests control resolution order.
#[derive(Default)]
pub(crate) struct ScriptedCatalog {
  videos: Mutex<Vec<VideoRecord>>,
  list_calls: Mutex<Vec<ListQuery>>,
  list_gates: Mutex<HashMap<String, ListGate>>,
  list_failures: Mutex<HashSet<String>>,
  metadata_calls: AtomicUsize,
  info_calls: AtomicUsize,
  detail_gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
  detail_failures: Mutex<HashSet<String>>,
}

impl ScriptedCatalog {
  pub(crate) fn with_videos(videos: Vec<VideoRecord>) -> Self {
    Self { videos: Mutex::new(videos), ..Self::default() }
  }

  /// Swap the backing library, as if recordings were added or removed server-side.
  pub(crate) fn replace_videos(&self, videos: Vec<VideoRecord>) {
    *self.videos.lock().unwrap() = videos;
  }

  pub(crate) fn gate_list(&self, key: &str) -> oneshot::Sender<Result<ListResponse, CatalogError>> {
    let (tx, rx) = oneshot::channel();
    self.list_gates.lock().unwrap().insert(key.to_string(), rx);
    tx
  }

  pub(crate) fn fail_list(&self, key: &str) {
    self.list_failures.lock().unwrap().insert(key.to_string());
  }

  pub(crate) fn heal_list(&self, key: &str) {
    self.list_failures.lock().unwrap().remove(key);
  }

  pub(crate) fn list_calls(&self) -> Vec<ListQuery> {
    self.list_calls.lock().unwrap().clone()
  }

  pub(crate) fn gate_details(&self, file_id: &str) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    self.detail_gates.lock().unwrap().insert(file_id.to_string(), rx);
    tx
  }

  pub(crate) fn fail_details(&self, file_id: &str) {
    self.detail_failures.lock().unwrap().insert(file_id.to_string());
  }

  pub(crate) fn metadata_calls(&self) -> usize {
    self.metadata_calls.load(Ordering::SeqCst)
  }

  pub(crate) fn info_calls(&self) -> usize {
    self.info_calls.load(Ordering::SeqCst)
  }

  fn answer(&self, query: &ListQuery) -> ListResponse {
    let videos = self.videos.lock().unwrap();
    let matching: Vec<&VideoRecord> =
      videos.iter().filter(|v| query.camera_name.as_ref().is_none_or(|c| &v.camera_name == c)).collect();
    let total_count = matching.len() as u64;
    let page: Vec<VideoRecord> =
      matching.into_iter().skip(query.offset() as usize).take(query.limit as usize).cloned().collect();
    let page_info = match query.window {
      Window::Page(p) => Some(PageInfo::derive(p, query.limit, total_count)),
      Window::Offset(_) => None,
    };
    ListResponse { videos: page, total_count, page: page_info }
  }
}

pub(crate) fn metadata_for(file_id: &str) -> VideoMetadata {
  VideoMetadata {
    duration_seconds: 120.0,
    width: 1920,
    height: 1080,
    fps: 30.0,
    codec: format!("h264:{}", file_id),
    aspect_ratio: 16.0 / 9.0,
  }
}

pub(crate) fn streaming_info() -> StreamingInfo {
  StreamingInfo { content_type: "video/mp4".to_string(), supports_range_requests: true, chunk_size_bytes: 262_144 }
}

impl VideoCatalog for ScriptedCatalog {
  async fn list_videos(&self, query: ListQuery) -> Result<ListResponse, CatalogError> {
    let key = list_key(&query);
    self.list_calls.lock().unwrap().push(query.clone());
    let gate = self.list_gates.lock().unwrap().remove(&key);
    if let Some(gate) = gate {
      return gate.await.unwrap_or_else(|_| Err(CatalogError::network("gate dropped")));
    }
    if self.list_failures.lock().unwrap().contains(&key) {
      return Err(CatalogError::from_status(500, br#"{"detail":"storage offline"}"#));
    }
    Ok(self.answer(&query))
  }

  async fn get_metadata(&self, file_id: &str) -> Result<VideoMetadata, CatalogError> {
    self.metadata_calls.fetch_add(1, Ordering::SeqCst);
    let gate = self.detail_gates.lock().unwrap().remove(file_id);
    if let Some(gate) = gate {
      let _ = gate.await;
    }
    if self.detail_failures.lock().unwrap().contains(file_id) {
      return Err(CatalogError::from_status(404, br#"{"detail":"Video not found"}"#));
    }
    Ok(metadata_for(file_id))
  }

  async fn get_streaming_info(&self, _file_id: &str) -> Result<StreamingInfo, CatalogError> {
    self.info_calls.fetch_add(1, Ordering::SeqCst);
    Ok(streaming_info())
  }
}
