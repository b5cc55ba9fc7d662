//! Per-video metadata + streaming info, backed by a shared TTL cache.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, TtlCache, spawn_sweeper};
use crate::catalog::VideoCatalog;
use crate::constants::constants;
use crate::error::{CatalogError, ControllerError};
use crate::models::{StreamingInfo, VideoDetails, VideoMetadata};

pub type DetailsCache = TtlCache<CacheKey, VideoDetails>;

/// A details cache with the default TTL and its sweeper already running.
pub fn spawn_details_cache(cancel: CancellationToken) -> (Arc<DetailsCache>, JoinHandle<()>) {
  let c = constants();
  let cache = Arc::new(TtlCache::new(c.metadata_ttl()));
  let sweeper = spawn_sweeper(Arc::clone(&cache), c.cache_sweep_interval(), cancel);
  (cache, sweeper)
}

struct InFlight {
  id: u64,
  file_id: String,
  token: CancellationToken,
}

struct DetailsMessage {
  id: u64,
  result: Result<VideoDetails, ControllerError>,
}

/// Detail-panel state for the currently selected video.
pub struct MetadataCache<C: VideoCatalog> {
  catalog: Arc<C>,
  cache: Arc<DetailsCache>,
  namespace: String,
  file_id: Option<String>,
  details: Option<VideoDetails>,
  error: Option<ControllerError>,
  in_flight: Option<InFlight>,
  next_id: u64,
  tx: mpsc::UnboundedSender<DetailsMessage>,
  rx: mpsc::UnboundedReceiver<DetailsMessage>,
}

impl<C: VideoCatalog> MetadataCache<C> {
  pub fn new(catalog: Arc<C>, cache: Arc<DetailsCache>) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      catalog,
      cache,
      namespace: constants().metadata_namespace.clone(),
      file_id: None,
      details: None,
      error: None,
      in_flight: None,
      next_id: 0,
      tx,
      rx,
    }
  }

  pub fn file_id(&self) -> Option<&str> {
    self.file_id.as_deref()
  }

  pub fn details(&self) -> Option<&VideoDetails> {
    self.details.as_ref()
  }

  pub fn metadata(&self) -> Option<&VideoMetadata> {
    self.details.as_ref().map(|d| &d.metadata)
  }

  pub fn streaming_info(&self) -> Option<&StreamingInfo> {
    self.details.as_ref().map(|d| &d.streaming_info)
  }

  pub fn is_loading(&self) -> bool {
    self.in_flight.is_some()
  }

  pub fn error(&self) -> Option<&ControllerError> {
    self.error.as_ref()
  }

  fn key(&self, file_id: &str) -> CacheKey {
    CacheKey::new(&self.namespace, file_id)
  }

  /// Show details for `file_id`.
  ///
  /// A valid cache entry is applied immediately and returned without touching the network.
  /// Otherwise metadata and streaming info are requested concurrently and `None` is returned;
  /// the result lands on the next [`poll_pending`](Self::poll_pending) / [`wait_pending`](Self::wait_pending).
  pub fn fetch(&mut self, file_id: &str) -> Option<VideoDetails> {
    if self.file_id.as_deref() != Some(file_id) {
      self.details = None;
      self.error = None;
      self.file_id = Some(file_id.to_string());
    } else if self.in_flight.as_ref().is_some_and(|f| f.file_id == file_id) {
      return None;
    }

    if let Some(details) = self.cache.get(&self.key(file_id)) {
      debug!(file_id, "metadata: cache hit");
      self.cancel_in_flight();
      self.details = Some(details.clone());
      self.error = None;
      return Some(details);
    }

    self.issue(file_id.to_string());
    None
  }

  /// Evict the current video's entry and fetch it again.
  pub fn refetch(&mut self) {
    let Some(file_id) = self.file_id.clone() else { return };
    self.cache.invalidate(&self.key(&file_id));
    self.issue(file_id);
  }

  /// Force-evict one entry from the shared cache.
  pub fn invalidate(&self, file_id: &str) -> bool {
    self.cache.invalidate(&self.key(file_id))
  }

  /// Drop the selection; any in-flight request is abandoned.
  pub fn clear(&mut self) {
    self.cancel_in_flight();
    self.file_id = None;
    self.details = None;
    self.error = None;
  }

  pub fn poll_pending(&mut self) -> bool {
    let mut changed = false;
    while let Ok(msg) = self.rx.try_recv() {
      changed |= self.apply(msg);
    }
    changed
  }

  pub async fn wait_pending(&mut self) {
    while self.in_flight.is_some() {
      match self.rx.recv().await {
        Some(msg) => {
          self.apply(msg);
        }
        None => break,
      }
    }
  }

  fn cancel_in_flight(&mut self) {
    if let Some(previous) = self.in_flight.take() {
      debug!(file_id = %previous.file_id, "metadata: cancelling in-flight fetch");
      previous.token.cancel();
    }
  }

  fn issue(&mut self, file_id: String) {
    self.cancel_in_flight();
    self.next_id += 1;
    let id = self.next_id;
    let token = CancellationToken::new();
    info!(file_id = %file_id, "metadata: fetching details");

    let catalog = Arc::clone(&self.catalog);
    let tx = self.tx.clone();
    let task_token = token.clone();
    let task_file_id = file_id.clone();
    tokio::spawn(async move {
      let fetch = tokio::spawn(async move {
        let (metadata, streaming_info) = futures::try_join!(
          catalog.get_metadata(&task_file_id),
          catalog.get_streaming_info(&task_file_id)
        )?;
        Ok::<_, CatalogError>(VideoDetails { metadata, streaming_info })
      });
      let result = match fetch.await {
        Ok(Ok(details)) => Ok(details),
        Ok(Err(e)) => Err(ControllerError::fetch("Failed to fetch video metadata", e)),
        Err(e) => Err(ControllerError::unknown("Metadata task ended", e)),
      };
      if task_token.is_cancelled() {
        debug!(id, "metadata: dropping superseded response");
        return;
      }
      let _ = tx.send(DetailsMessage { id, result });
    });

    self.in_flight = Some(InFlight { id, file_id, token });
  }

  fn apply(&mut self, msg: DetailsMessage) -> bool {
    let file_id = match self.in_flight {
      Some(ref f) if f.id == msg.id && !f.token.is_cancelled() => f.file_id.clone(),
      _ => {
        debug!(id = msg.id, "metadata: discarding stale response");
        return false;
      }
    };
    self.in_flight = None;

    match msg.result {
      Ok(details) => {
        self.cache.insert(self.key(&file_id), details.clone());
        self.details = Some(details);
        self.error = None;
      }
      Err(e) => {
        warn!(file_id = %file_id, err = %e, "metadata: fetch failed");
        self.error = Some(e);
      }
    }
    true
  }
}

impl<C: VideoCatalog> Drop for MetadataCache<C> {
  fn drop(&mut self) {
    self.cancel_in_flight();
  }
}
