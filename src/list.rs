//! Queryable video list: pagination, filter-driven refetch, request supersession and
//! client-side sort over the loaded window.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::VideoCatalog;
use crate::config::{Config, PaginationMode};
use crate::error::ControllerError;
use crate::models::{DateRange, ListQuery, ListResponse, PageInfo, VideoRecord, Window};

/// Server-side filters. Changing them always restarts from the first page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoFilters {
  pub camera_name: Option<String>,
  pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
  CreatedAt,
  Size,
  CameraName,
  Filename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
  Ascending,
  Descending,
}

/// Client-side ordering.
///
/// The backend has no ordering parameter, so a sort only ranks what has been paged in so far.
/// Rows not yet loaded are not considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
  pub field: SortField,
  pub direction: SortDirection,
}

impl SortOrder {
  pub fn new(field: SortField, direction: SortDirection) -> Self {
    Self { field, direction }
  }

  pub fn compare(&self, a: &VideoRecord, b: &VideoRecord) -> Ordering {
    let ord = match self.field {
      SortField::CreatedAt => a.created_at.cmp(&b.created_at),
      SortField::Size => a.size_bytes.cmp(&b.size_bytes),
      SortField::CameraName => a.camera_name.cmp(&b.camera_name),
      SortField::Filename => a.filename.cmp(&b.filename),
    };
    match self.direction {
      SortDirection::Ascending => ord,
      SortDirection::Descending => ord.reverse(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
  Idle,
  Loading,
  Success,
  Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
  Replace,
  Append,
}

struct InFlight {
  id: u64,
  token: CancellationToken,
  merge: Merge,
}

struct ListMessage {
  id: u64,
  result: Result<ListResponse, ControllerError>,
}

pub struct ListController<C: VideoCatalog> {
  catalog: Arc<C>,
  pagination: PaginationMode,
  limit: u32,
  include_metadata: bool,
  filters: VideoFilters,
  sort: Option<SortOrder>,
  /// Rows in arrival order.
  loaded: Vec<VideoRecord>,
  /// Indices into `loaded` in display order.
  order: Vec<usize>,
  total_count: u64,
  page_info: Option<PageInfo>,
  has_more: bool,
  status: ListStatus,
  error: Option<ControllerError>,
  mounted: bool,
  in_flight: Option<InFlight>,
  next_id: u64,
  tx: mpsc::UnboundedSender<ListMessage>,
  rx: mpsc::UnboundedReceiver<ListMessage>,
}

impl<C: VideoCatalog> ListController<C> {
  pub fn new(catalog: Arc<C>, pagination: PaginationMode, limit: u32) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      catalog,
      pagination,
      limit: limit.max(1),
      include_metadata: false,
      filters: VideoFilters::default(),
      sort: None,
      loaded: Vec::new(),
      order: Vec::new(),
      total_count: 0,
      page_info: None,
      has_more: false,
      status: ListStatus::Idle,
      error: None,
      mounted: false,
      in_flight: None,
      next_id: 0,
      tx,
      rx,
    }
  }

  pub fn from_config(catalog: Arc<C>, config: &Config) -> Self {
    Self::new(catalog, config.pagination(), config.page_limit())
  }

  /// Ask the backend to embed metadata in list rows.
  pub fn with_metadata(mut self, include: bool) -> Self {
    self.include_metadata = include;
    self
  }

  // --- Accessors ---

  /// Loaded rows in display order (sorted if a sort is set).
  pub fn videos(&self) -> impl Iterator<Item = &VideoRecord> + '_ {
    self.order.iter().filter_map(|&i| self.loaded.get(i))
  }

  pub fn len(&self) -> usize {
    self.loaded.len()
  }

  pub fn is_empty(&self) -> bool {
    self.loaded.is_empty()
  }

  pub fn total_count(&self) -> u64 {
    self.total_count
  }

  pub fn is_loading(&self) -> bool {
    self.in_flight.is_some()
  }

  pub fn status(&self) -> ListStatus {
    self.status
  }

  pub fn error(&self) -> Option<&ControllerError> {
    self.error.as_ref()
  }

  pub fn has_more(&self) -> bool {
    self.has_more
  }

  pub fn page_info(&self) -> Option<PageInfo> {
    self.page_info
  }

  pub fn current_page(&self) -> u32 {
    self.page_info.map_or(1, |p| p.page)
  }

  pub fn filters(&self) -> &VideoFilters {
    &self.filters
  }

  pub fn sort(&self) -> Option<SortOrder> {
    self.sort
  }

  // --- Triggers ---

  /// Initial fetch. Only the first call does anything.
  pub fn mount(&mut self) {
    if self.mounted {
      return;
    }
    self.mounted = true;
    self.issue(self.first_window(), Merge::Replace);
  }

  /// Reload: offset mode restarts from the top, page mode reloads the current page.
  pub fn refetch(&mut self) {
    self.mounted = true;
    let window = match self.pagination {
      PaginationMode::Offset => Window::Offset(0),
      PaginationMode::Page => Window::Page(self.current_page()),
    };
    self.issue(window, Merge::Replace);
  }

  /// Next slice: append in offset mode, next page in page mode.
  /// No-op while a fetch is in flight or when nothing more is available.
  pub fn load_more(&mut self) {
    if self.in_flight.is_some() || !self.has_more {
      return;
    }
    match self.pagination {
      PaginationMode::Offset => self.issue(Window::Offset(self.loaded.len() as u64), Merge::Append),
      PaginationMode::Page => self.issue(Window::Page(self.current_page() + 1), Merge::Replace),
    }
  }

  /// Jump to a 1-based page. Only meaningful in page mode.
  pub fn go_to_page(&mut self, page: u32) {
    if self.pagination != PaginationMode::Page {
      warn!(page, "list: page jump ignored in offset mode");
      return;
    }
    self.issue(Window::Page(page.max(1)), Merge::Replace);
  }

  /// Replace the filters and reload from page 1 / offset 0.
  pub fn update_filters(&mut self, filters: VideoFilters) {
    info!(camera = ?filters.camera_name, "list: filters updated");
    self.filters = filters;
    self.page_info = None;
    self.mounted = true;
    self.issue(self.first_window(), Merge::Replace);
  }

  /// Re-order the loaded window. Never fetches.
  pub fn update_sort(&mut self, sort: Option<SortOrder>) {
    self.sort = sort;
    self.recompute_order();
  }

  // --- Settling ---

  /// Commit any responses that have arrived. Returns whether state changed.
  pub fn poll_pending(&mut self) -> bool {
    let mut changed = false;
    while let Ok(msg) = self.rx.try_recv() {
      changed |= self.apply(msg);
    }
    changed
  }

  /// Wait until the current request (and any that supersede it meanwhile) has settled.
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

  // --- Internals ---

  fn first_window(&self) -> Window {
    match self.pagination {
      PaginationMode::Offset => Window::Offset(0),
      PaginationMode::Page => Window::Page(1),
    }
  }

  fn query(&self, window: Window) -> ListQuery {
    ListQuery {
      camera_name: self.filters.camera_name.clone(),
      date_range: self.filters.date_range,
      limit: self.limit,
      window,
      include_metadata: self.include_metadata,
    }
  }

  fn issue(&mut self, window: Window, merge: Merge) {
    if let Some(previous) = self.in_flight.take() {
      debug!(id = previous.id, "list: superseding in-flight request");
      previous.token.cancel();
    }
    self.next_id += 1;
    let id = self.next_id;
    let token = CancellationToken::new();
    let query = self.query(window);
    debug!(id, offset = query.offset(), limit = query.limit, "list: fetching");

    let catalog = Arc::clone(&self.catalog);
    let tx = self.tx.clone();
    let task_token = token.clone();
    tokio::spawn(async move {
      let fetch = tokio::spawn(async move { catalog.list_videos(query).await });
      let result = match fetch.await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(ControllerError::fetch("Failed to fetch videos", e)),
        Err(e) => Err(ControllerError::unknown("Video list task ended", e)),
      };
      if task_token.is_cancelled() {
        debug!(id, "list: dropping superseded response");
        return;
      }
      let _ = tx.send(ListMessage { id, result });
    });

    self.status = ListStatus::Loading;
    self.in_flight = Some(InFlight { id, token, merge });
  }

  fn apply(&mut self, msg: ListMessage) -> bool {
    let current = match self.in_flight {
      Some(ref f) if f.id == msg.id && !f.token.is_cancelled() => f.merge,
      _ => {
        debug!(id = msg.id, "list: discarding stale response");
        return false;
      }
    };
    self.in_flight = None;

    match msg.result {
      Ok(response) => {
        let received = response.videos.len();
        match current {
          Merge::Replace => self.loaded = response.videos,
          Merge::Append => {
            // New recordings shift offsets between pages; skip rows already loaded.
            let seen: HashSet<String> = self.loaded.iter().map(|v| v.file_id.clone()).collect();
            self.loaded.extend(response.videos.into_iter().filter(|v| !seen.contains(&v.file_id)));
          }
        }
        self.total_count = response.total_count;
        match self.pagination {
          PaginationMode::Offset => self.has_more = received == self.limit as usize,
          PaginationMode::Page => {
            self.page_info = response.page;
            self.has_more = response.page.is_some_and(|p| p.has_next);
          }
        }
        self.recompute_order();
        self.error = None;
        self.status = ListStatus::Success;
        debug!(received, loaded = self.loaded.len(), has_more = self.has_more, "list: committed");
      }
      Err(e) => {
        warn!(err = %e, "list: fetch failed");
        self.error = Some(e);
        self.status = ListStatus::Error;
      }
    }
    true
  }

  fn recompute_order(&mut self) {
    self.order = (0..self.loaded.len()).collect();
    if let Some(sort) = self.sort {
      let loaded = &self.loaded;
      self.order.sort_by(|&a, &b| sort.compare(&loaded[a], &loaded[b]));
    }
  }
}

impl<C: VideoCatalog> Drop for ListController<C> {
  fn drop(&mut self) {
    if let Some(in_flight) = self.in_flight.take() {
      in_flight.token.cancel();
    }
  }
}
