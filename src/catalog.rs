//! HTTP client for the recording catalog.
//!
//! [`CatalogClient`] is stateless apart from its connection pool. Every transport failure is
//! normalized into a [`CatalogError`] before it leaves this module.

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::{Client, Response, Url, header};
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::constants;
use crate::error::CatalogError;
use crate::models::{ListQuery, ListResponse, StreamingInfo, VideoInfoBody, VideoListBody, VideoMetadata};

/// Read side of the catalog used by the controllers.
pub trait VideoCatalog: Send + Sync + 'static {
  fn list_videos(&self, query: ListQuery) -> impl Future<Output = Result<ListResponse, CatalogError>> + Send;

  fn get_metadata(&self, file_id: &str) -> impl Future<Output = Result<VideoMetadata, CatalogError>> + Send;

  fn get_streaming_info(&self, file_id: &str) -> impl Future<Output = Result<StreamingInfo, CatalogError>> + Send;
}

/// Optional thumbnail rendering parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThumbnailParams {
  /// Position in the recording, in seconds.
  pub timestamp: Option<f64>,
  pub width: Option<u32>,
  pub height: Option<u32>,
}

/// An owned thumbnail image.
///
/// The caller owns the bytes; dropping the value releases them, so list views should drop
/// thumbnails for rows that scroll out of view.
#[derive(Debug, Clone)]
pub struct Thumbnail {
  pub file_id: String,
  pub content_type: Option<String>,
  pub data: Bytes,
}

/// Inclusive byte range for stream requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
  pub start: u64,
  /// `None` reads to the end of the file.
  pub end: Option<u64>,
}

impl ByteRange {
  fn header_value(&self) -> String {
    match self.end {
      Some(end) => format!("bytes={}-{}", self.start, end),
      None => format!("bytes={}-", self.start),
    }
  }
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
  http: Client,
  base_url: Url,
}

impl CatalogClient {
  pub fn new(base_url: &str) -> Result<Self, CatalogError> {
    let http = Client::builder().timeout(constants().request_timeout()).build().map_err(CatalogError::network)?;
    Self::with_client(http, base_url)
  }

  /// Build a client from runtime configuration (base URL and request timeout).
  pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
    let http = Client::builder().timeout(config.request_timeout()).build().map_err(CatalogError::network)?;
    Self::with_client(http, config.base_url())
  }

  /// Reuse an existing [`reqwest::Client`] and its connection pool.
  pub fn with_client(http: Client, base_url: &str) -> Result<Self, CatalogError> {
    let base_url = Url::parse(base_url.trim_end_matches('/'))
      .map_err(|e| CatalogError::invalid_response(format!("invalid base URL {}: {}", base_url, e)))?;
    Ok(Self { http, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Append `segments` to the base path. Each segment is percent-encoded on its own, so ids
  /// containing `/` or `?` stay a single segment.
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base_url.clone();
    url.set_query(None);
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  /// URL of `/videos/{id}/stream`. Pure.
  pub fn build_stream_url(&self, file_id: &str) -> String {
    self.endpoint(&["videos", file_id, "stream"]).to_string()
  }

  /// URL of `/videos/{id}/thumbnail` with any given parameters. Pure.
  pub fn build_thumbnail_url(&self, file_id: &str, params: &ThumbnailParams) -> String {
    self.thumbnail_url(file_id, params).to_string()
  }

  fn thumbnail_url(&self, file_id: &str, params: &ThumbnailParams) -> Url {
    let mut url = self.endpoint(&["videos", file_id, "thumbnail"]);
    if params.timestamp.is_some() || params.width.is_some() || params.height.is_some() {
      let mut pairs = url.query_pairs_mut();
      if let Some(ts) = params.timestamp {
        pairs.append_pair("timestamp", &ts.to_string());
      }
      if let Some(w) = params.width {
        pairs.append_pair("width", &w.to_string());
      }
      if let Some(h) = params.height {
        pairs.append_pair("height", &h.to_string());
      }
    }
    url
  }

  fn list_url(&self, query: &ListQuery) -> Url {
    let mut url = self.endpoint(&["videos", ""]);
    {
      let mut pairs = url.query_pairs_mut();
      if let Some(ref camera) = query.camera_name {
        pairs.append_pair("camera_name", camera);
      }
      if let Some(range) = query.date_range {
        if let Some(start) = range.start {
          pairs.append_pair("start_date", &start.to_rfc3339());
        }
        if let Some(end) = range.end {
          pairs.append_pair("end_date", &end.to_rfc3339());
        }
      }
      pairs.append_pair("limit", &query.limit.to_string());
      pairs.append_pair("offset", &query.offset().to_string());
      if query.include_metadata {
        pairs.append_pair("include_metadata", "true");
      }
    }
    url
  }

  async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, CatalogError> {
    let response = request.send().await.map_err(|e| {
      warn!(err = %e, "catalog: request failed");
      CatalogError::network(e)
    })?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    debug!(status = status.as_u16(), "catalog: non-success status");
    Err(CatalogError::from_status(status.as_u16(), &body))
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
    let response = self.send(self.http.get(url)).await?;
    response.json::<T>().await.map_err(|e| {
      if e.is_decode() { CatalogError::invalid_response(e.to_string()) } else { CatalogError::network(e) }
    })
  }

  /// Fetch one thumbnail image; ownership of the bytes passes to the caller.
  pub async fn fetch_thumbnail(&self, file_id: &str, params: &ThumbnailParams) -> Result<Thumbnail, CatalogError> {
    let response = self.send(self.http.get(self.thumbnail_url(file_id, params))).await?;
    let content_type =
      response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let data = response.bytes().await.map_err(CatalogError::network)?;
    Ok(Thumbnail { file_id: file_id.to_string(), content_type, data })
  }

  /// Open the byte stream of a recording, optionally restricted to `range`.
  pub async fn open_stream(
    &self,
    file_id: &str,
    range: Option<ByteRange>,
  ) -> Result<BoxStream<'static, Result<Bytes, CatalogError>>, CatalogError> {
    let mut request = self.http.get(self.endpoint(&["videos", file_id, "stream"]));
    if let Some(range) = range {
      request = request.header(header::RANGE, range.header_value());
    }
    let response = self.send(request).await?;
    Ok(response.bytes_stream().map(|chunk| chunk.map_err(CatalogError::network)).boxed())
  }

  /// Fetch chunk `index` of a recording, sized by `info.chunk_size_bytes`.
  ///
  /// Fails with `INVALID_RESPONSE` when the backend does not honor range requests.
  pub async fn stream_chunk(&self, file_id: &str, index: u64, info: &StreamingInfo) -> Result<Bytes, CatalogError> {
    if !info.supports_range_requests || info.chunk_size_bytes == 0 {
      return Err(CatalogError::invalid_response(format!("{} does not support range requests", file_id)));
    }
    let range = chunk_range(index, info.chunk_size_bytes)
      .ok_or_else(|| CatalogError::invalid_response(format!("chunk {} of {} is out of range", index, file_id)))?;
    let mut stream = self.open_stream(file_id, Some(range)).await?;
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
      buf.extend_from_slice(&chunk?);
    }
    Ok(Bytes::from(buf))
  }

  /// Liveness probe. Never fails: any error is reported as `false`.
  pub async fn health_check(&self) -> bool {
    let segments: Vec<&str> = constants().health_path.split('/').filter(|s| !s.is_empty()).collect();
    match self.http.get(self.endpoint(&segments)).send().await {
      Ok(response) => response.status().is_success(),
      Err(e) => {
        debug!(err = %e, "catalog: health check failed");
        false
      }
    }
  }
}

/// Inclusive byte range of chunk `index`, or `None` when it does not fit in a `u64`.
fn chunk_range(index: u64, chunk_size: u64) -> Option<ByteRange> {
  let start = index.checked_mul(chunk_size)?;
  let end = start.checked_add(chunk_size - 1)?;
  Some(ByteRange { start, end: Some(end) })
}

impl VideoCatalog for CatalogClient {
  async fn list_videos(&self, query: ListQuery) -> Result<ListResponse, CatalogError> {
    let body: VideoListBody = self.get_json(self.list_url(&query)).await?;
    debug!(count = body.videos.len(), total = body.total_count, "catalog: listed videos");
    Ok(ListResponse::from_body(body, &query))
  }

  async fn get_metadata(&self, file_id: &str) -> Result<VideoMetadata, CatalogError> {
    let body: VideoInfoBody = self.get_json(self.endpoint(&["videos", file_id])).await?;
    body.metadata.ok_or_else(|| CatalogError::invalid_response(format!("no metadata for {}", file_id)))
  }

  async fn get_streaming_info(&self, file_id: &str) -> Result<StreamingInfo, CatalogError> {
    self.get_json(self.endpoint(&["videos", file_id, "info"])).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{DateRange, Window};
  use chrono::{TimeZone, Utc};

  fn client() -> CatalogClient {
    CatalogClient::new("http://localhost:8000/").unwrap()
  }

  #[test]
  fn stream_url() {
    assert_eq!(client().build_stream_url("abc"), "http://localhost:8000/videos/abc/stream");
  }

  #[test]
  fn stream_url_keeps_base_path() {
    let client = CatalogClient::new("http://gateway.local/api").unwrap();
    assert_eq!(client.build_stream_url("abc"), "http://gateway.local/api/videos/abc/stream");
  }

  #[test]
  fn file_id_is_a_single_segment() {
    assert_eq!(client().build_stream_url("a/b"), "http://localhost:8000/videos/a%2Fb/stream");
    assert_eq!(client().build_stream_url("cam 1?x"), "http://localhost:8000/videos/cam%201%3Fx/stream");
  }

  #[test]
  fn chunk_range_bounds() {
    assert_eq!(chunk_range(2, 16), Some(ByteRange { start: 32, end: Some(47) }));
    assert_eq!(chunk_range(0, 1), Some(ByteRange { start: 0, end: Some(0) }));
    assert_eq!(chunk_range(1 << 30, 1 << 40), None);
    assert_eq!(chunk_range(1, u64::MAX), None);
  }

  #[tokio::test]
  async fn oversized_chunk_is_invalid_response() {
    let info =
      StreamingInfo { content_type: "video/mp4".to_string(), supports_range_requests: true, chunk_size_bytes: 1 << 40 };
    let err = client().stream_chunk("abc", 1 << 30, &info).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_RESPONSE");
  }

  #[test]
  fn thumbnail_url_without_params() {
    assert_eq!(
      client().build_thumbnail_url("abc", &ThumbnailParams::default()),
      "http://localhost:8000/videos/abc/thumbnail"
    );
  }

  #[test]
  fn thumbnail_url_with_params() {
    let params = ThumbnailParams { timestamp: Some(5.0), width: Some(320), height: Some(180) };
    assert_eq!(
      client().build_thumbnail_url("abc", &params),
      "http://localhost:8000/videos/abc/thumbnail?timestamp=5&width=320&height=180"
    );
  }

  #[test]
  fn list_url_from_page_query() {
    let mut query = ListQuery::new(20, Window::Page(2));
    query.camera_name = Some("camera1".to_string());
    let url = client().list_url(&query);
    assert_eq!(url.path(), "/videos/");
    assert_eq!(url.query(), Some("camera_name=camera1&limit=20&offset=20"));
  }

  #[test]
  fn list_url_with_dates_and_metadata() {
    let mut query = ListQuery::new(10, Window::Offset(0));
    query.date_range = Some(DateRange { start: Some(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()), end: None });
    query.include_metadata = true;
    let url = client().list_url(&query);
    assert_eq!(url.query(), Some("start_date=2025-07-01T00%3A00%3A00%2B00%3A00&limit=10&offset=0&include_metadata=true"));
  }

  #[test]
  fn byte_range_header() {
    assert_eq!(ByteRange { start: 0, end: Some(1023) }.header_value(), "bytes=0-1023");
    assert_eq!(ByteRange { start: 2048, end: None }.header_value(), "bytes=2048-");
  }

  #[test]
  fn invalid_base_url() {
    let err = CatalogClient::new("not a url").unwrap_err();
    assert_eq!(err.code(), "INVALID_RESPONSE");
  }
}
