//! Error values surfaced by the client core.
//!
//! Transport failures are normalized into [`CatalogError`] at the HTTP boundary; controllers wrap
//! them into [`ControllerError`] and store them in their state instead of returning them.

use serde_json::Value;
use std::fmt;

/// Tagged catalog failure: `{code, message, details?}`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
  /// The request never produced an HTTP response (connect, DNS, TLS, timeout, body read).
  #[error("network error: {message}")]
  Network { message: String },

  /// The server answered with a non-success status.
  #[error("HTTP {status}: {message}")]
  Http { status: u16, message: String, details: Option<Value> },

  /// The body did not have the expected shape.
  #[error("invalid response: {message}")]
  InvalidResponse { message: String },
}

impl CatalogError {
  pub fn network(err: impl fmt::Display) -> Self {
    CatalogError::Network { message: err.to_string() }
  }

  pub fn invalid_response(message: impl Into<String>) -> Self {
    CatalogError::InvalidResponse { message: message.into() }
  }

  /// Build an HTTP error from a status and the raw body.
  ///
  /// FastAPI-style `{"detail": "..."}` bodies supply the message; anything else falls back to
  /// `HTTP <status>` and keeps the parsed body (if JSON) as details.
  pub fn from_status(status: u16, body: &[u8]) -> Self {
    let details = serde_json::from_slice::<Value>(body).ok();
    let message = details
      .as_ref()
      .and_then(|v| v.get("detail"))
      .and_then(|d| d.as_str())
      .map(str::to_string)
      .unwrap_or_else(|| format!("HTTP {}", status));
    CatalogError::Http { status, message, details }
  }

  /// Stable code: `NETWORK_ERROR`, `HTTP_<status>` or `INVALID_RESPONSE`.
  pub fn code(&self) -> String {
    match self {
      CatalogError::Network { .. } => "NETWORK_ERROR".to_string(),
      CatalogError::Http { status, .. } => format!("HTTP_{}", status),
      CatalogError::InvalidResponse { .. } => "INVALID_RESPONSE".to_string(),
    }
  }

  pub fn message(&self) -> &str {
    match self {
      CatalogError::Network { message }
      | CatalogError::Http { message, .. }
      | CatalogError::InvalidResponse { message } => message,
    }
  }

  pub fn details(&self) -> Option<&Value> {
    match self {
      CatalogError::Http { details, .. } => details.as_ref(),
      _ => None,
    }
  }
}

/// Controller-level error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
  /// A catalog request failed; the cause is attached.
  Fetch,
  /// The fetch task ended without producing a result.
  Unknown,
}

impl ErrorCode {
  pub fn as_str(self) -> &'static str {
    match self {
      ErrorCode::Fetch => "FETCH_ERROR",
      ErrorCode::Unknown => "UNKNOWN_ERROR",
    }
  }
}

/// Error state held by the list and metadata controllers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}: {message}", .code.as_str())]
pub struct ControllerError {
  pub code: ErrorCode,
  pub message: String,
  #[source]
  pub source: Option<CatalogError>,
}

impl ControllerError {
  /// Wrap a catalog failure with what the controller was doing.
  pub fn fetch(context: &str, err: CatalogError) -> Self {
    ControllerError { code: ErrorCode::Fetch, message: format!("{}: {}", context, err), source: Some(err) }
  }

  pub fn unknown(context: &str, detail: impl fmt::Display) -> Self {
    ControllerError { code: ErrorCode::Unknown, message: format!("{}: {}", context, detail), source: None }
  }
}

/// Failure reported by a media resource for an imperative command.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MediaError {
  /// The resource refused to start playback (autoplay policy, decode failure, ...).
  #[error("playback rejected: {0}")]
  PlayRejected(String),

  /// The resource has no fullscreen support.
  #[error("fullscreen unsupported")]
  FullscreenUnsupported,

  #[error("{0}")]
  Other(String),
}
