//! Client core for the recording dashboard: catalog access, the video list, cached per-video
//! details and player state.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod list;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod playback;

#[cfg(test)]
mod test_support;

pub use catalog::{CatalogClient, Thumbnail, ThumbnailParams, VideoCatalog};
pub use config::{Config, PaginationMode};
pub use error::{CatalogError, ControllerError, ErrorCode, MediaError};
pub use list::{ListController, SortDirection, SortField, SortOrder, VideoFilters};
pub use metadata::{DetailsCache, MetadataCache};
pub use models::{ListQuery, ListResponse, PageInfo, StreamingInfo, VideoDetails, VideoMetadata, VideoRecord, Window};
pub use playback::{MediaResource, PlaybackController, PlaybackEvent, PlaybackSnapshot, PlayerOptions};
