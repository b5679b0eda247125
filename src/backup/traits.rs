// Collaborator traits consumed by the backup loop

use std::path::Path;

use async_trait::async_trait;

use super::models::{Playlist, Video};
use crate::google::ApiError;

/// Enumerates the account's playlists and their videos.
///
/// Implementations hide pagination and return fully materialized lists with
/// sanitized video titles.
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    async fn list_playlists(&self) -> Result<Vec<Playlist>, ApiError>;

    async fn list_videos(&self, playlist_id: &str) -> Result<Vec<Video>, ApiError>;
}

/// Cloud folder tree the videos are mirrored into
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Id of the folder `name` under `parent_id` (or the storage root),
    /// creating it when absent
    async fn ensure_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String, ApiError>;

    /// Names of every live object directly inside `folder_id`
    async fn list_object_names(&self, folder_id: &str) -> Result<Vec<String>, ApiError>;

    /// Upload `local_path` into `folder_id` under its file name
    async fn upload(&self, folder_id: &str, local_path: &Path) -> Result<String, ApiError>;
}
