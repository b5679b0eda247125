// Playlist-level error types

use std::path::PathBuf;

use thiserror::Error;

use crate::google::ApiError;

#[derive(Debug, Error)]
pub enum BackupError {
    /// Listing playlists or playlist items failed
    #[error("failed to enumerate {what}: {source}")]
    Enumeration {
        what: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to resolve remote folder '{name}': {source}")]
    FolderResolution {
        name: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to list remote folder {folder_id}: {source}")]
    RemoteListing {
        folder_id: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to upload {}: {source}", path.display())]
    Upload {
        path: PathBuf,
        #[source]
        source: ApiError,
    },

    #[error("failed to prepare staging directory {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
