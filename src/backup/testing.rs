// In-memory collaborators for backup tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::models::{Playlist, Video};
use super::traits::{PlaylistSource, RemoteMirror};
use crate::downloader::{DownloadError, FormatPolicy, VideoDownloader};
use crate::google::ApiError;

enum Behavior {
    Size(u64),
    NoFeasibleFormat,
}

/// Writes sparse `<title>.mp4` files of configured sizes
#[derive(Default)]
pub struct FakeDownloader {
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<Vec<String>>,
    policies: Mutex<Vec<FormatPolicy>>,
}

impl FakeDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, title: &str, bytes: u64) -> Self {
        self.behaviors.insert(title.to_string(), Behavior::Size(bytes));
        self
    }

    pub fn with_no_feasible_format(mut self, title: &str) -> Self {
        self.behaviors
            .insert(title.to_string(), Behavior::NoFeasibleFormat);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn policies(&self) -> Vec<FormatPolicy> {
        self.policies.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoDownloader for FakeDownloader {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn download(
        &self,
        video: &Video,
        dest_dir: &Path,
        policy: FormatPolicy,
    ) -> Result<PathBuf, DownloadError> {
        self.calls.lock().unwrap().push(video.title.clone());
        self.policies.lock().unwrap().push(policy);

        match self.behaviors.get(&video.title) {
            Some(Behavior::Size(bytes)) => {
                let path = dest_dir.join(format!("{}.mp4", video.title));
                let file = std::fs::File::create(&path)?;
                file.set_len(*bytes)?;
                Ok(path)
            }
            Some(Behavior::NoFeasibleFormat) => {
                Err(DownloadError::NoFeasibleFormat { budget_bytes: 0 })
            }
            None => Err(DownloadError::Unknown(format!(
                "no fake behavior for {}",
                video.title
            ))),
        }
    }
}

/// Folder tree and uploads kept in memory
#[derive(Default)]
pub struct FakeMirror {
    existing: HashMap<String, Vec<String>>,
    folders: Mutex<Vec<(String, String, Option<String>)>>,
    uploads: Mutex<Vec<(String, String)>>,
    failing_uploads: HashSet<String>,
    failing_listing: bool,
    failing_folders: HashSet<String>,
}

impl FakeMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(mut self, folder_id: &str, names: &[&str]) -> Self {
        self.existing.insert(
            folder_id.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
        self
    }

    pub fn failing_upload(mut self, file_name: &str) -> Self {
        self.failing_uploads.insert(file_name.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.failing_listing = true;
        self
    }

    pub fn failing_folder(mut self, name: &str) -> Self {
        self.failing_folders.insert(name.to_string());
        self
    }

    pub fn uploaded_names(&self, folder_id: &str) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .filter(|(f, _)| f == folder_id)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// (name, parent) of every folder ensured so far, in creation order
    pub fn folders(&self) -> Vec<(String, Option<String>)> {
        self.folders
            .lock()
            .unwrap()
            .iter()
            .map(|(_, name, parent)| (name.clone(), parent.clone()))
            .collect()
    }

    fn server_error() -> ApiError {
        ApiError::Http {
            endpoint: "fake".to_string(),
            status: 500,
            body: "internal error".to_string(),
        }
    }
}

#[async_trait]
impl RemoteMirror for FakeMirror {
    async fn ensure_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String, ApiError> {
        if self.failing_folders.contains(name) {
            return Err(Self::server_error());
        }

        let mut folders = self.folders.lock().unwrap();
        let parent = parent_id.map(str::to_string);
        if let Some((id, _, _)) = folders
            .iter()
            .find(|(_, n, p)| n == name && *p == parent)
        {
            return Ok(id.clone());
        }

        let id = format!("folder-{}", name);
        folders.push((id.clone(), name.to_string(), parent));
        Ok(id)
    }

    async fn list_object_names(&self, folder_id: &str) -> Result<Vec<String>, ApiError> {
        if self.failing_listing {
            return Err(Self::server_error());
        }
        Ok(self.existing.get(folder_id).cloned().unwrap_or_default())
    }

    async fn upload(&self, folder_id: &str, local_path: &Path) -> Result<String, ApiError> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        assert!(local_path.exists(), "uploading a file that is gone: {}", name);

        if self.failing_uploads.contains(&name) {
            return Err(Self::server_error());
        }

        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((folder_id.to_string(), name));
        Ok(format!("file-{}", uploads.len()))
    }
}

/// Static playlists; playlist ids listed in `failing` error on enumeration
#[derive(Default)]
pub struct FakeSource {
    playlists: Vec<Playlist>,
    videos: HashMap<String, Vec<Video>>,
    failing: HashSet<String>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playlist(mut self, id: &str, title: &str, videos: &[&str]) -> Self {
        self.playlists.push(Playlist {
            id: id.to_string(),
            title: title.to_string(),
        });
        self.videos.insert(
            id.to_string(),
            videos
                .iter()
                .map(|t| Video::from_raw(format!("{}-{}", id, t), t))
                .collect(),
        );
        self
    }

    pub fn failing_playlist(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }
}

#[async_trait]
impl PlaylistSource for FakeSource {
    async fn list_playlists(&self) -> Result<Vec<Playlist>, ApiError> {
        Ok(self.playlists.clone())
    }

    async fn list_videos(&self, playlist_id: &str) -> Result<Vec<Video>, ApiError> {
        if self.failing.contains(playlist_id) {
            return Err(ApiError::Http {
                endpoint: "playlistItems".to_string(),
                status: 404,
                body: "playlistNotFound".to_string(),
            });
        }
        Ok(self.videos.get(playlist_id).cloned().unwrap_or_default())
    }
}
