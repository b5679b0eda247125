// Quota-aware backup loop for a single playlist
//
// Skip videos already in the destination folder, download the rest one by
// one, stop at the first file that would push the playlist past its storage
// cap, then upload what was accepted and clear the staging directory.

use std::collections::HashSet;
use std::path::Path;

use super::errors::BackupError;
use super::models::{PlaylistReport, Video, VideoOutcome};
use super::sanitize::strip_extension;
use super::session::{Admission, BackupSession};
use super::traits::RemoteMirror;
use crate::downloader::{FormatPolicy, VideoDownloader};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub struct PlaylistBackup<'a> {
    downloader: &'a dyn VideoDownloader,
    mirror: &'a dyn RemoteMirror,
    staging_dir: &'a Path,
    max_storage_mb: u64,
    policy: FormatPolicy,
}

impl<'a> PlaylistBackup<'a> {
    pub fn new(
        downloader: &'a dyn VideoDownloader,
        mirror: &'a dyn RemoteMirror,
        staging_dir: &'a Path,
        max_storage_mb: u64,
    ) -> Self {
        Self {
            downloader,
            mirror,
            staging_dir,
            max_storage_mb,
            policy: FormatPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FormatPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Back up `videos` into `folder_id`.
    ///
    /// Only the initial remote listing can fail the whole call; per-video
    /// download and upload errors end up in the report.
    pub async fn run(
        &self,
        playlist: &str,
        videos: &[Video],
        folder_id: &str,
    ) -> Result<PlaylistReport, BackupError> {
        // Remote titles plus titles accepted earlier in this run; a playlist
        // may list the same video, or two videos with one sanitized title.
        let mut backed_up = self.backed_up_titles(folder_id).await?;
        let mut session = BackupSession::from_cap_mb(self.max_storage_mb);
        let mut accepted: Vec<&Video> = Vec::new();
        let mut report = PlaylistReport::new(playlist);

        for video in videos {
            if backed_up.contains(&video.title) {
                tracing::info!(title = %video.title, "skipping already uploaded video");
                report.record(video, VideoOutcome::Skipped);
                continue;
            }

            tracing::info!(title = %video.title, downloader = self.downloader.name(), "downloading video");

            let path = match self
                .downloader
                .download(video, self.staging_dir, self.policy)
                .await
            {
                Ok(path) => path,
                Err(e) => {
                    tracing::error!(title = %video.title, error = %e, "error downloading video");
                    report.record(
                        video,
                        VideoOutcome::DownloadFailed {
                            reason: e.to_string(),
                        },
                    );
                    continue;
                }
            };

            let size = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    tracing::error!(title = %video.title, path = %path.display(), error = %e, "cannot stat downloaded file");
                    remove_local(&path).await;
                    report.record(
                        video,
                        VideoOutcome::DownloadFailed {
                            reason: e.to_string(),
                        },
                    );
                    continue;
                }
            };

            match session.admit(path.clone(), size) {
                Admission::Accepted => {
                    tracing::info!(
                        title = %video.title,
                        size_mb = %format!("{:.2}", size as f64 / BYTES_PER_MB),
                        "downloaded"
                    );
                    backed_up.insert(video.title.clone());
                    accepted.push(video);
                }
                Admission::AlreadyHeld => {
                    tracing::info!(title = %video.title, path = %path.display(), "file already staged for upload, skipping");
                    report.record(video, VideoOutcome::Skipped);
                }
                Admission::RejectedQuota => {
                    remove_local(&path).await;
                    tracing::warn!(
                        title = %video.title,
                        cap_mb = self.max_storage_mb,
                        used_bytes = session.accumulated_bytes(),
                        remaining_bytes = session.remaining_bytes(),
                        "storage quota reached, stopping downloads for this playlist"
                    );
                    report.record(video, VideoOutcome::RejectedQuota);
                    report.stopped_on_quota = true;
                    break;
                }
            }
        }

        report.accepted_bytes = session.accumulated_bytes();

        for (video, path) in accepted.into_iter().zip(session.into_downloaded()) {
            let outcome = match self.mirror.upload(folder_id, &path).await {
                Ok(remote_id) => {
                    tracing::info!(title = %video.title, remote_id = %remote_id, "uploaded");
                    VideoOutcome::Uploaded { remote_id }
                }
                Err(source) => {
                    let err = BackupError::Upload {
                        path: path.clone(),
                        source,
                    };
                    tracing::error!(title = %video.title, error = %err, "upload failed");
                    VideoOutcome::UploadFailed {
                        reason: err.to_string(),
                    }
                }
            };
            remove_local(&path).await;
            report.record(video, outcome);
        }

        Ok(report)
    }

    /// Remote object names in `folder_id` with their extensions stripped
    async fn backed_up_titles(&self, folder_id: &str) -> Result<HashSet<String>, BackupError> {
        let names = self
            .mirror
            .list_object_names(folder_id)
            .await
            .map_err(|source| BackupError::RemoteListing {
                folder_id: folder_id.to_string(),
                source,
            })?;

        Ok(names
            .iter()
            .map(|name| strip_extension(name).to_string())
            .collect())
    }
}

async fn remove_local(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove local file"),
    }
}
