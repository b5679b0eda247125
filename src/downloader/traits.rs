// Downloader trait definition

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::FormatPolicy;
use crate::backup::models::Video;

/// Fetches one video into a local directory
#[async_trait]
pub trait VideoDownloader: Send + Sync {
    /// Name of the implementation (for logging)
    fn name(&self) -> &'static str;

    /// Download `video` into `dest_dir` as `<title>.<ext>` and return the
    /// produced file. Fails with `NoFeasibleFormat` when the policy rejects
    /// every stream combination.
    async fn download(
        &self,
        video: &Video,
        dest_dir: &Path,
        policy: FormatPolicy,
    ) -> Result<PathBuf, DownloadError>;
}
