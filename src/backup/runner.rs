// Whole-account run: remote root, playlist filtering, one loop per playlist

use super::errors::BackupError;
use super::models::{Playlist, PlaylistReport, RunSummary};
use super::orchestrator::PlaylistBackup;
use super::traits::{PlaylistSource, RemoteMirror};
use crate::config::BackupConfig;
use crate::downloader::VideoDownloader;

pub struct BackupRunner<'a> {
    source: &'a dyn PlaylistSource,
    mirror: &'a dyn RemoteMirror,
    downloader: &'a dyn VideoDownloader,
    config: &'a BackupConfig,
}

impl<'a> BackupRunner<'a> {
    pub fn new(
        source: &'a dyn PlaylistSource,
        mirror: &'a dyn RemoteMirror,
        downloader: &'a dyn VideoDownloader,
        config: &'a BackupConfig,
    ) -> Self {
        Self {
            source,
            mirror,
            downloader,
            config,
        }
    }

    /// Back up every non-excluded playlist.
    ///
    /// Fails only when the staging directory, the remote root or the
    /// playlist list cannot be obtained. A failing playlist is logged and
    /// the run moves on.
    pub async fn run(&self) -> Result<RunSummary, BackupError> {
        let staging = &self.config.staging_dir;
        tokio::fs::create_dir_all(staging)
            .await
            .map_err(|source| BackupError::Staging {
                path: staging.clone(),
                source,
            })?;

        let root = self.resolve_root().await?;

        let playlists = self
            .source
            .list_playlists()
            .await
            .map_err(|source| BackupError::Enumeration {
                what: "playlists".to_string(),
                source,
            })?;

        let mut summary = RunSummary::default();

        if playlists.is_empty() {
            tracing::info!("no playlists found on the channel");
            return Ok(summary);
        }

        for playlist in &playlists {
            if self.config.is_excluded(&playlist.title) {
                tracing::info!(playlist = %playlist.title, "playlist excluded");
                summary.excluded.push(playlist.title.clone());
                continue;
            }

            match self.backup_playlist(playlist, root.as_deref()).await {
                Ok(report) => {
                    tracing::info!(
                        playlist = %report.playlist,
                        uploaded = report.uploaded(),
                        skipped = report.skipped(),
                        failed = report.failed(),
                        stopped_on_quota = report.stopped_on_quota,
                        "playlist done"
                    );
                    summary.reports.push(report);
                }
                Err(e) => {
                    tracing::error!(playlist = %playlist.title, error = %e, "playlist backup aborted");
                    summary.failed_playlists.push(playlist.title.clone());
                }
            }
        }

        tracing::info!(
            playlists = summary.reports.len(),
            uploaded = summary.uploaded(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            aborted_playlists = summary.failed_playlists.len(),
            "backup run finished"
        );

        Ok(summary)
    }

    async fn backup_playlist(
        &self,
        playlist: &Playlist,
        root: Option<&str>,
    ) -> Result<PlaylistReport, BackupError> {
        tracing::info!(playlist = %playlist.title, "getting videos for playlist");

        let videos = self
            .source
            .list_videos(&playlist.id)
            .await
            .map_err(|source| BackupError::Enumeration {
                what: format!("videos of playlist '{}'", playlist.title),
                source,
            })?;

        let folder_id = self.ensure_folder(&playlist.title, root).await?;

        PlaylistBackup::new(
            self.downloader,
            self.mirror,
            &self.config.staging_dir,
            self.config.max_storage_mb,
        )
        .with_policy(self.config.format_policy())
        .run(&playlist.title, &videos, &folder_id)
        .await
    }

    /// Walk `remote_root`, creating missing folders. `None` means the
    /// storage root itself.
    async fn resolve_root(&self) -> Result<Option<String>, BackupError> {
        let mut parent: Option<String> = None;
        for name in &self.config.remote_root {
            parent = Some(self.ensure_folder(name, parent.as_deref()).await?);
        }
        Ok(parent)
    }

    async fn ensure_folder(&self, name: &str, parent: Option<&str>) -> Result<String, BackupError> {
        self.mirror
            .ensure_folder(name, parent)
            .await
            .map_err(|source| BackupError::FolderResolution {
                name: name.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::testing::{FakeDownloader, FakeMirror, FakeSource};

    fn config_in(dir: &std::path::Path) -> BackupConfig {
        BackupConfig {
            staging_dir: dir.join("downloads"),
            max_storage_mb: 100,
            ..BackupConfig::default()
        }
    }

    #[tokio::test]
    async fn mirrors_playlists_under_root_chain() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let source = FakeSource::new()
            .with_playlist("PL1", "Music", &["Song"])
            .with_playlist("WL", "Watch Later", &["Ignored"])
            .with_playlist("LL", "Liked Videos", &["Ignored too"]);
        let mirror = FakeMirror::new();
        let downloader = FakeDownloader::new().with_size("Song", 1024);

        let summary = BackupRunner::new(&source, &mirror, &downloader, &config)
            .run()
            .await
            .unwrap();

        assert_eq!(
            mirror.folders(),
            vec![
                ("backups".to_string(), None),
                ("youtube".to_string(), Some("folder-backups".to_string())),
                ("Music".to_string(), Some("folder-youtube".to_string())),
            ]
        );
        assert_eq!(mirror.uploaded_names("folder-Music"), vec!["Song.mp4".to_string()]);
        assert_eq!(downloader.calls(), vec!["Song".to_string()]);
        assert_eq!(summary.excluded, vec!["Watch Later", "Liked Videos"]);
        assert_eq!(summary.uploaded(), 1);
        assert!(config.staging_dir.is_dir());
    }

    #[tokio::test]
    async fn failing_playlist_does_not_stop_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let source = FakeSource::new()
            .with_playlist("BAD", "Broken", &["Lost"])
            .with_playlist("OK", "Fine", &["Clip"])
            .failing_playlist("BAD");
        let mirror = FakeMirror::new();
        let downloader = FakeDownloader::new().with_size("Clip", 1024);

        let summary = BackupRunner::new(&source, &mirror, &downloader, &config)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.failed_playlists, vec!["Broken".to_string()]);
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(mirror.uploaded_names("folder-Fine"), vec!["Clip.mp4".to_string()]);
    }

    #[tokio::test]
    async fn folder_failure_aborts_only_that_playlist() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let source = FakeSource::new()
            .with_playlist("A", "No Folder", &["X"])
            .with_playlist("B", "Has Folder", &["Y"]);
        let mirror = FakeMirror::new().failing_folder("No Folder");
        let downloader = FakeDownloader::new().with_size("X", 1).with_size("Y", 1);

        let summary = BackupRunner::new(&source, &mirror, &downloader, &config)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.failed_playlists, vec!["No Folder".to_string()]);
        assert_eq!(downloader.calls(), vec!["Y".to_string()]);
    }

    #[tokio::test]
    async fn root_failure_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let source = FakeSource::new().with_playlist("A", "Music", &["X"]);
        let mirror = FakeMirror::new().failing_folder("backups");
        let downloader = FakeDownloader::new();

        let err = BackupRunner::new(&source, &mirror, &downloader, &config)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::FolderResolution { ref name, .. } if name == "backups"));
    }

    #[tokio::test]
    async fn empty_root_chain_uses_storage_root() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BackupConfig {
            remote_root: Vec::new(),
            ..config_in(tmp.path())
        };
        let source = FakeSource::new().with_playlist("A", "Music", &[]);
        let mirror = FakeMirror::new();
        let downloader = FakeDownloader::new();

        BackupRunner::new(&source, &mirror, &downloader, &config)
            .run()
            .await
            .unwrap();

        assert_eq!(mirror.folders(), vec![("Music".to_string(), None)]);
    }

    #[tokio::test]
    async fn no_playlists_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let source = FakeSource::new();
        let mirror = FakeMirror::new();
        let downloader = FakeDownloader::new();

        let summary = BackupRunner::new(&source, &mirror, &downloader, &config)
            .run()
            .await
            .unwrap();

        assert!(summary.reports.is_empty());
        assert!(downloader.calls().is_empty());
    }
}
