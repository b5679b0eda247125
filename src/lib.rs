pub mod backup;
pub mod config;
pub mod downloader;
pub mod google;
pub mod logging;

use std::sync::Arc;

use anyhow::Context;

use backup::BackupRunner;
use config::BackupConfig;
use downloader::YtDlpDownloader;
use google::{Authenticator, ClientSecrets, DriveClient, TokenProvider, YouTubeClient};

const USER_AGENT: &str = concat!("playlist-backup/", env!("CARGO_PKG_VERSION"));

/// Load configuration, authorize once, and back up every playlist
pub async fn run() -> anyhow::Result<()> {
    let config = BackupConfig::load().context("failed to load configuration")?;

    let mut http = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(proxy) = config.ytdlp.proxy.as_deref() {
        http = http.proxy(reqwest::Proxy::all(proxy).with_context(|| format!("invalid proxy {}", proxy))?);
    }
    let http = http.build().context("failed to build HTTP client")?;

    let secrets = ClientSecrets::from_file(&config.client_secrets_path)
        .await
        .with_context(|| {
            format!(
                "cannot load OAuth client from {}",
                config.client_secrets_path.display()
            )
        })?;

    let tokens: Arc<dyn TokenProvider> = Arc::new(Authenticator::new(
        http.clone(),
        secrets,
        config.resolved_token_cache_path(),
    ));
    // Consent (if needed) happens before any work starts
    tokens
        .access_token()
        .await
        .context("Google authorization failed")?;

    let youtube = YouTubeClient::new(http.clone(), Arc::clone(&tokens));
    let drive = DriveClient::new(http, tokens);
    let downloader = YtDlpDownloader::new(config.ytdlp.clone());

    tracing::info!(
        staging_dir = %config.staging_dir.display(),
        max_storage_mb = config.max_storage_mb,
        video_size_limit_mb = config.video_size_limit_mb,
        remote_root = %config.remote_root.join("/"),
        "starting backup"
    );

    let summary = BackupRunner::new(&youtube, &drive, &downloader, &config)
        .run()
        .await
        .context("backup run failed")?;

    if !summary.failed_playlists.is_empty() {
        tracing::warn!(
            playlists = %summary.failed_playlists.join(", "),
            "some playlists could not be backed up"
        );
    }

    Ok(())
}
