// Runtime configuration
//
// Defaults cover the usual single-account setup. An optional JSON file
// (`$PLAYLIST_BACKUP_CONFIG`, else `./backup.json`) can override any field,
// and environment variables override the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::downloader::FormatPolicy;

pub const CONFIG_PATH_ENV: &str = "PLAYLIST_BACKUP_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "backup.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
}

/// yt-dlp invocation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YtDlpConfig {
    /// Explicit binary path; searched in common locations when unset
    pub binary: Option<String>,
    /// Netscape cookies.txt, takes precedence over browser cookies
    pub cookies_path: Option<PathBuf>,
    /// Browser to read cookies from (e.g. "chrome")
    pub cookies_from_browser: Option<String>,
    /// Proxy URL for yt-dlp, also applied to the Google API client
    pub proxy: Option<String>,
    pub socket_timeout_secs: u64,
    /// Upper bound for the metadata (`--dump-json`) call
    pub info_timeout_secs: u64,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: None,
            cookies_path: None,
            cookies_from_browser: None,
            proxy: None,
            socket_timeout_secs: 30,
            info_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Flat local directory for downloads in flight
    pub staging_dir: PathBuf,
    /// Storage cap per playlist, in MB
    pub max_storage_mb: u64,
    /// Per-video size limit in MB; 0 downloads best quality regardless of size
    pub video_size_limit_mb: u64,
    /// Folder chain under the Drive root that holds one folder per playlist
    pub remote_root: Vec<String>,
    /// Playlist titles never backed up (exact match)
    pub excluded_playlists: Vec<String>,
    /// Google OAuth client ("installed" or "web" format)
    pub client_secrets_path: PathBuf,
    /// Cached OAuth tokens; defaults to the user data directory
    pub token_cache_path: Option<PathBuf>,
    pub ytdlp: YtDlpConfig,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("./downloads"),
            max_storage_mb: 2048 * 2 * 10,
            video_size_limit_mb: 1024 * 6,
            remote_root: vec!["backups".to_string(), "youtube".to_string()],
            excluded_playlists: vec!["Watch Later".to_string(), "Liked Videos".to_string()],
            client_secrets_path: PathBuf::from("client_secrets.json"),
            token_cache_path: None,
            ytdlp: YtDlpConfig::default(),
        }
    }
}

impl BackupConfig {
    /// Defaults, then the config file if present, then the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Apply `PLAYLIST_BACKUP_*` and `YTDLP_*` variables via `lookup`
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("PLAYLIST_BACKUP_STAGING_DIR") {
            self.staging_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PLAYLIST_BACKUP_MAX_STORAGE_MB") {
            self.max_storage_mb = parse_number("PLAYLIST_BACKUP_MAX_STORAGE_MB", &v)?;
        }
        if let Some(v) = lookup("PLAYLIST_BACKUP_VIDEO_LIMIT_MB") {
            self.video_size_limit_mb = parse_number("PLAYLIST_BACKUP_VIDEO_LIMIT_MB", &v)?;
        }
        if let Some(v) = lookup("PLAYLIST_BACKUP_REMOTE_ROOT") {
            self.remote_root = split_list(&v, '/');
        }
        if let Some(v) = lookup("PLAYLIST_BACKUP_EXCLUDED") {
            self.excluded_playlists = split_list(&v, ',');
        }
        if let Some(v) = lookup("PLAYLIST_BACKUP_CLIENT_SECRETS") {
            self.client_secrets_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("PLAYLIST_BACKUP_TOKEN_CACHE") {
            self.token_cache_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("YTDLP_PATH") {
            self.ytdlp.binary = Some(v);
        }
        if let Some(v) = lookup("YTDLP_COOKIES_FILE") {
            self.ytdlp.cookies_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("YTDLP_COOKIES_BROWSER") {
            self.ytdlp.cookies_from_browser = Some(v);
        }
        if let Some(v) = lookup("YTDLP_PROXY") {
            self.ytdlp.proxy = Some(v);
        }
        Ok(())
    }

    pub fn format_policy(&self) -> FormatPolicy {
        FormatPolicy::from_limit_mb(self.video_size_limit_mb)
    }

    pub fn is_excluded(&self, playlist_title: &str) -> bool {
        self.excluded_playlists.iter().any(|t| t == playlist_title)
    }

    /// Configured token cache, else `<data dir>/playlist-backup/token.json`
    pub fn resolved_token_cache_path(&self) -> PathBuf {
        self.token_cache_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("playlist-backup")
                .join("token.json")
        })
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn split_list(value: &str, sep: char) -> Vec<String> {
    value
        .split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
