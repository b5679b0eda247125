// Error types for the video downloader

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// No video+audio pair fits under the per-video byte budget
    #[error("no video+audio combination fits within {budget_bytes} bytes")]
    NoFeasibleFormat { budget_bytes: u64 },

    /// Network timeout while talking to YouTube
    #[error("network timeout: YouTube is not responding")]
    NetworkTimeout,

    /// YouTube blocked the request (429, bot detection, etc.)
    #[error("YouTube is throttling or blocking requests: {0}")]
    Blocked(String),

    /// yt-dlp not found in system
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Failed to parse yt-dlp JSON output
    #[error("parse error: {0}")]
    ParseError(String),

    /// Command execution failed
    #[error("execution error: {0}")]
    ExecutionError(String),

    /// yt-dlp exited successfully but the merged file is nowhere to be found
    #[error("download finished but no output file was found for '{stem}' in {}", dir.display())]
    OutputMissing { stem: String, dir: PathBuf },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown error: {0}")]
    Unknown(String),
}

// Classify raw yt-dlp stderr into a variant
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("timeout") || lower.contains("timed out") {
            if lower.contains("youtube.com") {
                return Self::Blocked(s);
            }
            return Self::NetworkTimeout;
        }

        if lower.contains("429")
            || lower.contains("sign in to confirm")
            || lower.contains("bot")
            || lower.contains("blocked")
        {
            return Self::Blocked(s);
        }

        if lower.contains("command not found") || lower.contains("no such file") {
            return Self::ToolNotFound(s);
        }

        if lower.contains("json") || lower.contains("parse") {
            return Self::ParseError(s);
        }

        Self::Unknown(s)
    }
}
