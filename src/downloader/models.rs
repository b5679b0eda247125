// Data models for the stream catalog yt-dlp reports per video

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;

/// Per-video byte budget used when nothing else is configured (6 GiB)
pub const DEFAULT_VIDEO_BUDGET_BYTES: u64 = 6 * 1024 * 1024 * 1024;

/// What a single catalog entry carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    /// Video codec, no audio codec (DASH video)
    VideoOnly,
    /// Audio codec, no video codec (DASH audio)
    AudioOnly,
    /// Both codecs in one file
    Muxed,
    /// Neither codec (storyboards, manifests)
    Unusable,
}

impl StreamKind {
    /// Only an explicit `"none"` marks a track as absent
    fn from_codecs(vcodec: Option<&str>, acodec: Option<&str>) -> Self {
        let has_video = vcodec != Some("none");
        let has_audio = acodec != Some("none");

        match (has_video, has_audio) {
            (true, false) => Self::VideoOnly,
            (false, true) => Self::AudioOnly,
            (true, true) => Self::Muxed,
            (false, false) => Self::Unusable,
        }
    }
}

/// One row of a video's format catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedStream {
    /// Format ID (e.g., "137", "140")
    pub format_id: String,
    pub kind: StreamKind,
    /// File extension (mp4, webm, m4a)
    pub ext: String,
    /// Vertical resolution in pixels
    pub height: Option<u32>,
    /// Audio bitrate in kbps
    pub audio_bitrate: Option<f64>,
    /// File size in bytes
    pub filesize: Option<u64>,
    /// Approximate file size (when exact is unknown)
    pub filesize_approx: Option<u64>,
}

impl EncodedStream {
    /// Exact size, else approximate size. Zero counts as unknown.
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize
            .filter(|s| *s > 0)
            .or(self.filesize_approx.filter(|s| *s > 0))
    }
}

/// How the downloader picks formats for one video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatPolicy {
    /// Best video+audio pair whose combined size is within the budget
    SizeLimited { budget_bytes: u64 },
    /// Best available quality, no size check
    Unconstrained,
}

impl FormatPolicy {
    /// Build from a megabyte limit; zero means no limit
    pub fn from_limit_mb(limit_mb: u64) -> Self {
        if limit_mb == 0 {
            Self::Unconstrained
        } else {
            Self::SizeLimited {
                budget_bytes: limit_mb.saturating_mul(1024 * 1024),
            }
        }
    }
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self::SizeLimited {
            budget_bytes: DEFAULT_VIDEO_BUDGET_BYTES,
        }
    }
}

/// Parse the `formats` array of a `yt-dlp --dump-json` document
pub fn parse_catalog(json: &serde_json::Value) -> Result<Vec<EncodedStream>, DownloadError> {
    let formats_array = json["formats"]
        .as_array()
        .ok_or_else(|| DownloadError::ParseError("No formats array in JSON".to_string()))?;

    let mut streams = Vec::with_capacity(formats_array.len());

    for f in formats_array {
        let kind = StreamKind::from_codecs(f["vcodec"].as_str(), f["acodec"].as_str());

        streams.push(EncodedStream {
            format_id: f["format_id"].as_str().unwrap_or("").to_string(),
            kind,
            ext: f["ext"].as_str().unwrap_or("").to_string(),
            height: f["height"].as_u64().map(|h| h as u32),
            audio_bitrate: f["abr"].as_f64(),
            filesize: size_field(&f["filesize"]),
            filesize_approx: size_field(&f["filesize_approx"]),
        });
    }

    Ok(streams)
}

// yt-dlp emits sizes as ints, occasionally as floats for estimates
fn size_field(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
}
