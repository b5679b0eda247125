// Data models shared by the enumerator, the backup loop and the runner

use serde::{Deserialize, Serialize};

use super::sanitize::sanitize_title;

/// A video as listed in a playlist. `title` is already sanitized and doubles
/// as the local file stem and remote object name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
}

impl Video {
    /// Build from API data, sanitizing the title
    pub fn from_raw(id: impl Into<String>, raw_title: &str) -> Self {
        Self {
            id: id.into(),
            title: sanitize_title(raw_title),
        }
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub title: String,
}

/// Terminal state of one video within a playlist run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoOutcome {
    /// Already in the destination folder, or accepted earlier in the same run
    Skipped,
    /// Download or format selection failed; nothing uploaded
    DownloadFailed { reason: String },
    /// Would have exceeded the playlist cap; file discarded, loop stopped
    RejectedQuota,
    Uploaded { remote_id: String },
    /// Accepted but the upload failed; local copy removed anyway
    UploadFailed { reason: String },
}

#[derive(Debug, Clone)]
pub struct PlaylistReport {
    pub playlist: String,
    pub outcomes: Vec<(Video, VideoOutcome)>,
    pub stopped_on_quota: bool,
    /// Bytes admitted under the cap (uploaded or not)
    pub accepted_bytes: u64,
}

impl PlaylistReport {
    pub fn new(playlist: impl Into<String>) -> Self {
        Self {
            playlist: playlist.into(),
            outcomes: Vec::new(),
            stopped_on_quota: false,
            accepted_bytes: 0,
        }
    }

    pub fn record(&mut self, video: &Video, outcome: VideoOutcome) {
        self.outcomes.push((video.clone(), outcome));
    }

    pub fn outcome_of(&self, video_id: &str) -> Option<&VideoOutcome> {
        self.outcomes
            .iter()
            .find(|(v, _)| v.id == video_id)
            .map(|(_, o)| o)
    }

    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, VideoOutcome::Uploaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, VideoOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                VideoOutcome::DownloadFailed { .. } | VideoOutcome::UploadFailed { .. }
            )
        })
    }

    fn count(&self, pred: impl Fn(&VideoOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Totals for a whole run across playlists
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<PlaylistReport>,
    pub excluded: Vec<String>,
    pub failed_playlists: Vec<String>,
}

impl RunSummary {
    pub fn uploaded(&self) -> usize {
        self.reports.iter().map(PlaylistReport::uploaded).sum()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().map(PlaylistReport::skipped).sum()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().map(PlaylistReport::failed).sum()
    }
}
