// FormatSelector - budget-constrained stream selection
//
// Picks one DASH video stream and one DASH audio stream whose combined size
// fits a byte budget. Search order is highest resolution first, then highest
// audio bitrate for that resolution; the first fitting pair wins.

use std::cmp::Ordering;

use super::models::{EncodedStream, StreamKind};

/// yt-dlp selector used when no size limit applies
pub const UNCONSTRAINED_FORMAT_SPEC: &str = "bestvideo+bestaudio/best";

/// A video+audio pair chosen for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatChoice {
    pub video_format_id: String,
    pub audio_format_id: String,
    /// Combined (possibly approximate) size in bytes
    pub total_bytes: u64,
}

impl FormatChoice {
    /// yt-dlp combined format syntax, e.g. "137+140"
    pub fn format_spec(&self) -> String {
        format!("{}+{}", self.video_format_id, self.audio_format_id)
    }
}

pub struct FormatSelector;

impl FormatSelector {
    /// Best video+audio pair whose summed size is `<= budget_bytes`.
    ///
    /// Streams without any size information are never picked. Returns `None`
    /// when either side is empty or every pair exceeds the budget.
    pub fn select_within_budget(
        streams: &[EncodedStream],
        budget_bytes: u64,
    ) -> Option<FormatChoice> {
        let mut video: Vec<&EncodedStream> = streams
            .iter()
            .filter(|s| s.kind == StreamKind::VideoOnly)
            .collect();
        let mut audio: Vec<&EncodedStream> = streams
            .iter()
            .filter(|s| s.kind == StreamKind::AudioOnly)
            .collect();

        video.sort_by(|a, b| b.height.unwrap_or(0).cmp(&a.height.unwrap_or(0)));
        audio.sort_by(|a, b| Self::compare_bitrate(b, a));

        for v in &video {
            let Some(video_size) = v.effective_size() else {
                continue;
            };

            for a in &audio {
                let Some(audio_size) = a.effective_size() else {
                    continue;
                };

                let total = video_size.saturating_add(audio_size);
                if total <= budget_bytes {
                    return Some(FormatChoice {
                        video_format_id: v.format_id.clone(),
                        audio_format_id: a.format_id.clone(),
                        total_bytes: total,
                    });
                }

                tracing::debug!(
                    video = %v.format_id,
                    audio = %a.format_id,
                    total,
                    budget_bytes,
                    "pair above size limit, skipping"
                );
            }
        }

        None
    }

    fn compare_bitrate(a: &EncodedStream, b: &EncodedStream) -> Ordering {
        a.audio_bitrate
            .unwrap_or(0.0)
            .total_cmp(&b.audio_bitrate.unwrap_or(0.0))
    }
}
