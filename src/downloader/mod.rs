// Downloader module - stream selection and the yt-dlp driver

pub mod errors;
pub mod format_selector;
pub mod models;
pub mod traits;
pub mod utils;
pub mod ytdlp;

pub use errors::DownloadError;
pub use format_selector::{FormatChoice, FormatSelector};
pub use models::{EncodedStream, FormatPolicy, StreamKind, DEFAULT_VIDEO_BUDGET_BYTES};
pub use traits::VideoDownloader;
pub use ytdlp::YtDlpDownloader;
