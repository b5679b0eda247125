// Backup module - the per-playlist loop and the run orchestration around it

pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod runner;
pub mod sanitize;
pub mod session;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::BackupError;
pub use models::{Playlist, PlaylistReport, RunSummary, Video, VideoOutcome};
pub use orchestrator::PlaylistBackup;
pub use runner::BackupRunner;
pub use sanitize::{sanitize_title, strip_extension};
pub use session::{Admission, BackupSession};
pub use traits::{PlaylistSource, RemoteMirror};
