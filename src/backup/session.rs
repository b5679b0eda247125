// Per-playlist storage accounting

use std::path::PathBuf;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Result of offering a downloaded file to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Counting the file would push the total past the cap
    RejectedQuota,
    /// The path is already held by this session and is not counted again
    AlreadyHeld,
}

/// Running total and accepted files for one playlist backup.
///
/// The accumulated total never exceeds the cap.
#[derive(Debug)]
pub struct BackupSession {
    cap_bytes: u64,
    accumulated_bytes: u64,
    downloaded: Vec<PathBuf>,
}

impl BackupSession {
    pub fn new(cap_bytes: u64) -> Self {
        Self {
            cap_bytes,
            accumulated_bytes: 0,
            downloaded: Vec::new(),
        }
    }

    pub fn from_cap_mb(cap_mb: u64) -> Self {
        Self::new(cap_mb.saturating_mul(BYTES_PER_MB))
    }

    /// Record `path` if `size` still fits under the cap
    pub fn admit(&mut self, path: PathBuf, size: u64) -> Admission {
        if self.downloaded.contains(&path) {
            return Admission::AlreadyHeld;
        }

        match self.accumulated_bytes.checked_add(size) {
            Some(total) if total <= self.cap_bytes => {
                self.accumulated_bytes = total;
                self.downloaded.push(path);
                Admission::Accepted
            }
            _ => Admission::RejectedQuota,
        }
    }

    pub fn accumulated_bytes(&self) -> u64 {
        self.accumulated_bytes
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.cap_bytes - self.accumulated_bytes
    }

    pub fn downloaded_paths(&self) -> &[PathBuf] {
        &self.downloaded
    }

    pub fn into_downloaded(self) -> Vec<PathBuf> {
        self.downloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = BYTES_PER_MB;

    #[test]
    fn accepts_until_cap_then_rejects() {
        let mut session = BackupSession::from_cap_mb(100);

        assert_eq!(session.admit("a.mp4".into(), 60 * MB), Admission::Accepted);
        assert_eq!(session.admit("b.mp4".into(), 60 * MB), Admission::RejectedQuota);

        assert_eq!(session.accumulated_bytes(), 60 * MB);
        assert_eq!(session.remaining_bytes(), 40 * MB);
        assert_eq!(session.downloaded_paths(), &[PathBuf::from("a.mp4")]);
    }

    #[test]
    fn filling_the_cap_exactly_is_allowed() {
        let mut session = BackupSession::from_cap_mb(100);

        assert_eq!(session.admit("a.mp4".into(), 40 * MB), Admission::Accepted);
        assert_eq!(session.admit("b.mp4".into(), 60 * MB), Admission::Accepted);
        assert_eq!(session.remaining_bytes(), 0);
        assert_eq!(session.admit("c.mp4".into(), 1), Admission::RejectedQuota);
    }

    #[test]
    fn overflowing_sizes_are_rejected() {
        let mut session = BackupSession::new(u64::MAX);
        assert_eq!(session.admit("a".into(), u64::MAX), Admission::Accepted);
        assert_eq!(session.admit("b".into(), 1), Admission::RejectedQuota);
        assert_eq!(session.into_downloaded().len(), 1);
    }

    #[test]
    fn same_path_is_counted_once() {
        let mut session = BackupSession::from_cap_mb(100);

        assert_eq!(session.admit("Song.mp4".into(), 60 * MB), Admission::Accepted);
        assert_eq!(session.admit("Song.mp4".into(), 60 * MB), Admission::AlreadyHeld);
        assert_eq!(session.accumulated_bytes(), 60 * MB);
        assert_eq!(session.downloaded_paths().len(), 1);
    }
}
