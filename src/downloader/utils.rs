// Helper functions for the yt-dlp driver

use std::path::{Path, PathBuf};
use std::process::Stdio;

use regex::Regex;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};

use super::errors::DownloadError;

lazy_static::lazy_static! {
    // What yt-dlp may append to "<stem>": ".mp4", ".f137.mp4", ".temp.mp4",
    // ".mp4.part", ".f137.mp4.part-Frag12.part", ".mp4.ytdl"
    static ref STEM_SUFFIX_RE: Regex = Regex::new(
        r"^\.(?:f\d+\.)?(?:temp\.)?[A-Za-z0-9]+(?:\.part(?:-Frag\d+(?:\.part)?)?|\.ytdl)?$"
    ).unwrap();
}

/// Run command with timeout, capturing stdout and stderr
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DownloadError::ToolNotFound(program.to_string()),
            _ => DownloadError::ExecutionError(format!("Failed to start {}: {}", program, e)),
        })?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        DownloadError::ExecutionError(format!("Failed to capture stdout from {}", program))
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        DownloadError::ExecutionError(format!("Failed to capture stderr from {}", program))
    })?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status) => {
            let status = status?;
            let stdout = join_pipe(stdout_task).await?;
            let stderr = join_pipe(stderr_task).await?;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::NetworkTimeout)
        }
    }
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::ExecutionError(format!("pipe reader failed: {}", e)))?
        .map_err(DownloadError::Io)
}

/// Find yt-dlp binary
pub fn find_ytdlp() -> String {
    let common_paths = [
        "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
        "/usr/local/bin/yt-dlp",    // Homebrew on Intel Mac
        "/usr/bin/yt-dlp",          // System installation
    ];

    for path in common_paths {
        if Path::new(path).exists() {
            return path.to_string();
        }
    }

    // Rely on PATH lookup at spawn time
    "yt-dlp".to_string()
}

/// True when `file_name` is an output or artifact yt-dlp writes for `stem`.
///
/// "Part 1.5.mp4" does not belong to "Part 1": after the stem only a single
/// extension, optionally wrapped in yt-dlp's format/temp/part markers, may
/// follow.
pub fn belongs_to_stem(file_name: &str, stem: &str) -> bool {
    file_name
        .strip_prefix(stem)
        .map_or(false, |rest| STEM_SUFFIX_RE.is_match(rest))
}

/// Staging files yt-dlp wrote for `stem`
pub async fn entries_with_stem(dir: &Path, stem: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if belongs_to_stem(&name.to_string_lossy(), stem) && entry.file_type().await?.is_file() {
            found.push(entry.path());
        }
    }

    found.sort();
    Ok(found)
}

/// Final media file for `stem`, ignoring yt-dlp's intermediate artifacts
pub async fn locate_output(dir: &Path, stem: &str) -> std::io::Result<Option<PathBuf>> {
    let candidates = entries_with_stem(dir, stem).await?;
    Ok(candidates.into_iter().find(|p| !is_intermediate(p, stem)))
}

/// Remove leftovers of a failed attempt (.part, .ytdl, per-format files)
pub async fn remove_partial_outputs(dir: &Path, stem: &str) -> usize {
    let Ok(leftovers) = entries_with_stem(dir, stem).await else {
        return 0;
    };

    let mut removed = 0;
    for path in leftovers {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove leftover"),
        }
    }
    removed
}

// "<stem>.f137.mp4", "<stem>.mp4.part", "<stem>.temp.mp4" and friends
fn is_intermediate(path: &Path, stem: &str) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return true;
    };
    let rest = &name[stem.len().min(name.len())..];

    rest.ends_with(".part")
        || rest.ends_with(".ytdl")
        || rest.contains(".part-Frag")
        || rest.starts_with(".temp.")
        || rest
            .strip_prefix(".f")
            .map_or(false, |r| r.chars().next().map_or(false, |c| c.is_ascii_digit()))
}
