// yt-dlp driver
//
// Two-step download:
// 1. `--dump-json` to read the stream catalog (size-limited policy only)
// 2. the real download with the chosen `-f` selector, streaming stdout to
//    track progress and the final merged file path

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;

use super::errors::DownloadError;
use super::format_selector::{FormatSelector, UNCONSTRAINED_FORMAT_SPEC};
use super::models::{parse_catalog, EncodedStream, FormatPolicy};
use super::traits::VideoDownloader;
use super::utils::{find_ytdlp, locate_output, remove_partial_outputs, run_output_with_timeout};
use crate::backup::models::Video;
use crate::config::YtDlpConfig;

lazy_static::lazy_static! {
    static ref PROGRESS_RE: Regex = Regex::new(
        r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*\s*\w+)(?:\s+at\s+(\S+))?(?:\s+ETA\s+(\S+))?"
    ).unwrap();
    static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)$").unwrap();
    static ref MERGE_RE: Regex = Regex::new(r#"\[Merger\]\s+Merging formats into\s+"(.+)"$"#).unwrap();
    static ref ALREADY_RE: Regex = Regex::new(r"\[download\]\s+(.+?)\s+has already been downloaded").unwrap();
}

/// Parsed `[download] 12.5% of ~310.04MiB at 374.36KiB/s ETA 11:59` line
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    pub percent: f32,
    pub total: String,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

pub fn parse_progress(line: &str) -> Option<ProgressLine> {
    let caps = PROGRESS_RE.captures(line)?;
    Some(ProgressLine {
        percent: caps.get(1)?.as_str().parse().ok()?,
        total: caps.get(2)?.as_str().to_string(),
        speed: caps.get(3).map(|m| m.as_str().to_string()),
        eta: caps.get(4).map(|m| m.as_str().to_string()),
    })
}

/// Follows yt-dlp stdout to learn where the final file landed
#[derive(Debug, Default)]
pub struct OutputTracker {
    merged: Option<PathBuf>,
    existing: Option<PathBuf>,
    destination: Option<PathBuf>,
}

impl OutputTracker {
    pub fn observe(&mut self, line: &str) {
        if let Some(caps) = MERGE_RE.captures(line) {
            self.merged = Some(PathBuf::from(&caps[1]));
        } else if let Some(caps) = ALREADY_RE.captures(line) {
            self.existing = Some(PathBuf::from(&caps[1]));
        } else if let Some(caps) = DEST_RE.captures(line) {
            self.destination = Some(PathBuf::from(caps[1].trim()));
        }
    }

    /// Merged output wins over a pre-existing file, which wins over the
    /// last single-format destination
    pub fn resolved(&self) -> Option<&Path> {
        self.merged
            .as_deref()
            .or(self.existing.as_deref())
            .or(self.destination.as_deref())
    }
}

pub struct YtDlpDownloader {
    ytdlp_path: String,
    config: YtDlpConfig,
}

impl YtDlpDownloader {
    pub fn new(config: YtDlpConfig) -> Self {
        let ytdlp_path = config.binary.clone().unwrap_or_else(find_ytdlp);
        Self { ytdlp_path, config }
    }

    /// Cookie, proxy and timeout flags shared by both steps
    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.config.socket_timeout_secs.to_string(),
        ];

        if let Some(path) = &self.config.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.display().to_string());
        } else if let Some(browser) = &self.config.cookies_from_browser {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.clone());
        }

        if let Some(proxy) = &self.config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args
    }

    /// Read the stream catalog without downloading
    pub async fn fetch_catalog(&self, url: &str) -> Result<Vec<EncodedStream>, DownloadError> {
        let mut args = vec!["--dump-json".to_string()];
        args.extend(self.common_args());
        args.push(url.to_string());

        tracing::debug!(binary = %self.ytdlp_path, url, "extracting stream catalog");

        let output =
            run_output_with_timeout(&self.ytdlp_path, args, self.config.info_timeout_secs).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::from(stderr.trim().to_string()));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

        parse_catalog(&json)
    }

    async fn resolve_format_spec(
        &self,
        url: &str,
        policy: FormatPolicy,
    ) -> Result<String, DownloadError> {
        match policy {
            FormatPolicy::Unconstrained => Ok(UNCONSTRAINED_FORMAT_SPEC.to_string()),
            FormatPolicy::SizeLimited { budget_bytes } => {
                let catalog = self.fetch_catalog(url).await?;
                match FormatSelector::select_within_budget(&catalog, budget_bytes) {
                    Some(choice) => {
                        tracing::info!(
                            format = %choice.format_spec(),
                            estimated_bytes = choice.total_bytes,
                            "selected streams"
                        );
                        Ok(choice.format_spec())
                    }
                    None => {
                        tracing::warn!(
                            budget_mb = budget_bytes / (1024 * 1024),
                            "no available formats are below the size limit"
                        );
                        Err(DownloadError::NoFeasibleFormat { budget_bytes })
                    }
                }
            }
        }
    }

    async fn run_download(
        &self,
        url: &str,
        format_spec: &str,
        dest_dir: &Path,
        stem: &str,
    ) -> Result<PathBuf, DownloadError> {
        let mut args = vec![
            "-f".to_string(),
            format_spec.to_string(),
            "--newline".to_string(),
            "--no-update".to_string(),
            "--retries".to_string(),
            "5".to_string(),
            "--fragment-retries".to_string(),
            "50".to_string(),
            "-P".to_string(),
            dest_dir.display().to_string(),
            "-o".to_string(),
            format!("{}.%(ext)s", stem),
        ];
        args.extend(self.common_args());
        args.push(url.to_string());

        tracing::debug!(binary = %self.ytdlp_path, args = %args.join(" "), "starting yt-dlp");

        let mut child = TokioCommand::new(&self.ytdlp_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DownloadError::ToolNotFound(self.ytdlp_path.clone()),
                _ => DownloadError::ExecutionError(format!("Failed to start yt-dlp: {}", e)),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut tracker = OutputTracker::default();
        let mut last_logged_decile = -1i32;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(progress) = parse_progress(&line) {
                let decile = (progress.percent / 10.0) as i32;
                if decile > last_logged_decile {
                    last_logged_decile = decile;
                    tracing::debug!(
                        percent = progress.percent,
                        total = %progress.total,
                        speed = progress.speed.as_deref().unwrap_or("?"),
                        eta = progress.eta.as_deref().unwrap_or("?"),
                        "download progress"
                    );
                }
                continue;
            }
            if line.starts_with("[download] Destination") {
                last_logged_decile = -1;
            }
            tracker.observe(&line);
        }

        let status = child.wait().await?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(DownloadError::from(stderr_output.trim().to_string()));
        }

        if let Some(path) = tracker.resolved() {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Ok(path.to_path_buf());
            }
        }

        locate_output(dest_dir, stem)
            .await?
            .ok_or_else(|| DownloadError::OutputMissing {
                stem: stem.to_string(),
                dir: dest_dir.to_path_buf(),
            })
    }
}

#[async_trait]
impl VideoDownloader for YtDlpDownloader {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn download(
        &self,
        video: &Video,
        dest_dir: &Path,
        policy: FormatPolicy,
    ) -> Result<PathBuf, DownloadError> {
        let url = video.watch_url();

        let result = match self.resolve_format_spec(&url, policy).await {
            Ok(spec) => self.run_download(&url, &spec, dest_dir, &video.title).await,
            Err(e) => Err(e),
        };

        if result.is_err() {
            let removed = remove_partial_outputs(dest_dir, &video.title).await;
            if removed > 0 {
                tracing::debug!(title = %video.title, removed, "removed partial download files");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progress_line() {
        let line = "[download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59 (frag 56/454)";
        let progress = parse_progress(line).unwrap();
        assert_eq!(progress.percent, 12.5);
        assert_eq!(progress.total, "310.04MiB");
        assert_eq!(progress.speed.as_deref(), Some("374.36KiB/s"));
        assert_eq!(progress.eta.as_deref(), Some("11:59"));
    }

    #[test]
    fn non_progress_line_is_ignored() {
        assert!(parse_progress("[youtube] abc: Downloading webpage").is_none());
    }

    #[test]
    fn tracker_prefers_merged_output() {
        let mut tracker = OutputTracker::default();
        tracker.observe("[download] Destination: downloads/Clip.f137.mp4");
        tracker.observe("[download] Destination: downloads/Clip.f140.m4a");
        tracker.observe(r#"[Merger] Merging formats into "downloads/Clip.mp4""#);
        tracker.observe("Deleting original file downloads/Clip.f137.mp4 (pass -k to keep)");

        assert_eq!(tracker.resolved(), Some(Path::new("downloads/Clip.mp4")));
    }

    #[test]
    fn tracker_reports_already_downloaded_file() {
        let mut tracker = OutputTracker::default();
        tracker.observe("[download] downloads/Clip (1).mkv has already been downloaded");

        assert_eq!(tracker.resolved(), Some(Path::new("downloads/Clip (1).mkv")));
    }

    #[test]
    fn tracker_falls_back_to_single_destination() {
        let mut tracker = OutputTracker::default();
        tracker.observe("[download] Destination: downloads/Clip.webm");

        assert_eq!(tracker.resolved(), Some(Path::new("downloads/Clip.webm")));
    }

    #[test]
    fn common_args_include_cookies_and_proxy() {
        let config = YtDlpConfig {
            binary: Some("/bin/yt-dlp".to_string()),
            cookies_path: Some(PathBuf::from("cookies.txt")),
            cookies_from_browser: Some("chrome".to_string()),
            proxy: Some("socks5://127.0.0.1:1080".to_string()),
            ..YtDlpConfig::default()
        };
        let downloader = YtDlpDownloader::new(config);
        let args = downloader.common_args();

        assert!(args.windows(2).any(|w| w[0] == "--cookies" && w[1] == "cookies.txt"));
        // cookie file takes precedence over browser cookies
        assert!(!args.iter().any(|a| a == "--cookies-from-browser"));
        assert!(args.windows(2).any(|w| w[0] == "--proxy" && w[1] == "socks5://127.0.0.1:1080"));
        assert_eq!(downloader.ytdlp_path, "/bin/yt-dlp");
    }

    #[cfg(unix)]
    mod with_fake_binary {
        use super::*;
        use crate::downloader::FormatPolicy;
        use serde_json::json;
        use std::os::unix::fs::PermissionsExt;

        const MB: u64 = 1024 * 1024;

        // Logs argv, answers --dump-json from a file, otherwise runs __MODE__
        // with $dir (-P) and $stem (-o minus ".%(ext)s") set
        const SCRIPT: &str = r#"#!/bin/sh
printf '%s\n' "$@" >> '__LOG__'
echo '---' >> '__LOG__'
for arg in "$@"; do
  if [ "$arg" = "--dump-json" ]; then
    cat '__CATALOG__'
    exit 0
  fi
done
dir=""
out=""
prev=""
for arg in "$@"; do
  case "$prev" in
    -P) dir="$arg" ;;
    -o) out="$arg" ;;
  esac
  prev="$arg"
done
stem=$(printf '%s' "$out" | sed 's/\.%(ext)s$//')
__MODE__
"#;

        const SUCCEED: &str = r#"printf 'media' > "$dir/$stem.mp4"
echo "[download] Destination: $dir/$stem.mp4"
exit 0"#;

        const FAIL: &str = r#": > "$dir/$stem.f137.mp4.part"
echo "ERROR: unable to download video data" >&2
exit 1"#;

        struct FakeYtDlp {
            root: tempfile::TempDir,
        }

        impl FakeYtDlp {
            fn new(mode: &str) -> Self {
                let root = tempfile::tempdir().unwrap();
                let catalog = json!({
                    "id": "abc",
                    "formats": [
                        {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none",
                         "height": 1080, "filesize": 900 * MB},
                        {"format_id": "136", "ext": "mp4", "vcodec": "avc1.4d401f", "acodec": "none",
                         "height": 720, "filesize": 90 * MB},
                        {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2",
                         "abr": 129.5, "filesize": 5 * MB}
                    ]
                });
                std::fs::write(root.path().join("catalog.json"), catalog.to_string()).unwrap();
                std::fs::create_dir(root.path().join("staging")).unwrap();

                let script = SCRIPT
                    .replace("__LOG__", &root.path().join("argv.log").display().to_string())
                    .replace("__CATALOG__", &root.path().join("catalog.json").display().to_string())
                    .replace("__MODE__", mode);
                let bin = root.path().join("yt-dlp");
                std::fs::write(&bin, script).unwrap();
                std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

                Self { root }
            }

            fn downloader(&self) -> YtDlpDownloader {
                YtDlpDownloader::new(YtDlpConfig {
                    binary: Some(self.root.path().join("yt-dlp").display().to_string()),
                    ..YtDlpConfig::default()
                })
            }

            fn staging(&self) -> PathBuf {
                self.root.path().join("staging")
            }

            /// argv of every run, in order
            fn invocations(&self) -> Vec<Vec<String>> {
                let log = std::fs::read_to_string(self.root.path().join("argv.log")).unwrap_or_default();
                log.split("---\n")
                    .filter(|run| !run.is_empty())
                    .map(|run| run.lines().map(str::to_string).collect())
                    .collect()
            }
        }

        fn format_arg(argv: &[String]) -> Option<&str> {
            argv.windows(2)
                .find(|w| w[0] == "-f")
                .map(|w| w[1].as_str())
        }

        #[tokio::test]
        async fn selected_pair_is_passed_as_format() {
            let fake = FakeYtDlp::new(SUCCEED);
            let video = Video::from_raw("abc", "Clip");

            let path = fake
                .downloader()
                .download(&video, &fake.staging(), FormatPolicy::SizeLimited { budget_bytes: 100 * MB })
                .await
                .unwrap();

            assert_eq!(path, fake.staging().join("Clip.mp4"));
            let runs = fake.invocations();
            assert_eq!(runs.len(), 2);
            assert!(runs[0].iter().any(|a| a == "--dump-json"));
            assert!(runs[0].iter().any(|a| a == "https://www.youtube.com/watch?v=abc"));
            assert_eq!(format_arg(&runs[1]), Some("136+140"));
            assert!(runs[1].iter().any(|a| a == "Clip.%(ext)s"));
        }

        #[tokio::test]
        async fn infeasible_catalog_never_starts_download() {
            let fake = FakeYtDlp::new(SUCCEED);
            let video = Video::from_raw("abc", "Clip");

            let err = fake
                .downloader()
                .download(&video, &fake.staging(), FormatPolicy::SizeLimited { budget_bytes: MB })
                .await
                .unwrap_err();

            assert!(matches!(err, DownloadError::NoFeasibleFormat { budget_bytes } if budget_bytes == MB));
            assert_eq!(fake.invocations().len(), 1);
            assert!(!fake.staging().join("Clip.mp4").exists());
        }

        #[tokio::test]
        async fn unconstrained_policy_skips_catalog() {
            let fake = FakeYtDlp::new(SUCCEED);
            let video = Video::from_raw("abc", "Clip");

            fake.downloader()
                .download(&video, &fake.staging(), FormatPolicy::Unconstrained)
                .await
                .unwrap();

            let runs = fake.invocations();
            assert_eq!(runs.len(), 1);
            assert!(!runs[0].iter().any(|a| a == "--dump-json"));
            assert_eq!(format_arg(&runs[0]), Some(UNCONSTRAINED_FORMAT_SPEC));
        }

        #[tokio::test]
        async fn failed_run_cleans_only_its_own_leftovers() {
            let fake = FakeYtDlp::new(FAIL);
            std::fs::write(fake.staging().join("Part 1.5.mp4"), "accepted earlier").unwrap();
            let video = Video::from_raw("p1", "Part 1");

            let result = fake
                .downloader()
                .download(&video, &fake.staging(), FormatPolicy::Unconstrained)
                .await;

            assert!(result.is_err());
            assert!(!fake.staging().join("Part 1.f137.mp4.part").exists());
            assert!(fake.staging().join("Part 1.5.mp4").exists());
        }
    }
}
