use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use url::Url;

use super::formats::VideoInfo;
use super::progress::{DownloadProgress, ProgressStatus, PROGRESS_TEMPLATE};
use crate::error::BackendError;

/// Metadata fetches that take longer than this are abandoned
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(180);

/// Whatever resolves and fetches videos for the service
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Metadata for `url`; `None` when the extractor found nothing
    async fn probe(&self, url: &str) -> Result<Option<VideoInfo>, BackendError>;

    /// Download `url` with the given format selector
    async fn fetch(&self, url: &str, selector: &str) -> Result<(), BackendError>;
}

/// Drives the yt-dlp executable
pub struct YtDlp {
    program: String,
    download_dir: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<String>, download_dir: PathBuf) -> Self {
        Self {
            program: program.into(),
            download_dir,
        }
    }

    fn output_template(&self) -> String {
        self.download_dir
            .join("%(title)s.%(ext)s")
            .to_string_lossy()
            .into_owned()
    }

    async fn run(&self, args: &[String], limit: Option<Duration>) -> Result<std::process::Output, BackendError> {
        tracing::debug!("Running {} {:?}", self.program, args);

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackendError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = match limit {
            Some(after) => timeout(after, child.wait_with_output())
                .await
                .map_err(|_| BackendError::Timeout {
                    program: self.program.clone(),
                    after,
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| BackendError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Failed(error_detail(&stderr)));
        }
        Ok(output)
    }

    /// Like `run`, but reads stdout line by line and logs download progress
    async fn run_with_progress(&self, args: &[String]) -> Result<(), BackendError> {
        tracing::debug!("Running {} {:?}", self.program, args);

        let spawn_error = |source| BackendError::Spawn {
            program: self.program.clone(),
            source,
        };
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        // Drain stderr alongside stdout so neither pipe fills up
        let stderr_reader = child.stderr.take().map(|pipe| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let mut lines = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    buf.push_str(&line);
                    buf.push('\n');
                }
                buf
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut log = ProgressLog::default();
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(progress) = DownloadProgress::parse(&line) {
                    log.record(&progress);
                }
            }
        }

        let status = child.wait().await.map_err(spawn_error)?;
        let stderr = match stderr_reader {
            Some(reader) => reader.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(BackendError::Failed(error_detail(&stderr)));
        }
        Ok(())
    }
}

/// Keeps progress logging to one info line per tenth of the download
#[derive(Debug, Default)]
struct ProgressLog {
    last_step: Option<u32>,
}

impl ProgressLog {
    /// Returns whether the update was logged at info level
    fn record(&mut self, progress: &DownloadProgress) -> bool {
        let step = match progress.status {
            ProgressStatus::Finished => {
                // Video and audio streams each finish; start counting again
                self.last_step = None;
                tracing::info!("{}", progress.describe());
                return true;
            }
            ProgressStatus::Downloading => progress.percent().map(|p| (p / 10.0) as u32),
        };

        match step {
            Some(step) if self.last_step.map_or(true, |last| step > last) => {
                self.last_step = Some(step);
                tracing::info!("{}", progress.describe());
                true
            }
            _ => {
                tracing::debug!("{}", progress.describe());
                false
            }
        }
    }
}

#[async_trait]
impl VideoBackend for YtDlp {
    async fn probe(&self, url: &str) -> Result<Option<VideoInfo>, BackendError> {
        let args = vec![
            "--dump-single-json".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--skip-download".to_string(),
            url.to_string(),
        ];
        let output = self.run(&args, Some(PROBE_TIMEOUT)).await?;
        parse_probe_output(&output.stdout)
    }

    async fn fetch(&self, url: &str, selector: &str) -> Result<(), BackendError> {
        tokio::fs::create_dir_all(&self.download_dir).await?;

        let args = vec![
            "-f".to_string(),
            selector.to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "-o".to_string(),
            self.output_template(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            url.to_string(),
        ];
        // Downloads run as long as they need
        self.run_with_progress(&args).await?;
        tracing::info!("Saved {} into {}", url, self.download_dir.display());
        Ok(())
    }
}

/// `null` or empty stdout means the extractor gave up quietly
fn parse_probe_output(stdout: &[u8]) -> Result<Option<VideoInfo>, BackendError> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() || text == "null" {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

/// Most useful line of yt-dlp's stderr: the last `ERROR:` line, else the
/// whole (truncated) output
fn error_detail(stderr: &str) -> String {
    let last_error = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.to_lowercase().starts_with("error"));

    match last_error {
        Some(line) => line
            .strip_prefix("ERROR: ")
            .or_else(|| line.strip_prefix("ERROR:"))
            .unwrap_or(line)
            .to_string(),
        None => {
            let trimmed = stderr.trim();
            if trimmed.is_empty() {
                "yt-dlp exited with an error".to_string()
            } else {
                trimmed.chars().take(300).collect()
            }
        }
    }
}

/// Rewrite `youtu.be/<id>` short links to the full watch url.
///
/// Everything else, including urls that don't parse, passes through.
pub fn normalize_url(raw: &str) -> String {
    let parsed = match Url::parse(raw) {
        Ok(parsed) => parsed,
        // Pasted without a scheme, e.g. `youtu.be/abc123?t=4`
        Err(_) if has_short_host_prefix(raw) => match Url::parse(&format!("https://{raw}")) {
            Ok(parsed) => parsed,
            Err(_) => return raw.to_string(),
        },
        Err(_) => return raw.to_string(),
    };
    let is_short = parsed
        .host_str()
        .map(|h| h.eq_ignore_ascii_case("youtu.be") || h.eq_ignore_ascii_case("www.youtu.be"))
        .unwrap_or(false);
    if !is_short {
        return raw.to_string();
    }

    match parsed.path_segments().and_then(|mut s| s.find(|seg| !seg.is_empty())) {
        Some(id) => format!("https://www.youtube.com/watch?v={}", id),
        None => raw.to_string(),
    }
}

fn has_short_host_prefix(raw: &str) -> bool {
    let lower = raw.trim_start().to_ascii_lowercase();
    lower.starts_with("youtu.be/") || lower.starts_with("www.youtu.be/")
}
