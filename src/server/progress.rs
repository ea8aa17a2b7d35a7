//! yt-dlp download progress, one line per update

use super::formats::{format_duration, format_size};

/// Marker that starts every progress line we ask yt-dlp for
pub const PROGRESS_PREFIX: &str = "vidfetch-progress";

/// Passed to `--progress-template`; fields are raw numbers or `NA`
pub const PROGRESS_TEMPLATE: &str = "download:vidfetch-progress %(progress.status)s \
%(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s \
%(progress.speed)s %(progress.eta)s";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub status: ProgressStatus,
    pub downloaded: f64,
    pub total: Option<f64>,
    pub speed: Option<f64>,
    pub eta_secs: Option<u64>,
}

fn number(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

impl DownloadProgress {
    /// Parse one stdout line; anything that isn't ours yields `None`
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim().split_whitespace();
        if fields.next()? != PROGRESS_PREFIX {
            return None;
        }

        let status = match fields.next()? {
            "downloading" => ProgressStatus::Downloading,
            "finished" => ProgressStatus::Finished,
            _ => return None,
        };
        let downloaded = number(fields.next()?).unwrap_or(0.0);
        let total = number(fields.next()?);
        let estimate = number(fields.next()?);
        let speed = number(fields.next()?).filter(|s| *s > 0.0);
        let eta_secs = number(fields.next()?).filter(|e| *e > 0.0).map(|e| e as u64);

        Some(Self {
            status,
            downloaded,
            total: total.or(estimate).filter(|t| *t > 0.0),
            speed,
            eta_secs,
        })
    }

    pub fn percent(&self) -> Option<f64> {
        self.total.map(|t| (self.downloaded / t * 100.0).min(100.0))
    }

    /// Log line, e.g. `45.3% | 4.5 MB/10.0 MB | speed 1.2 MB/s | eta 0m5s`
    pub fn describe(&self) -> String {
        if self.status == ProgressStatus::Finished {
            return "Download finished, processing...".to_string();
        }

        let speed = self
            .speed
            .map(|s| format!("{}/s", format_size(s)))
            .unwrap_or_else(|| "N/A".to_string());
        let eta = self
            .eta_secs
            .map(format_duration)
            .unwrap_or_else(|| "N/A".to_string());

        match (self.percent(), self.total) {
            (Some(percent), Some(total)) => format!(
                "{:.1}% | {}/{} | speed {} | eta {}",
                percent,
                format_size(self.downloaded),
                format_size(total),
                speed,
                eta
            ),
            _ => format!("{} | speed {}", format_size(self.downloaded), speed),
        }
    }
}
