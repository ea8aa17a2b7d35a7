use serde::Deserialize;

/// yt-dlp selector used when no mp4 format has a usable height
pub const DEFAULT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

/// The parts of `yt-dlp --dump-single-json` we look at
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    /// Seconds; yt-dlp reports it as a float for some extractors
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub formats: Vec<FormatEntry>,
}

impl VideoInfo {
    pub fn duration_text(&self) -> String {
        self.duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| format_duration(d.round() as u64))
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatEntry {
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub filesize: Option<f64>,
    #[serde(default)]
    pub filesize_approx: Option<f64>,
}

impl FormatEntry {
    fn size_bytes(&self) -> Option<f64> {
        self.filesize.or(self.filesize_approx)
    }
}

/// What the service reports and downloads for one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatChoice {
    pub quality: String,
    pub size: String,
    pub selector: String,
}

impl FormatChoice {
    pub fn for_video(info: &VideoInfo, target_height: u32) -> Self {
        match find_best_format(&info.formats, target_height) {
            Some(format) => {
                let height = format.height.unwrap_or_default();
                let id = format.format_id.as_deref().unwrap_or_default();
                Self {
                    quality: format!("{}p", height),
                    size: format
                        .size_bytes()
                        .map(format_size)
                        .unwrap_or_else(|| "Unknown".to_string()),
                    // Fall back to the video-only stream when no m4a audio exists
                    selector: if id.is_empty() {
                        DEFAULT_SELECTOR.to_string()
                    } else {
                        format!("{id}+bestaudio[ext=m4a]/{id}")
                    },
                }
            }
            None => Self {
                quality: "Default quality".to_string(),
                size: "Unknown".to_string(),
                selector: DEFAULT_SELECTOR.to_string(),
            },
        }
    }
}

/// Human-readable size, base 1024, one decimal
pub fn format_size(bytes: f64) -> String {
    let mut value = bytes;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} TB", value)
}

/// Minutes and seconds, e.g. `1m1s`; hours fold into the minutes
pub fn format_duration(secs: u64) -> String {
    format!("{}m{}s", secs / 60, secs % 60)
}

/// The mp4 format whose height is closest to `target_height`.
///
/// Formats without a height are skipped. On a tie the earlier entry wins.
pub fn find_best_format(formats: &[FormatEntry], target_height: u32) -> Option<&FormatEntry> {
    formats
        .iter()
        .filter(|f| f.ext.as_deref() == Some("mp4"))
        .filter_map(|f| f.height.filter(|h| *h > 0).map(|h| (f, h.abs_diff(target_height))))
        .min_by_key(|(_, distance)| *distance)
        .map(|(f, _)| f)
}
