//! Download form controller.
//!
//! The controller keeps no UI state of its own. Every read and write of the
//! five form elements (URL input, download button, status line, progress
//! indicator, info panel) goes through a [`FormView`], and the network
//! round-trip goes through a [`DownloadApi`]. The terminal app and the
//! headless `--url` mode both submit through here.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Shown when the URL field is empty or whitespace
pub const EMPTY_URL_MESSAGE: &str = "Please enter a video link";
/// Status line text while a request is outstanding
pub const IN_PROGRESS_MESSAGE: &str = "Fetching video info...";
/// Shown when the service rejects a request without saying why
pub const FALLBACK_ERROR_MESSAGE: &str = "Download failed";
/// Shown when the service can't be reached or answers garbage
pub const NETWORK_ERROR_MESSAGE: &str = "Network error, please try again later";

fn unknown() -> String {
    "Unknown".to_string()
}

/// Strings pass through, `null` reads as "Unknown", numbers and the like
/// are shown as their JSON text
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => unknown(),
        other => other.to_string(),
    })
}

/// Body of `POST /download`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
}

/// What the service reports for a finished download.
///
/// Missing, null or non-string fields degrade to text rather than failing
/// the whole response; only the status code decides success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSummary {
    #[serde(default = "unknown", deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default = "unknown", deserialize_with = "lenient_text")]
    pub quality: String,
    #[serde(default = "unknown", deserialize_with = "lenient_text")]
    pub size: String,
}

/// Result of one round-trip to the download service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 2xx with a summary body
    Downloaded(VideoSummary),
    /// Non-2xx; `error` is the service's message when it sent one
    Rejected { status: u16, error: Option<String> },
    /// Transport or decode failure, detail is for the log only
    Unreachable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Success,
    Error,
}

/// Contents of the info panel.
///
/// Lines are plain text. Renderers must draw them literally; nothing
/// coming back from the service is ever interpreted as markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoPanel {
    pub kind: PanelKind,
    pub lines: Vec<String>,
}

impl InfoPanel {
    pub fn success(summary: &VideoSummary) -> Self {
        Self {
            kind: PanelKind::Success,
            lines: vec![
                "Download complete!".to_string(),
                format!("Title: {}", summary.title),
                format!("Quality: {}", summary.quality),
                format!("Size: {}", summary.size),
            ],
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: PanelKind::Error,
            lines: vec![message.into()],
        }
    }

    /// Panel for a finished round-trip
    pub fn for_outcome(outcome: &SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Downloaded(summary) => Self::success(summary),
            SubmitOutcome::Rejected { error, .. } => {
                Self::error(error.as_deref().unwrap_or(FALLBACK_ERROR_MESSAGE))
            }
            SubmitOutcome::Unreachable(_) => Self::error(NETWORK_ERROR_MESSAGE),
        }
    }
}

/// The form elements the controller drives
pub trait FormView {
    fn url_value(&self) -> String;
    fn clear_url(&mut self);
    /// Enables or disables both the URL input and the download button
    fn set_controls_enabled(&mut self, enabled: bool);
    fn set_progress_visible(&mut self, visible: bool);
    fn set_status(&mut self, text: &str);
    fn show_info(&mut self, panel: InfoPanel);
    fn hide_info(&mut self);
}

/// One `POST /download` round-trip
#[async_trait]
pub trait DownloadApi: Send + Sync {
    async fn download(&self, request: &DownloadRequest) -> SubmitOutcome;
}

/// First half of a submission.
///
/// Validates the URL field and, when it holds something, puts the form into
/// its busy state and returns the request to send. An empty field only gets
/// the inline error; the controls and the field itself are left alone.
pub fn begin(view: &mut dyn FormView) -> Option<DownloadRequest> {
    let url = view.url_value().trim().to_string();
    if url.is_empty() {
        view.show_info(InfoPanel::error(EMPTY_URL_MESSAGE));
        return None;
    }

    view.set_controls_enabled(false);
    view.set_progress_visible(true);
    view.hide_info();
    view.set_status(IN_PROGRESS_MESSAGE);

    Some(DownloadRequest { url })
}

/// Second half of a submission: render the outcome, then reset the form.
///
/// Must run exactly once for every request [`begin`] handed out.
pub fn finish(view: &mut dyn FormView, outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Downloaded(summary) => {
            tracing::info!("Downloaded '{}' ({}, {})", summary.title, summary.quality, summary.size);
        }
        SubmitOutcome::Rejected { status, error } => {
            tracing::info!("Download rejected with {}: {:?}", status, error);
        }
        SubmitOutcome::Unreachable(detail) => {
            tracing::warn!("Download service unreachable: {}", detail);
        }
    }
    view.show_info(InfoPanel::for_outcome(outcome));

    view.set_controls_enabled(true);
    view.set_progress_visible(false);
    view.set_status("");
    view.clear_url();
}

/// Binds the form to a download service
#[derive(Clone)]
pub struct FormController {
    api: Arc<dyn DownloadApi>,
}

impl FormController {
    pub fn new(api: Arc<dyn DownloadApi>) -> Self {
        Self { api }
    }

    /// Run a whole submission in place, waiting for the service.
    ///
    /// Returns `None` when the URL field failed validation.
    pub async fn submit(&self, view: &mut dyn FormView) -> Option<SubmitOutcome> {
        let request = begin(view)?;
        let outcome = self.api.download(&request).await;
        finish(view, &outcome);
        Some(outcome)
    }

    /// Send `request` on a background task.
    ///
    /// The caller keeps its event loop running and hands the received
    /// outcome to [`finish`].
    pub fn dispatch(&self, request: DownloadRequest) -> oneshot::Receiver<SubmitOutcome> {
        let (tx, rx) = oneshot::channel();
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            tracing::debug!("Submitting {}", request.url);
            let outcome = api.download(&request).await;
            // Receiver gone means the app is shutting down
            let _ = tx.send(outcome);
        });
        rx
    }
}
