//! The download service the form posts to

pub mod formats;
pub mod progress;
pub mod ytdlp;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::client::DOWNLOAD_PATH;
use crate::config::AppConfig;
use crate::error::BackendError;
use crate::form::EMPTY_URL_MESSAGE;
use formats::FormatChoice;
use ytdlp::{normalize_url, VideoBackend, YtDlp};

pub struct ServerState {
    pub backend: Arc<dyn VideoBackend>,
    pub target_height: u32,
}

#[derive(Debug, Deserialize)]
struct DownloadBody {
    #[serde(default)]
    url: Option<String>,
}

/// Body of a successful `POST /download`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadReport {
    pub success: bool,
    pub message: String,
    pub title: String,
    pub quality: String,
    pub size: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorReport {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorReport { error: message.into() })).into_response()
}

/// Status and user-facing message for a failed download
pub fn classify_failure(error: &BackendError) -> (StatusCode, String) {
    if matches!(error, BackendError::NoInfo) {
        return (StatusCode::BAD_REQUEST, "Unable to fetch video info".to_string());
    }

    let detail = error.to_string();
    if detail.contains("Video unavailable") {
        (
            StatusCode::BAD_REQUEST,
            "Video is unavailable or has been removed".to_string(),
        )
    } else if detail.contains("Unable to extract") {
        (
            StatusCode::BAD_REQUEST,
            "Unable to parse video info, please check the link".to_string(),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Download error: {}", detail),
        )
    }
}

/// Probe, pick a format, download
async fn download_video(state: &ServerState, url: &str) -> Result<DownloadReport, BackendError> {
    let info = state.backend.probe(url).await?.ok_or(BackendError::NoInfo)?;
    let choice = FormatChoice::for_video(&info, state.target_height);
    tracing::info!(
        "Selected {} ({}) for {}, duration {}",
        choice.quality,
        choice.selector,
        url,
        info.duration_text()
    );

    state.backend.fetch(url, &choice.selector).await?;

    Ok(DownloadReport {
        success: true,
        message: "Download complete".to_string(),
        title: info.title.unwrap_or_else(|| "Unknown".to_string()),
        quality: choice.quality,
        size: choice.size,
    })
}

async fn healthz() -> &'static str {
    "ok"
}

async fn download(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<DownloadBody>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::warn!("Rejected download body: {}", rejection);
            return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    let url = body.url.as_deref().map(str::trim).unwrap_or_default();
    if url.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, EMPTY_URL_MESSAGE);
    }

    let url = normalize_url(url);
    tracing::info!("Download requested: {}", url);

    match download_video(&state, &url).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            tracing::warn!("Download of {} failed: {}", url, e);
            let (status, message) = classify_failure(&e);
            error_response(status, message)
        }
    }
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(DOWNLOAD_PATH, post(download))
        .with_state(state)
}

/// Run the service until the process is stopped
pub async fn serve(config: &AppConfig) -> Result<()> {
    let download_dir = config.download_dir();
    std::fs::create_dir_all(&download_dir)
        .with_context(|| format!("Could not create {}", download_dir.display()))?;

    let state = Arc::new(ServerState {
        backend: Arc::new(YtDlp::new(config.ytdlp_path.clone(), download_dir.clone())),
        target_height: config.target_height,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Could not bind {}", config.bind_addr))?;
    tracing::info!(
        "Download service listening on {}, saving to {}",
        listener.local_addr()?,
        download_dir.display()
    );

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::formats::{FormatEntry, VideoInfo, DEFAULT_SELECTOR};
    use super::*;
    use async_trait::async_trait;
    use axum::{body, body::Body, http::Request};
    use std::sync::Mutex;
    use tower::ServiceExt;

    enum Probe {
        Info(VideoInfo),
        Nothing,
        Fail(&'static str),
    }

    struct FakeBackend {
        probe: Probe,
        fetch_error: Option<&'static str>,
        probed: Mutex<Vec<String>>,
        fetched: Mutex<Vec<(String, String)>>,
    }

    impl FakeBackend {
        fn new(probe: Probe) -> Arc<Self> {
            Arc::new(Self {
                probe,
                fetch_error: None,
                probed: Mutex::new(Vec::new()),
                fetched: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl VideoBackend for FakeBackend {
        async fn probe(&self, url: &str) -> Result<Option<VideoInfo>, BackendError> {
            self.probed.lock().unwrap().push(url.to_string());
            match &self.probe {
                Probe::Info(info) => Ok(Some(info.clone())),
                Probe::Nothing => Ok(None),
                Probe::Fail(msg) => Err(BackendError::Failed(msg.to_string())),
            }
        }

        async fn fetch(&self, url: &str, selector: &str) -> Result<(), BackendError> {
            self.fetched
                .lock()
                .unwrap()
                .push((url.to_string(), selector.to_string()));
            match self.fetch_error {
                Some(msg) => Err(BackendError::Failed(msg.to_string())),
                None => Ok(()),
            }
        }
    }

    fn app(backend: Arc<FakeBackend>) -> Router {
        build_router(Arc::new(ServerState {
            backend,
            target_height: 720,
        }))
    }

    fn clip() -> VideoInfo {
        VideoInfo {
            title: Some("Clip".to_string()),
            duration: Some(61.0),
            formats: vec![
                FormatEntry {
                    format_id: Some("22".to_string()),
                    ext: Some("mp4".to_string()),
                    height: Some(720),
                    filesize: Some(2.0 * 1024.0 * 1024.0),
                    filesize_approx: None,
                },
                FormatEntry {
                    format_id: Some("37".to_string()),
                    ext: Some("mp4".to_string()),
                    height: Some(1080),
                    filesize: None,
                    filesize_approx: None,
                },
            ],
        }
    }

    async fn post_download(app: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::post(DOWNLOAD_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let app = app(FakeBackend::new(Probe::Nothing));
        let request = Request::get("/healthz").body(Body::empty()).expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn download_reports_selected_format() {
        let backend = FakeBackend::new(Probe::Info(clip()));
        let (status, body) =
            post_download(app(backend.clone()), serde_json::json!({ "url": "https://example.com/v" })).await;

        assert_eq!(status, StatusCode::OK);
        let report: DownloadReport = serde_json::from_value(body).expect("report");
        assert_eq!(
            report,
            DownloadReport {
                success: true,
                message: "Download complete".to_string(),
                title: "Clip".to_string(),
                quality: "720p".to_string(),
                size: "2.0 MB".to_string(),
            }
        );
        let fetched = backend.fetched.lock().unwrap();
        assert_eq!(
            fetched.as_slice(),
            &[(
                "https://example.com/v".to_string(),
                "22+bestaudio[ext=m4a]/22".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn download_without_mp4_uses_default_selector() {
        let backend = FakeBackend::new(Probe::Info(VideoInfo::default()));
        let (status, body) =
            post_download(app(backend.clone()), serde_json::json!({ "url": "https://example.com/v" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Unknown");
        assert_eq!(body["quality"], "Default quality");
        assert_eq!(body["size"], "Unknown");
        assert_eq!(backend.fetched.lock().unwrap()[0].1, DEFAULT_SELECTOR);
    }

    #[tokio::test]
    async fn short_links_are_expanded_before_probing() {
        let backend = FakeBackend::new(Probe::Info(clip()));
        post_download(app(backend.clone()), serde_json::json!({ "url": "https://youtu.be/abc123?t=4" })).await;

        assert_eq!(
            backend.probed.lock().unwrap().as_slice(),
            &["https://www.youtube.com/watch?v=abc123".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_or_blank_url_is_rejected() {
        for body in [serde_json::json!({}), serde_json::json!({ "url": "  " })] {
            let backend = FakeBackend::new(Probe::Info(clip()));
            let (status, reply) = post_download(app(backend.clone()), body).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(reply["error"], EMPTY_URL_MESSAGE);
            assert!(backend.probed.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn malformed_body_gets_json_error() {
        let request = Request::post(DOWNLOAD_PATH)
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let response = app(FakeBackend::new(Probe::Nothing))
            .oneshot(request)
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let reply: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(reply["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn no_info_is_a_client_error() {
        let (status, reply) = post_download(
            app(FakeBackend::new(Probe::Nothing)),
            serde_json::json!({ "url": "https://example.com/v" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["error"], "Unable to fetch video info");
    }

    #[tokio::test]
    async fn extractor_failures_are_classified() {
        let cases = [
            (
                "[youtube] abc: Video unavailable",
                StatusCode::BAD_REQUEST,
                "Video is unavailable or has been removed",
            ),
            (
                "[generic] Unable to extract title",
                StatusCode::BAD_REQUEST,
                "Unable to parse video info, please check the link",
            ),
            (
                "HTTP Error 503",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Download error: HTTP Error 503",
            ),
        ];

        for (detail, expected_status, expected_message) in cases {
            let (status, reply) = post_download(
                app(FakeBackend::new(Probe::Fail(detail))),
                serde_json::json!({ "url": "https://example.com/v" }),
            )
            .await;
            assert_eq!(status, expected_status);
            assert_eq!(reply["error"], expected_message);
        }
    }

    #[tokio::test]
    async fn fetch_failure_is_reported() {
        let backend = Arc::new(FakeBackend {
            probe: Probe::Info(clip()),
            fetch_error: Some("ffmpeg not found"),
            probed: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        });
        let (status, reply) =
            post_download(app(backend), serde_json::json!({ "url": "https://example.com/v" })).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply["error"], "Download error: ffmpeg not found");
    }
}
