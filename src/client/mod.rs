//! HTTP side of the form: `POST /download` against the download service

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::ClientError;
use crate::form::{DownloadApi, DownloadRequest, SubmitOutcome, VideoSummary};

/// Path of the download endpoint on the service
pub const DOWNLOAD_PATH: &str = "/download";

pub struct HttpDownloadApi {
    client: Client,
    endpoint: Url,
}

impl HttpDownloadApi {
    /// `server_url` is the service base, e.g. `http://127.0.0.1:5000`
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let raw = format!("{}{}", server_url.trim_end_matches('/'), DOWNLOAD_PATH);
        let endpoint = Url::parse(&raw).map_err(|source| ClientError::InvalidServerUrl {
            url: server_url.to_string(),
            source,
        })?;

        Ok(Self {
            client: Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send the request and turn the reply into an outcome.
    ///
    /// The body is parsed as JSON whatever the status; a body that isn't
    /// JSON is a decode error even on a failure status.
    async fn post(&self, request: &DownloadRequest) -> Result<SubmitOutcome, ClientError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if status.is_success() {
            let summary: VideoSummary = serde_json::from_value(body)?;
            return Ok(SubmitOutcome::Downloaded(summary));
        }

        let error = body
            .get("error")
            .and_then(|e| e.as_str())
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        Ok(SubmitOutcome::Rejected {
            status: status.as_u16(),
            error,
        })
    }
}

#[async_trait]
impl DownloadApi for HttpDownloadApi {
    async fn download(&self, request: &DownloadRequest) -> SubmitOutcome {
        match self.post(request).await {
            Ok(outcome) => outcome,
            Err(e) => SubmitOutcome::Unreachable(e.to_string()),
        }
    }
}
