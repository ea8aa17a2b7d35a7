use std::time::Duration;
use thiserror::Error;

/// Failures talking to the download service from the form side.
///
/// None of these reach the user verbatim; the form shows a generic
/// network message and the detail only goes to the log.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url '{url}': {source}")]
    InvalidServerUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("response body is not a download summary: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures from the yt-dlp driver behind the download service.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", .after.as_secs())]
    Timeout { program: String, after: Duration },

    #[error("{0}")]
    Failed(String),

    #[error("yt-dlp returned invalid JSON: {0}")]
    BadJson(#[from] serde_json::Error),

    #[error("no video info returned")]
    NoInfo,

    #[error("could not prepare download directory: {0}")]
    Io(#[from] std::io::Error),
}
