use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by product API (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The API answered with `success: false`.
    #[error("product API error: {0}")]
    Api(String),

    #[error("invalid API base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    /// The request was superseded by a newer one and cancelled.
    #[error("request superseded by a newer request")]
    Aborted,
}

impl ClientError {
    /// Superseded requests are expected during typing and navigation and
    /// are not reported to the user.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, ClientError::Aborted)
    }
}
