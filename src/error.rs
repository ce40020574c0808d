use thiserror::Error;

/// Failures surfaced by the backend client and the page pipeline.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request path {path}: {source}")]
    InvalidUrl {
        path: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("backend rejected request: {0}")]
    Rejected(String),

    #[error("{kind} response (generation {generation}) superseded by generation {latest}")]
    Superseded {
        kind: &'static str,
        generation: u64,
        latest: u64,
    },
}

impl FetchError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. })
    }
}
