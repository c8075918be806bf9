use thiserror::Error;

/// Why a poll tick produced no snapshot.
///
/// Every variant is non-fatal: the poller logs it and waits for the next tick.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (connect failure, timeout, ...).
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// The body was not the JSON shape this endpoint promises.
    #[error("malformed {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// The body decoded but violates a reading invariant.
    #[error("invalid {endpoint} reading: {reason}")]
    Invalid { endpoint: String, reason: String },

    /// The source cannot serve this endpoint at all.
    #[error("endpoint {0} is not served by this source")]
    Unsupported(String),
}

impl FetchError {
    /// Build an [`FetchError::Invalid`] for `endpoint`.
    pub fn invalid(endpoint: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }

    /// Short label for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::Decode { .. } => "decode",
            Self::Invalid { .. } => "invalid",
            Self::Unsupported(_) => "unsupported",
        }
    }
}
