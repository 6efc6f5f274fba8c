use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacaoWatchError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Weather provider error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, CacaoWatchError>;

/// Failure talking to the weather provider.
///
/// Kept separate from [`CacaoWatchError`] so the orchestrator can inspect the
/// kind (for retry decisions) and clone it into state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Network(_) | TransportError::Timeout => true,
            TransportError::Status { status, .. } => *status >= 500 || *status == 429,
            TransportError::Malformed(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::Malformed(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds() {
        assert!(TransportError::Timeout.is_transient());
        assert!(TransportError::Network("reset".into()).is_transient());
        assert!(TransportError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(TransportError::Status {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(!TransportError::Status {
            status: 404,
            body: String::new()
        }
        .is_transient());
        assert!(!TransportError::Malformed("bad".into()).is_transient());
    }
}
