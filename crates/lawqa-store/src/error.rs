use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("registry JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected registry payload from {table}: {detail}")]
    Payload { table: String, detail: String },

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Transient failures worth another attempt: network errors, timeouts,
    /// rate limiting and 5xx responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            Self::Json(_) | Self::Payload { .. } | Self::Other(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_5xx_are_retryable() {
        let err = StoreError::Server {
            status: 429,
            body: String::new(),
        };
        assert!(err.is_retryable());
        let err = StoreError::Server {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_retryable());
        let err = StoreError::Server {
            status: 401,
            body: "bad token".into(),
        };
        assert!(!err.is_retryable());
        assert!(!StoreError::Other("x".into()).is_retryable());
    }
}
