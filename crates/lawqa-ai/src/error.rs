use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion service returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("completion JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("account balance depleted: {0}")]
    BalanceDepleted(String),

    #[error("malformed completion, expected {expected}: {detail}")]
    Malformed {
        expected: &'static str,
        detail: String,
    },

    #[error("{0}")]
    Other(String),
}

impl AiError {
    /// Transient failures: network errors, 5xx, rate limiting and responses
    /// that did not contain the expected structured block.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::Server { status, .. } => *status >= 500,
            Self::Json(_) | Self::RateLimited(_) | Self::Malformed { .. } => true,
            Self::BalanceDepleted(_) | Self::Other(_) => false,
        }
    }

    /// Billing exhaustion halts the whole batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BalanceDepleted(_))
    }

    pub(crate) fn malformed(expected: &'static str, detail: impl Into<String>) -> Self {
        Self::Malformed {
            expected,
            detail: detail.into(),
        }
    }
}
