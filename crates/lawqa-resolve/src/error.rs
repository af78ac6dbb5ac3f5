use thiserror::Error;

use lawqa_ai::AiError;
use lawqa_store::StoreError;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("registry lookup failed: {0}")]
    Store(#[from] StoreError),

    #[error("completion service failed: {0}")]
    Ai(#[from] AiError),
}

impl ResolveError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Ai(e) => e.is_retryable(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Ai(e) if e.is_fatal())
    }
}
