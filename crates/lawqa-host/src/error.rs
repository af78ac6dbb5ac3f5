use lawqa_ai::AiError;
use lawqa_core::RetryError;
use lawqa_resolve::ResolveError;
use lawqa_store::StoreError;
use thiserror::Error;

use crate::sandbox::SandboxError;
use crate::tools::ToolError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// Generated code was structurally broken; synthesize afresh.
    #[error("synthesized code is malformed: {0}")]
    SynthesisMalformed(String),
    /// A retried stage gave up.
    #[error("{stage} gave up after {attempts} attempts: {last}")]
    RetryExhausted {
        stage: &'static str,
        attempts: u32,
        last: Box<PipelineError>,
    },
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ai(e) => e.is_retryable(),
            Self::Store(e) => e.is_retryable(),
            Self::Resolve(e) => e.is_retryable(),
            Self::Sandbox(e) => e.is_retryable(),
            Self::Tool(ToolError::Store(e)) => e.is_retryable(),
            Self::Tool(_) => false,
            Self::SynthesisMalformed(_) => true,
            Self::RetryExhausted { .. } => false,
        }
    }

    /// Billing exhausted: the whole batch must stop.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Ai(e) => e.is_fatal(),
            Self::Resolve(e) => e.is_fatal(),
            Self::RetryExhausted { last, .. } => last.is_fatal(),
            _ => false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }
}

impl PipelineError {
    /// Flatten a retry outcome: aborted errors pass through unchanged.
    pub(crate) fn from_retry<E>(stage: &'static str, err: RetryError<E>) -> Self
    where
        E: std::error::Error + Into<PipelineError> + 'static,
    {
        match err {
            RetryError::Exhausted { attempts, last } => Self::RetryExhausted {
                stage,
                attempts,
                last: Box::new(last.into()),
            },
            RetryError::Aborted(e) => e.into(),
        }
    }
}
