//! Sandbox adapter: executes synthesized code in an interpreter session.
//!
//! The interpreter holds bindings between calls, so one session must never
//! run two snippets at once. [`SerializedSandbox`] enforces that with an
//! async mutex: a caller waiting for the session suspends only its own task.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::tools::ToolError;

/// Error name the sandbox reports when the code itself could not be run.
pub const RUN_CODE_EXCEPTION: &str = "RunCodeException";

/// Marker of structurally broken code in an error value.
pub const INDENTATION_ERROR: &str = "IndentationError";

/// Result of one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxOutcome {
    pub success: bool,
    /// Captured standard output.
    #[serde(default)]
    pub result: String,
    #[serde(default, rename = "ename")]
    pub error_name: String,
    #[serde(default, rename = "evalue")]
    pub error_value: String,
    #[serde(default)]
    pub traceback: String,
}

impl SandboxOutcome {
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: result.into(),
            ..Default::default()
        }
    }

    pub fn failed(
        result: impl Into<String>,
        error_name: impl Into<String>,
        error_value: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            result: result.into(),
            error_name: error_name.into(),
            error_value: error_value.into(),
            traceback: String::new(),
        }
    }

    /// The code could not be run at all because it is misindented.
    pub fn is_structural(&self) -> bool {
        !self.success
            && self.error_name == RUN_CODE_EXCEPTION
            && self.error_value.contains(INDENTATION_ERROR)
    }

    /// Error taxonomy block shown to the repair prompt.
    pub fn error_description(&self) -> String {
        format!(
            "Error Name: {}\nError Value: {}\nTraceback:\n{}",
            self.error_name, self.error_value, self.traceback
        )
    }
}

impl From<&ToolError> for SandboxOutcome {
    /// A rejected tool call as the sandbox reports it to the code.
    fn from(err: &ToolError) -> Self {
        let (name, value) = err.taxonomy();
        Self::failed("", name, value)
    }
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sandbox returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("{0}")]
    Other(String),
}

impl SandboxError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Server { status, .. } => *status >= 500,
            Self::Other(_) => false,
        }
    }
}

/// `execute(code, preserve_context) -> outcome`.
///
/// `preserve_context = false` resets bindings before running `code`.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute(&self, code: &str, preserve_context: bool) -> Result<SandboxOutcome, SandboxError>;
}

/// Hands out one sandbox session per question.
pub trait SandboxProvider: Send + Sync {
    fn session(&self, question_id: &str) -> Arc<dyn Sandbox>;
}

/// Serializes executions against one session.
pub struct SerializedSandbox<S> {
    inner: Mutex<S>,
}

impl<S: Sandbox> SerializedSandbox<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }
}

#[async_trait]
impl<S: Sandbox> Sandbox for SerializedSandbox<S> {
    async fn execute(&self, code: &str, preserve_context: bool) -> Result<SandboxOutcome, SandboxError> {
        let session = self.inner.lock().await;
        session.execute(code, preserve_context).await
    }
}

// ── HTTP sandbox ──

/// Client for a remote interpreter service posting to
/// `{base_url}/sessions/{session}/execute`.
#[derive(Clone)]
pub struct HttpSandbox {
    client: reqwest::Client,
    base_url: String,
    session: String,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    code: &'a str,
    preserve_context: bool,
}

impl HttpSandbox {
    pub fn new(base_url: String, session: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    fn url(&self) -> String {
        format!("{}/sessions/{}/execute", self.base_url, self.session)
    }
}

#[async_trait]
impl Sandbox for HttpSandbox {
    async fn execute(&self, code: &str, preserve_context: bool) -> Result<SandboxOutcome, SandboxError> {
        let url = self.url();
        debug!(url = %url, bytes = code.len(), preserve_context, "sandbox execute");
        let resp = self
            .client
            .post(&url)
            .json(&ExecuteRequest {
                code,
                preserve_context,
            })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SandboxError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}

/// [`SandboxProvider`] over an HTTP interpreter service.
pub struct HttpSandboxProvider {
    base_url: String,
}

impl HttpSandboxProvider {
    pub fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

impl SandboxProvider for HttpSandboxProvider {
    fn session(&self, question_id: &str) -> Arc<dyn Sandbox> {
        Arc::new(SerializedSandbox::new(HttpSandbox::new(
            self.base_url.clone(),
            question_id.to_string(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails if two executions overlap.
    struct Exclusive {
        active: AtomicUsize,
    }

    #[async_trait]
    impl Sandbox for Exclusive {
        async fn execute(&self, code: &str, _: bool) -> Result<SandboxOutcome, SandboxError> {
            if self.active.fetch_add(1, Ordering::SeqCst) != 0 {
                return Err(SandboxError::Other("overlapping execution".into()));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(SandboxOutcome::ok(code))
        }
    }

    #[tokio::test]
    async fn serialized_sandbox_never_overlaps() {
        let sandbox = Arc::new(SerializedSandbox::new(Exclusive {
            active: AtomicUsize::new(0),
        }));
        let mut handles = Vec::new();
        for i in 0..8 {
            let sandbox = Arc::clone(&sandbox);
            handles.push(tokio::spawn(async move {
                sandbox.execute(&format!("print({i})"), true).await
            }));
        }
        for h in handles {
            assert!(h.await.unwrap().unwrap().success);
        }
    }

    #[test]
    fn outcome_wire_names() {
        let outcome: SandboxOutcome = serde_json::from_str(
            r#"{"success": false, "result": "", "ename": "RunCodeException", "evalue": "IndentationError: unexpected indent", "traceback": ""}"#,
        )
        .unwrap();
        assert!(outcome.is_structural());
        assert_eq!(outcome.error_name, RUN_CODE_EXCEPTION);
        assert!(outcome.error_description().starts_with("Error Name: RunCodeException\n"));
    }

    #[test]
    fn indentation_in_a_runtime_message_is_repairable() {
        let outcome = SandboxOutcome::failed("", "ValueError", "bad literal: IndentationError");
        assert!(!outcome.is_structural());
        let outcome = SandboxOutcome::failed("", RUN_CODE_EXCEPTION, "NameError: name 'x' is not defined");
        assert!(!outcome.is_structural());
        assert!(SandboxOutcome::failed("", RUN_CODE_EXCEPTION, "IndentationError: unexpected indent").is_structural());
    }

    #[test]
    fn session_url() {
        let sandbox = HttpSandbox::new("http://sandbox:8888/".into(), "q42".into());
        assert_eq!(sandbox.url(), "http://sandbox:8888/sessions/q42/execute");
    }
}
