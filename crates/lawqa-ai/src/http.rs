//! OpenAI-compatible chat-completion client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AiError, CompletionService, Message};

/// Provider billing codes that mean the account has run out of credit.
const BALANCE_MARKERS: [&str; 2] = ["Arrearage", "insufficient_quota"];

/// Chat-completion client posting to `{base_url}/chat/completions`.
#[derive(Clone)]
pub struct HttpCompletion {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

impl HttpCompletion {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Map a non-success status and body onto the error taxonomy.
fn classify(status: u16, body: String) -> AiError {
    if status == 402 || BALANCE_MARKERS.iter().any(|m| body.contains(m)) {
        AiError::BalanceDepleted(body)
    } else if status == 429 {
        AiError::RateLimited(body)
    } else {
        AiError::Server { status, body }
    }
}

#[async_trait]
impl CompletionService for HttpCompletion {
    async fn complete(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
    ) -> Result<Message, AiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens,
        };

        debug!(url = %url, model = %self.model, messages = messages.len(), "completion request");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify(status.as_u16(), body));
        }

        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| AiError::malformed("a choice", "completion returned no choices"))
    }
}
