//! Completion-service layer: the chat trait, HTTP and replay clients,
//! fenced-block parsing, mention recognition and name variants.

mod error;
pub use error::AiError;

pub mod http;
mod message;
pub mod names;
pub mod parse;
pub mod recognizer;
pub mod replay;

pub use http::HttpCompletion;
pub use message::{Message, Role};
pub use names::{FixedNames, LlmNameNormalizer, NameNormalizer};
pub use parse::{parse_code, parse_json, request_json};
pub use recognizer::MentionRecognizer;
pub use replay::ReplayCompletion;

use async_trait::async_trait;

/// `complete(messages, max_tokens?) -> message`.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
    ) -> Result<Message, AiError>;
}
