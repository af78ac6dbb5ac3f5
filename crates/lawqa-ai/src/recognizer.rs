//! Mention recognition through the completion service.
//!
//! The service is a noisy black box: spans may overlap, carry extra fields
//! or hold placeholder text. Output is returned raw for
//! [`lawqa_core::filter_mentions`] to clean up.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use lawqa_core::{MentionKind, RetryPolicy};

use crate::parse::request_json;
use crate::{AiError, CompletionService, Message};

const RECOGNITION_PROMPT: &str = "\
[命名实体类型]
{kinds}

[注意事项]
* 案号中间如果有法院名称，请单独把法院名称识别出来
* 允许实体之间的重叠，不要完全分割识别
* 尽可能识别完整的实体名称

[问题]
{question}

[任务]
根据 **命名实体类型** 和 **注意事项**，针对 **问题** 识别出所有的命名实体。
保持 **问题** 中的原文，不要做修改。只识别 **命名实体类型** 的类型。
按照以下格式输出一个json列表:
```json
[{\"type\": \"命名实体类型\", \"content\": \"识别出的实体内容\"}]
```";

pub struct MentionRecognizer {
    service: Arc<dyn CompletionService>,
    retry: RetryPolicy<AiError>,
}

impl MentionRecognizer {
    pub fn new(service: Arc<dyn CompletionService>, retry: RetryPolicy<AiError>) -> Self {
        Self { service, retry }
    }

    /// Raw mention objects for `question`. A non-list reply yields nothing.
    pub async fn recognize(&self, question: &str) -> Result<Vec<Value>, AiError> {
        let kinds = MentionKind::ALL
            .iter()
            .map(|k| format!("* {}: {}", k.label(), k.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = RECOGNITION_PROMPT
            .replace("{kinds}", &kinds)
            .replace("{question}", question);

        let reply: Value = request_json(
            self.service.as_ref(),
            &[Message::user(prompt)],
            None,
            &self.retry,
            "recognize",
        )
        .await?;

        let raw = match reply {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        info!(count = raw.len(), "recognized mentions");
        Ok(raw)
    }
}
