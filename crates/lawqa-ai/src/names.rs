//! Standardized-name variants for organisation names.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use lawqa_core::RetryPolicy;
use lawqa_core::text::push_unique;

use crate::parse::request_json;
use crate::{AiError, CompletionService, Message};

/// Proposes plausible standardized spellings of an organisation name:
/// added or corrected province/city qualifiers, fixed misspellings.
#[async_trait]
pub trait NameNormalizer: Send + Sync {
    async fn variants(&self, name: &str) -> Result<Vec<String>, AiError>;
}

const VARIANTS_PROMPT: &str = "\
[任务描述]
你的任务是对给定的机构名称进行标准化和扩展。请补充可能缺少的省份、城市或区县信息，并纠正可能存在的错别字或不规范表述。

[示例]
输入: 漳州中级人民法院
输出:
```json
[\"福建省漳州市中级人民法院\", \"漳州市中级人民法院\", \"福建漳州中级人民法院\"]
```

[输出要求]
名称应从最详细到相对简略排序。返回一个JSON数组，包含3个标准化后的名称字符串。

[输入]: {name}
[输出]: ";

/// Name variants requested from the completion service, capped at `max`.
pub struct LlmNameNormalizer {
    service: Arc<dyn CompletionService>,
    retry: RetryPolicy<AiError>,
    max: usize,
}

impl LlmNameNormalizer {
    pub fn new(service: Arc<dyn CompletionService>, retry: RetryPolicy<AiError>, max: usize) -> Self {
        Self { service, retry, max }
    }
}

#[async_trait]
impl NameNormalizer for LlmNameNormalizer {
    async fn variants(&self, name: &str) -> Result<Vec<String>, AiError> {
        let prompt = VARIANTS_PROMPT.replace("{name}", name);
        let raw: Vec<serde_json::Value> = request_json(
            self.service.as_ref(),
            &[Message::user(prompt)],
            None,
            &self.retry,
            "name variants",
        )
        .await?;

        let mut out = Vec::new();
        for v in raw {
            if let Some(s) = v.as_str().map(str::trim)
                && !s.is_empty()
            {
                push_unique(&mut out, s.to_string());
            }
            if out.len() >= self.max {
                break;
            }
        }
        debug!(name, variants = ?out, "name variants");
        Ok(out)
    }
}

/// Fixed variant table, for tests and runs without a completion service.
#[derive(Default)]
pub struct FixedNames {
    table: HashMap<String, Vec<String>>,
}

impl FixedNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, variants: &[&str]) -> Self {
        self.table
            .insert(name.to_string(), variants.iter().map(|s| s.to_string()).collect());
        self
    }
}

#[async_trait]
impl NameNormalizer for FixedNames {
    async fn variants(&self, name: &str) -> Result<Vec<String>, AiError> {
        Ok(self.table.get(name).cloned().unwrap_or_default())
    }
}
