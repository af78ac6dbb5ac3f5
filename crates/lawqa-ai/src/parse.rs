//! Extraction of fenced JSON and code blocks from completion text.

use serde::de::DeserializeOwned;
use tracing::debug;

use lawqa_core::RetryPolicy;

use crate::{AiError, CompletionService, Message};

/// Body of the first ```` ```lang ```` block, or of the first bare fence when
/// no block carries the tag.
pub fn fenced_block<'a>(text: &'a str, lang: &str) -> Option<&'a str> {
    let tagged = format!("```{lang}");
    let start = match text.find(&tagged) {
        Some(i) => i + tagged.len(),
        None => text.find("```")? + 3,
    };
    let rest = &text[start..];
    // Skip the remainder of the opening fence line.
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &rest[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    Some(&body[..end])
}

/// Parse a JSON value from completion text: a fenced `json` block when
/// present, otherwise the outermost `{...}` or `[...]` span.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, AiError> {
    let candidate = match fenced_block(text, "json") {
        Some(block) => block.trim(),
        None => bare_json(text).ok_or_else(|| AiError::malformed("json", truncate(text)))?,
    };
    serde_json::from_str(candidate).map_err(|e| AiError::malformed("json", e.to_string()))
}

/// Code from a fenced `python` block; unfenced text is taken as code as is.
pub fn parse_code(text: &str) -> Result<String, AiError> {
    let code = fenced_block(text, "python").unwrap_or(text);
    if code.trim().is_empty() {
        return Err(AiError::malformed("python", truncate(text)));
    }
    Ok(code.trim_end().to_string())
}

/// Request a completion and parse a JSON value out of it. Malformed
/// responses re-issue the whole request under `retry`.
pub async fn request_json<T: DeserializeOwned>(
    service: &dyn CompletionService,
    messages: &[Message],
    max_tokens: Option<u32>,
    retry: &RetryPolicy<AiError>,
    what: &str,
) -> Result<T, AiError> {
    retry
        .run(what, move || async move {
            let reply = service.complete(messages, max_tokens).await?;
            debug!(what, reply = %reply.content, "completion reply");
            parse_json(&reply.content)
        })
        .await
        .map_err(|e| e.into_inner())
}

fn bare_json(text: &str) -> Option<&str> {
    let open = text.find(['{', '['])?;
    let close_char = if text[open..].starts_with('{') { '}' } else { ']' };
    let close = text.rfind(close_char)?;
    (close > open).then(|| &text[open..=close])
}

fn truncate(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReplayCompletion;
    use serde_json::Value;
    use std::time::Duration;

    #[test]
    fn extracts_tagged_json_block() {
        let text = "好的：\n```json\n[{\"type\": \"公司名称\", \"content\": \"航天机电\"}]\n```\n完毕";
        let v: Value = parse_json(text).unwrap();
        assert_eq!(v[0]["content"], "航天机电");
    }

    #[test]
    fn falls_back_to_bare_json() {
        let v: Vec<String> = parse_json("输出: [\"a\", \"b\"] 以上").unwrap();
        assert_eq!(v, vec!["a", "b"]);
        assert!(parse_json::<Value>("没有结果").is_err());
    }

    #[test]
    fn extracts_python_block() {
        let text = "```python\nprint(1)\n```";
        assert_eq!(parse_code(text).unwrap(), "print(1)");
        assert_eq!(parse_code("x = 1\nprint(x)\n").unwrap(), "x = 1\nprint(x)");
        assert!(parse_code("```python\n\n```").is_err());
    }

    #[test]
    fn bare_fence_without_tag() {
        assert_eq!(fenced_block("```\n{}\n```", "json"), Some("{}\n"));
    }

    #[tokio::test]
    async fn malformed_reply_reissues_request() {
        let replay = ReplayCompletion::new(["不是json", "```json\n{\"ok\": true}\n```"]);
        let retry = RetryPolicy::new(3, Duration::ZERO, AiError::is_retryable);
        let v: Value = request_json(&replay, &[Message::user("q")], None, &retry, "test")
            .await
            .unwrap();
        assert_eq!(v["ok"], true);
        assert_eq!(replay.requests().len(), 2);
    }
}
