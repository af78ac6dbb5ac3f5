//! Scripted completion service for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{AiError, CompletionService, Message};

/// Returns queued responses in order and records every request.
///
/// A response may also be routed by a substring of the last message, so
/// concurrent stages can share one instance without depending on call order.
#[derive(Default)]
pub struct ReplayCompletion {
    queue: Mutex<VecDeque<String>>,
    routes: Vec<(String, String)>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ReplayCompletion {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: Mutex::new(responses.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Answer any request whose last message contains `needle` with `response`.
    /// Routes are checked before the queue, first match wins.
    pub fn route(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.routes.push((needle.into(), response.into()));
        self
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionService for ReplayCompletion {
    async fn complete(
        &self,
        messages: &[Message],
        _max_tokens: Option<u32>,
    ) -> Result<Message, AiError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(messages.to_vec());
        }

        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        if let Some((_, response)) = self.routes.iter().find(|(needle, _)| prompt.contains(needle)) {
            return Ok(Message::assistant(response.clone()));
        }

        let next = self
            .queue
            .lock()
            .map_err(|_| AiError::Other("replay queue poisoned".into()))?
            .pop_front();
        next.map(Message::assistant)
            .ok_or_else(|| AiError::Other("replay script exhausted".into()))
    }
}
