//! Deterministic fakes shared by unit tests.

use crate::knowledge::{EmbeddingError, EmbeddingProvider};
use crate::llm::traits::{
    ChatConfig, ChatResponse, LlmError, LlmProvider, ProviderType, Tool, ToolCall, Usage,
};
use crate::types::Messages;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const KEYWORDS: &[&str] = &["big mac", "whopper", "fries"];

/// Embeds text as keyword presence over the menu item names
#[derive(Debug, Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
    fail_after: Option<usize>,
}

impl KeywordEmbedder {
    /// Succeed for the first `calls` embed calls, then fail with a network error
    pub fn failing_after(calls: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_after: Some(calls),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| call >= limit) {
            return Err(EmbeddingError::Provider(LlmError::NetworkError {
                message: "embedding service unreachable".to_string(),
                source: None,
            }));
        }

        Ok(texts
            .iter()
            .map(|text| {
                let text = text.to_lowercase();
                KEYWORDS
                    .iter()
                    .map(|kw| if text.contains(kw) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect())
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

/// Replays canned chat responses in order and records every request
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    requests: Mutex<Vec<(Messages, Vec<Tool>)>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<ChatResponse, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(Messages, Vec<Tool>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(
        &self,
        model_id: &str,
        messages: &Messages,
        config: &ChatConfig,
    ) -> Result<ChatResponse, LlmError> {
        self.chat_with_tools(model_id, messages, &[], config).await
    }

    async fn chat_with_tools(
        &self,
        _model_id: &str,
        messages: &Messages,
        tools: &[Tool],
        _config: &ChatConfig,
    ) -> Result<ChatResponse, LlmError> {
        self.requests
            .lock()
            .unwrap()
            .push((messages.clone(), tools.to_vec()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::ConfigurationError {
                    message: "scripted provider ran out of responses".to_string(),
                })
            })
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAiCompatible
    }
}

/// A text-only model answer
pub fn text_response(content: &str) -> Result<ChatResponse, LlmError> {
    Ok(ChatResponse {
        content: content.to_string(),
        usage: Some(Usage::new(10, 5)),
        ..Default::default()
    })
}

/// A model turn requesting one tool call
pub fn tool_call_response(id: &str, name: &str, input: serde_json::Value) -> Result<ChatResponse, LlmError> {
    Ok(ChatResponse {
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }],
        usage: Some(Usage::new(10, 2)),
        ..Default::default()
    })
}
