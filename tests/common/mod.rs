//! Fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use menu_agent::knowledge::{EmbeddingError, EmbeddingProvider};
use menu_agent::llm::{ChatConfig, ChatResponse, LlmError, LlmProvider, ProviderType, Tool, ToolCall, Usage};
use menu_agent::Messages;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const MENU_KEYWORDS: &[&str] = &["big mac", "whopper", "fries"];

/// One vector axis per menu item; a text scores 1.0 on every item it names
pub fn keyword_vector(text: &str) -> Vec<f32> {
    let text = text.to_lowercase();
    MENU_KEYWORDS
        .iter()
        .map(|kw| if text.contains(kw) { 1.0 } else { 0.0 })
        .collect()
}

#[derive(Debug, Default)]
pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }

    fn model(&self) -> &str {
        "keyword"
    }
}

/// Plays back chat responses and records what the engine sent
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<ChatResponse>>,
    seen: Mutex<Vec<(Messages, Vec<Tool>)>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<ChatResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<(Messages, Vec<Tool>)> {
        self.seen.lock().unwrap().clone()
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
        self.seen
            .lock()
            .unwrap()
            .push((messages.clone(), tools.to_vec()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::ConfigurationError {
                message: "script exhausted".to_string(),
            })
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAiCompatible
    }
}

pub fn say(text: &str) -> ChatResponse {
    ChatResponse {
        content: text.to_string(),
        usage: Some(Usage::new(20, 10)),
        ..Default::default()
    }
}

pub fn call(id: &str, name: &str, input: Value) -> ChatResponse {
    ChatResponse {
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }],
        usage: Some(Usage::new(20, 5)),
        ..Default::default()
    }
}

/// Text of the tool turn answering `tool_use_id`
pub fn tool_output(conversation: &Messages, tool_use_id: &str) -> Option<String> {
    conversation.iter().find_map(|msg| {
        msg.content.iter().find_map(|block| match block {
            menu_agent::ContentBlock::ToolResult {
                tool_use_id: id,
                content,
                ..
            } if id == tool_use_id => Some(content.clone()),
            _ => None,
        })
    })
}
