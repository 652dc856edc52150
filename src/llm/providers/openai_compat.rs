//! OpenAI-compatible chat completion provider.
//!
//! Talks to any server implementing `POST /chat/completions` in the OpenAI dialect.
//! The default base URL is Gemini's OpenAI-compatible endpoint, authenticated with a
//! bearer API key.

use crate::llm::providers::retry::{retry_llm_operation, BoxFuture, RetryConfig};
use crate::llm::traits::{
    ChatConfig, ChatResponse, LlmError, LlmProvider, ProviderType, Tool, ToolCall, Usage,
};
use crate::types::{ContentBlock, Messages};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Instant;

/// Gemini's OpenAI-compatible API root
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// OpenAI-compatible provider
///
/// Transient failures (connection errors, 429, 5xx) are retried with exponential
/// backoff according to the provider's [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    retry_config: RetryConfig,
    provider_type: ProviderType,
}

impl OpenAiCompatibleProvider {
    /// Create a provider for Gemini's OpenAI-compatible endpoint
    pub fn gemini(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(GEMINI_OPENAI_BASE_URL, api_key)
    }

    /// Create a provider for an arbitrary OpenAI-compatible base URL
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::ConfigurationError {
                message: "API key must not be empty".to_string(),
            });
        }

        let provider_type = if base_url.contains("generativelanguage.googleapis.com") {
            ProviderType::Gemini
        } else {
            ProviderType::OpenAiCompatible
        };

        Ok(Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
            retry_config: RetryConfig::provider_default(),
            provider_type,
        })
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    async fn post_chat_completion(&self, request_body: Value) -> Result<Value, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        post_json_with_retry(
            &self.client,
            url,
            &self.api_key,
            request_body,
            self.provider_type,
            &self.retry_config,
        )
        .await
    }

    fn build_request_body(
        &self,
        model_id: &str,
        messages: &Messages,
        tools: &[Tool],
        config: &ChatConfig,
    ) -> Value {
        let mut request_body = json!({
            "model": model_id,
            "messages": convert_messages_to_openai(messages),
        });

        if !tools.is_empty() {
            request_body["tools"] = Value::Array(convert_tools_to_openai(tools));
            request_body["tool_choice"] = json!("auto");
        }
        if let Some(temperature) = config.temperature {
            request_body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = config.max_tokens {
            request_body["max_tokens"] = json!(max_tokens);
        }
        for (key, value) in &config.additional_params {
            request_body[key] = value.clone();
        }

        request_body
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
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
        model_id: &str,
        messages: &Messages,
        tools: &[Tool],
        config: &ChatConfig,
    ) -> Result<ChatResponse, LlmError> {
        tracing::info!(
            "Chat request to {} for model {} with {} tools",
            self.provider_type,
            model_id,
            tools.len()
        );
        let start_time = Instant::now();

        let request_body = self.build_request_body(model_id, messages, tools, config);
        tracing::trace!(
            "Chat request body: {}",
            serde_json::to_string(&request_body).unwrap_or_else(|_| "<invalid>".to_string())
        );

        let response_json = self.post_chat_completion(request_body).await?;
        let chat_response = convert_openai_response(self.provider_type, &response_json)?;

        for (i, tool_call) in chat_response.tool_calls.iter().enumerate() {
            tracing::debug!(
                "Tool call {}: {} - args: {}",
                i + 1,
                tool_call.name,
                tool_call.input
            );
        }
        tracing::info!(
            "Chat completed in {:?}, content length: {} chars, tool calls: {}",
            start_time.elapsed(),
            chat_response.content.len(),
            chat_response.tool_calls.len()
        );

        Ok(chat_response)
    }

    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }
}

/// POST a JSON body with bearer auth, retrying transient failures, and parse the JSON reply
pub(crate) async fn post_json_with_retry(
    client: &reqwest::Client,
    url: String,
    api_key: &str,
    request_body: Value,
    provider: ProviderType,
    retry_config: &RetryConfig,
) -> Result<Value, LlmError> {
    let client = client.clone();
    let api_key = api_key.to_string();

    retry_llm_operation(
        move || {
            let client = client.clone();
            let url = url.clone();
            let api_key = api_key.clone();
            let request_body = request_body.clone();

            Box::pin(async move {
                let response = client
                    .post(&url)
                    .bearer_auth(&api_key)
                    .json(&request_body)
                    .send()
                    .await
                    .map_err(|e| {
                        tracing::debug!("HTTP request to {} failed: {}", url, e);
                        LlmError::NetworkError {
                            message: format!("HTTP request failed: {}", e),
                            source: Some(Box::new(e)),
                        }
                    })?;

                let status = response.status();
                if !status.is_success() {
                    let retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok());
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    tracing::warn!("{} returned {}: {}", provider, status, error_text);
                    return Err(map_http_error(provider, status.as_u16(), error_text, retry_after));
                }

                let response_text = response.text().await.map_err(|e| LlmError::NetworkError {
                    message: format!("Failed to read response body: {}", e),
                    source: Some(Box::new(e)),
                })?;

                serde_json::from_str::<Value>(&response_text).map_err(|e| {
                    tracing::error!(
                        "Failed to parse JSON response: {} | Raw response: {}",
                        e,
                        response_text
                    );
                    LlmError::SerializationError {
                        message: format!("Failed to parse JSON response: {}", e),
                    }
                })
            }) as BoxFuture<'static, Result<Value, LlmError>>
        },
        retry_config,
    )
    .await
}

/// Map a non-success HTTP status to the matching error variant
pub(crate) fn map_http_error(
    provider: ProviderType,
    status: u16,
    body: String,
    retry_after: Option<u64>,
) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthenticationError { provider },
        429 => LlmError::RateLimitError {
            provider,
            retry_after,
        },
        _ => LlmError::ProviderError {
            provider,
            message: format!("API error {}: {}", status, body),
            status: Some(status),
            source: None,
        },
    }
}

/// Convert the conversation to OpenAI chat messages
///
/// The instruction preamble becomes a leading `system` message. Tool uses become
/// `tool_calls` on the assistant message; tool results become `role: tool` messages.
fn convert_messages_to_openai(messages: &Messages) -> Vec<Value> {
    let mut openai_messages = Vec::new();

    if let Some(system_prompt) = &messages.system_prompt {
        openai_messages.push(json!({"role": "system", "content": system_prompt}));
    }

    for message in &messages.messages {
        let mut content_parts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut tool_results = Vec::new();

        for block in &message.content {
            match block {
                ContentBlock::Text { text } => content_parts.push(text.clone()),
                ContentBlock::ToolUse { id, name, input } => {
                    // arguments must always be a JSON object string
                    let arguments = if input.is_object() {
                        input.to_string()
                    } else {
                        "{}".to_string()
                    };
                    tool_calls.push(json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": arguments
                        }
                    }));
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => {
                    tool_results.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content
                    }));
                }
            }
        }

        let content = content_parts.join(" ");
        if !content.is_empty() || !tool_calls.is_empty() {
            let mut message_json = json!({
                "role": message.role.as_str(),
                "content": if content.is_empty() { None } else { Some(content) }
            });
            if !tool_calls.is_empty() {
                message_json["tool_calls"] = Value::Array(tool_calls);
            }
            openai_messages.push(message_json);
        }

        openai_messages.extend(tool_results);
    }

    openai_messages
}

fn convert_tools_to_openai(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema
                }
            })
        })
        .collect()
}

/// Convert an OpenAI chat completion response into a [`ChatResponse`]
fn convert_openai_response(provider: ProviderType, response: &Value) -> Result<ChatResponse, LlmError> {
    let first_choice = response
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| LlmError::invalid_response(provider, "missing choices array"))?
        .first()
        .ok_or_else(|| LlmError::invalid_response(provider, "empty choices array"))?;

    let message = first_choice
        .get("message")
        .ok_or_else(|| LlmError::invalid_response(provider, "missing message"))?;

    // null when the model only calls tools
    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|tc| tc.as_array()) {
        for (index, call) in calls.iter().enumerate() {
            let Some(function) = call.get("function") else {
                continue;
            };
            let Some(name) = function.get("name").and_then(|n| n.as_str()) else {
                continue;
            };
            // some servers omit call ids; synthesize a stable one so results can be matched
            let id = call
                .get("id")
                .and_then(|i| i.as_str())
                .filter(|i| !i.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{}", index));

            let input = match function.get("arguments") {
                Some(Value::String(s)) if s.trim().is_empty() => json!({}),
                Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|parse_err| {
                    tracing::warn!(
                        "Failed to parse tool arguments as JSON: {} | Raw: {}",
                        parse_err,
                        s
                    );
                    Value::String(s.clone())
                }),
                Some(obj) => obj.clone(),
                None => json!({}),
            };

            tool_calls.push(ToolCall {
                id,
                name: name.to_string(),
                input,
            });
        }
    }

    let usage = response.get("usage").and_then(|u| {
        let input_tokens = u.get("prompt_tokens")?.as_u64()? as u32;
        let output_tokens = u
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        Some(Usage {
            input_tokens,
            output_tokens,
            total_tokens: u
                .get("total_tokens")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32)
                .unwrap_or(input_tokens + output_tokens),
        })
    });

    let mut metadata = HashMap::new();
    if let Some(finish_reason) = first_choice.get("finish_reason").and_then(|r| r.as_str()) {
        metadata.insert("finish_reason".to_string(), json!(finish_reason));
    }
    if let Some(model) = response.get("model").and_then(|m| m.as_str()) {
        metadata.insert("model".to_string(), json!(model));
    }

    Ok(ChatResponse {
        content,
        tool_calls,
        usage,
        metadata,
    })
}
