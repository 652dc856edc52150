//! Chat completion provider layer.
//!
//! The agent talks to language models through the [`LlmProvider`] trait. The one
//! concrete implementation, [`OpenAiCompatibleProvider`], speaks the OpenAI
//! `/chat/completions` dialect, which Gemini exposes under its `v1beta/openai` endpoint.
//!
//! ```text
//! ToolCallingEngine → LlmProvider (OpenAiCompatibleProvider)
//!                         ↓
//!                  POST {base_url}/chat/completions  (retried with backoff)
//! ```
//!
//! Providers own request formatting, response parsing, authentication and transient
//! failure retries. Everything above the provider sees either a [`ChatResponse`] or an
//! [`LlmError`] and never retries on its own.

pub mod providers;
pub mod traits;

pub use providers::openai_compat::OpenAiCompatibleProvider;
pub use providers::retry::RetryConfig;
pub use traits::{ChatConfig, ChatResponse, LlmError, LlmProvider, ProviderType, Tool, ToolCall, Usage};
