//! Provider implementations.

pub mod openai_compat;
pub mod retry;

pub use openai_compat::{OpenAiCompatibleProvider, GEMINI_OPENAI_BASE_URL};
pub use retry::{retry_llm_operation, retry_with_backoff, RetryConfig, RetryDecision};
