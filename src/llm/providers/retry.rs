//! Retry utilities for provider-level resilience
//!
//! Transient HTTP failures (connection errors, rate limits, 5xx) are retried with
//! exponential backoff inside the provider clients. Nothing above the provider layer
//! retries.

use crate::llm::traits::LlmError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior with exponential backoff
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on the delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (2.0 doubles the delay each time)
    pub backoff_multiplier: f64,
    /// Add random jitter to each delay
    pub jitter: bool,
}

impl RetryConfig {
    /// Default for hosted chat and embedding endpoints
    pub fn provider_default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(20),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// Disable retries (tests, or callers that handle failures themselves)
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::provider_default()
    }
}

/// Decision about whether to retry after an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    FailImmediately,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Calculate delay for exponential backoff with optional jitter
pub fn calculate_backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_delay = config.initial_delay.as_millis() as f64;
    let multiplier = config.backoff_multiplier.powi(attempt as i32);
    let delay = Duration::from_millis((base_delay * multiplier) as u64).min(config.max_delay);

    if config.jitter {
        add_jitter(delay)
    } else {
        delay
    }
}

/// Scale the delay by a random factor in [0.75, 1.25)
fn add_jitter(delay: Duration) -> Duration {
    let jitter_factor = 0.75 + 0.5 * fastrand::f64();
    Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64)
}

/// Whether an HTTP status is worth retrying
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

/// Determine if an LlmError should trigger a retry
pub fn should_retry_llm_error(error: &LlmError) -> RetryDecision {
    match error {
        LlmError::NetworkError { .. } => RetryDecision::Retry,
        LlmError::RateLimitError { .. } => RetryDecision::Retry,
        LlmError::ProviderError {
            status: Some(status),
            ..
        } if is_retryable_status(*status) => RetryDecision::Retry,
        LlmError::ProviderError { .. }
        | LlmError::ConfigurationError { .. }
        | LlmError::AuthenticationError { .. }
        | LlmError::SerializationError { .. } => RetryDecision::FailImmediately,
    }
}

/// Execute an operation with retry logic and exponential backoff
pub async fn retry_with_backoff<F, T, E>(
    mut operation: F,
    config: &RetryConfig,
    should_retry: impl Fn(&E) -> RetryDecision,
) -> Result<T, E>
where
    F: FnMut() -> BoxFuture<'static, Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!("Operation succeeded on retry attempt {}", attempt);
                }
                return Ok(result);
            }
            Err(error) => {
                if should_retry(&error) == RetryDecision::FailImmediately {
                    if attempt > 0 {
                        tracing::warn!(
                            "Operation failed with non-retryable error on attempt {}",
                            attempt
                        );
                    }
                    return Err(error);
                }
                if attempt >= config.max_attempts {
                    if config.max_attempts > 0 {
                        tracing::error!(
                            "Operation failed after {} retry attempts",
                            config.max_attempts
                        );
                    }
                    return Err(error);
                }

                let delay = calculate_backoff_delay(attempt, config);
                attempt += 1;
                tracing::debug!(
                    "Retrying operation after {} ms (attempt {}/{})",
                    delay.as_millis(),
                    attempt,
                    config.max_attempts
                );
                sleep(delay).await;
            }
        }
    }
}

/// Convenience function for retrying LlmError operations
pub async fn retry_llm_operation<F, T>(operation: F, config: &RetryConfig) -> Result<T, LlmError>
where
    F: FnMut() -> BoxFuture<'static, Result<T, LlmError>>,
{
    retry_with_backoff(operation, config, should_retry_llm_error).await
}
