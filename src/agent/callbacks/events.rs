//! Event types emitted while the engine runs a conversation.

use crate::agent::result::ExecutionSummary;
use crate::error::MenuAgentError;
use crate::llm::traits::{ProviderType, Usage};
use crate::types::Messages;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Everything a handler can observe during one engine run
#[derive(Debug, Clone)]
pub enum CallbackEvent {
    RunStart {
        run_id: Uuid,
        prompt: String,
    },

    ModelStart {
        provider: ProviderType,
        model_id: String,
        /// Conversation as sent to the model
        messages: Messages,
        tools_available: usize,
    },
    ModelComplete {
        model_id: String,
        response: String,
        tool_calls: usize,
        duration: Duration,
        tokens: Option<Usage>,
    },

    ToolStart {
        tool_name: String,
        tool_use_id: String,
        input: Value,
    },
    ToolComplete {
        tool_name: String,
        tool_use_id: String,
        /// Plain-text result handed back to the model
        output: Option<String>,
        error: Option<String>,
        duration: Duration,
    },

    RunComplete {
        summary: ExecutionSummary,
        /// Final text of the run, if the model produced one
        response: Option<String>,
    },

    Error {
        error: MenuAgentError,
        context: String,
    },
}

/// Tool-specific events for easier handling
#[derive(Debug, Clone)]
pub enum ToolEvent {
    Started {
        name: String,
        input: Value,
    },
    Completed {
        name: String,
        output: Option<String>,
        duration: Duration,
    },
    Failed {
        name: String,
        error: String,
        duration: Duration,
    },
}
