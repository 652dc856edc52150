//! Tools the completion engine can call, and the registry that holds them.
//!
//! A tool is anything implementing [`Tool`]: a name, a description, a JSON schema
//! for its input object and an async `execute`. Plain functions become tools through
//! the [`tool`](crate::tool) attribute; tools that need state (like the menu lookup,
//! which holds the knowledge base) implement the trait by hand.
//!
//! ```text
//! ToolCallingEngine → ToolRegistry::execute_tool(name, input) → Tool::execute
//!                   ← ToolResult (plain text for the model)
//! ```

pub mod menu;

pub use menu::{
    format_lookup, format_order, menu_registry, place_order, LookupPriceTool, PlaceOrderTool,
    DEFAULT_TOP_K, NO_ITEMS_FOUND, ORDER_PLACED_PREFIX,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A callable capability offered to the model
#[async_trait]
pub trait Tool: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Routing hint shown to the model
    fn description(&self) -> &str;

    /// JSON schema of the input object
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, parameters: Option<Value>) -> Result<ToolResult, ToolError>;
}

/// Result from executing a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: Value,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(content: Value) -> Self {
        Self {
            success: true,
            content,
            error: None,
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            content: Value::Null,
            error: Some(message.into()),
        }
    }

    /// Plain-text rendering handed back to the model
    ///
    /// String content is returned verbatim, other JSON is serialized, and failures
    /// render as `Error: <message>`.
    pub fn to_text(&self) -> String {
        if !self.success {
            return format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("tool execution failed")
            );
        }
        match &self.content {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Tool registration and execution errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Duplicate tool name: {name}")]
    DuplicateTool { name: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    /// The retrieval backend failed; this ends the run instead of being shown to the model
    #[error("Knowledge base unavailable: {message}")]
    KnowledgeUnavailable { message: String },
}

impl ToolError {
    /// Errors that abort the run rather than becoming an error turn
    pub fn is_fatal(&self) -> bool {
        matches!(self, ToolError::KnowledgeUnavailable { .. })
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, used for the definitions handed to the model
    order: Vec<String>,
}

/// Thread-safe registry of tools keyed by name
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names must be unique
    pub async fn register_tool(&self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let tool_name = tool.name().to_string();
        let mut inner = self.inner.write().await;

        if inner.tools.contains_key(&tool_name) {
            return Err(ToolError::DuplicateTool { name: tool_name });
        }

        inner.tools.insert(tool_name.clone(), Arc::from(tool));
        inner.order.push(tool_name.clone());

        tracing::info!("Registered tool: {}", tool_name);
        Ok(())
    }

    /// Tool definitions for the provider, in registration order
    pub async fn get_tool_schemas(&self) -> Vec<crate::llm::traits::Tool> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|name| inner.tools.get(name))
            .map(|tool| crate::llm::traits::Tool {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.parameters_schema(),
            })
            .collect()
    }

    /// Execute a registered tool
    pub async fn execute_tool(
        &self,
        name: &str,
        parameters: Option<Value>,
    ) -> Result<ToolResult, ToolError> {
        // release the lock before running the tool
        let tool = self.get_tool(name).await.ok_or_else(|| ToolError::ToolNotFound {
            name: name.to_string(),
        })?;

        tool.execute(parameters).await
    }

    pub async fn tool_names(&self) -> Vec<String> {
        self.inner.read().await.order.clone()
    }

    pub async fn has_tool(&self, name: &str) -> bool {
        self.inner.read().await.tools.contains_key(name)
    }

    pub async fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.inner.read().await.tools.get(name).cloned()
    }
}
