//! Built-in callback handlers.

use super::error::CallbackError;
use super::events::{CallbackEvent, ToolEvent};
use super::traits::CallbackHandler;
use crate::agent::result::ExecutionSummary;
use crate::error::MenuAgentError;
use async_trait::async_trait;
use std::sync::Arc;

/// No-op handler, the default when nothing is attached
#[derive(Debug, Default)]
pub struct NullCallbackHandler;

#[async_trait]
impl CallbackHandler for NullCallbackHandler {}

/// What the printing handler shows
#[derive(Debug, Clone)]
pub struct PrintingConfig {
    pub show_tools: bool,
    /// Show tool inputs and outputs, not just names
    pub show_tool_io: bool,
    pub show_performance: bool,
}

impl Default for PrintingConfig {
    fn default() -> Self {
        Self {
            show_tools: true,
            show_tool_io: false,
            show_performance: false,
        }
    }
}

impl PrintingConfig {
    pub fn verbose() -> Self {
        Self {
            show_tools: true,
            show_tool_io: true,
            show_performance: true,
        }
    }
}

/// Prints tool activity and run summaries to stderr, keeping stdout for the reply
#[derive(Debug, Default)]
pub struct PrintingCallbackHandler {
    config: PrintingConfig,
}

impl PrintingCallbackHandler {
    pub fn new(config: PrintingConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CallbackHandler for PrintingCallbackHandler {
    async fn on_tool(&self, event: ToolEvent) -> Result<(), CallbackError> {
        if !self.config.show_tools {
            return Ok(());
        }

        match event {
            ToolEvent::Started { name, input } => {
                if self.config.show_tool_io {
                    eprintln!("🔧 {} {}", name, input);
                } else {
                    eprintln!("🔧 {}", name);
                }
            }
            ToolEvent::Completed {
                name,
                output,
                duration,
            } => {
                eprintln!("✅ {} completed in {:?}", name, duration);
                if let (true, Some(output)) = (self.config.show_tool_io, output) {
                    for line in output.lines() {
                        eprintln!("   {}", line);
                    }
                }
            }
            ToolEvent::Failed {
                name,
                error,
                duration,
            } => {
                eprintln!("❌ {} failed after {:?}: {}", name, duration, error);
            }
        }
        Ok(())
    }

    async fn on_complete(&self, summary: &ExecutionSummary) -> Result<(), CallbackError> {
        if self.config.show_performance {
            eprintln!("📊 Execution Summary:");
            eprintln!("   Duration: {:?}", summary.duration);
            eprintln!("   Cycles: {}", summary.cycles);
            eprintln!("   Tokens: {}", summary.usage.total_tokens);
            if !summary.tools_called.is_empty() {
                eprintln!("   Tools: {}", summary.tools_called.join(", "));
            }
        }
        Ok(())
    }

    async fn on_error(&self, error: &MenuAgentError) -> Result<(), CallbackError> {
        eprintln!("❌ {}", error);
        Ok(())
    }
}

/// Fans every event out to several handlers, in order
#[derive(Default)]
pub struct CompositeCallbackHandler {
    handlers: Vec<Arc<dyn CallbackHandler>>,
}

impl CompositeCallbackHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(mut self, handler: Arc<dyn CallbackHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn with_handlers(handlers: Vec<Arc<dyn CallbackHandler>>) -> Self {
        Self { handlers }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for CompositeCallbackHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeCallbackHandler")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[async_trait]
impl CallbackHandler for CompositeCallbackHandler {
    /// Every handler sees the event even if an earlier one fails; the first error is
    /// returned.
    async fn handle_event(&self, event: CallbackEvent) -> Result<(), CallbackError> {
        let mut first_error = None;
        for handler in &self.handlers {
            if let Err(e) = handler.handle_event(event.clone()).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
