//! Core callback trait for observing engine runs.
//!
//! Handlers override only the hooks they care about; every method defaults to a
//! no-op. [`CallbackHandler::handle_event`] receives every event and routes it to the
//! narrower hooks, so handlers that need full event detail override it instead.
//!
//! ```rust,no_run
//! use menu_agent::agent::callbacks::{CallbackHandler, CallbackError, ToolEvent};
//! use async_trait::async_trait;
//!
//! struct ToolCounter;
//!
//! #[async_trait]
//! impl CallbackHandler for ToolCounter {
//!     async fn on_tool(&self, event: ToolEvent) -> Result<(), CallbackError> {
//!         if let ToolEvent::Completed { name, duration, .. } = event {
//!             println!("{} finished in {:?}", name, duration);
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use super::error::CallbackError;
use super::events::{CallbackEvent, ToolEvent};
use crate::agent::result::ExecutionSummary;
use crate::error::MenuAgentError;
use async_trait::async_trait;

#[async_trait]
pub trait CallbackHandler: Send + Sync {
    /// Tool start, completion and failure
    async fn on_tool(&self, event: ToolEvent) -> Result<(), CallbackError> {
        let _ = event;
        Ok(())
    }

    /// The run finished (normally or by hitting the cycle limit)
    async fn on_complete(&self, summary: &ExecutionSummary) -> Result<(), CallbackError> {
        let _ = summary;
        Ok(())
    }

    async fn on_error(&self, error: &MenuAgentError) -> Result<(), CallbackError> {
        let _ = error;
        Ok(())
    }

    async fn handle_event(&self, event: CallbackEvent) -> Result<(), CallbackError> {
        match event {
            CallbackEvent::ToolStart {
                tool_name, input, ..
            } => {
                self.on_tool(ToolEvent::Started {
                    name: tool_name,
                    input,
                })
                .await
            }
            CallbackEvent::ToolComplete {
                tool_name,
                output,
                error,
                duration,
                ..
            } => match error {
                Some(error) => {
                    self.on_tool(ToolEvent::Failed {
                        name: tool_name,
                        error,
                        duration,
                    })
                    .await
                }
                None => {
                    self.on_tool(ToolEvent::Completed {
                        name: tool_name,
                        output,
                        duration,
                    })
                    .await
                }
            },
            CallbackEvent::RunComplete { summary, .. } => self.on_complete(&summary).await,
            CallbackEvent::Error { error, .. } => self.on_error(&error).await,
            _ => Ok(()),
        }
    }
}
