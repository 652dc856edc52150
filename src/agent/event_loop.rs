//! The completion engine: the agentic loop between the model and the tools.
//!
//! Each cycle sends the conversation and tool definitions to the model and appends the
//! assistant turn. Tool calls in that turn run one after another through the
//! [`ToolRegistry`], each result appended as its own tool turn, and the loop goes
//! around again. It stops when the model answers without calling a tool or when the
//! cycle limit is reached.

use crate::agent::callbacks::{CallbackEvent, CallbackHandler};
use crate::agent::result::ExecutionSummary;
use crate::error::MenuAgentError;
use crate::llm::traits::{ChatConfig, ChatResponse, LlmProvider, ToolCall};
use crate::tools::ToolRegistry;
use crate::types::{ContentBlock, Message, MessageRole, Messages};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default upper bound on model calls per run
pub const DEFAULT_MAX_CYCLES: u32 = 10;

/// Something that turns a conversation into a longer conversation
///
/// Implementations return the input turns followed by every turn they appended.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    async fn complete(
        &self,
        conversation: Messages,
        tools: &ToolRegistry,
        callbacks: &dyn CallbackHandler,
    ) -> Result<Messages, MenuAgentError>;
}

/// Tool-calling loop over an [`LlmProvider`]
#[derive(Debug, Clone)]
pub struct ToolCallingEngine {
    provider: Arc<dyn LlmProvider>,
    chat_config: ChatConfig,
    max_cycles: u32,
}

impl ToolCallingEngine {
    pub fn new(provider: Arc<dyn LlmProvider>, chat_config: ChatConfig) -> Self {
        Self {
            provider,
            chat_config,
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = max_cycles.max(1);
        self
    }

    pub fn chat_config(&self) -> &ChatConfig {
        &self.chat_config
    }

    pub fn max_cycles(&self) -> u32 {
        self.max_cycles
    }

    async fn call_model(
        &self,
        conversation: &Messages,
        tools: &[crate::llm::traits::Tool],
        callbacks: &dyn CallbackHandler,
    ) -> Result<ChatResponse, MenuAgentError> {
        emit(
            callbacks,
            CallbackEvent::ModelStart {
                provider: self.provider.provider_type(),
                model_id: self.chat_config.model_id.clone(),
                messages: conversation.clone(),
                tools_available: tools.len(),
            },
        )
        .await;

        let started = Instant::now();
        let response = self
            .provider
            .chat_with_tools(&self.chat_config.model_id, conversation, tools, &self.chat_config)
            .await;

        match response {
            Ok(response) => {
                emit(
                    callbacks,
                    CallbackEvent::ModelComplete {
                        model_id: self.chat_config.model_id.clone(),
                        response: response.content.clone(),
                        tool_calls: response.tool_calls.len(),
                        duration: started.elapsed(),
                        tokens: response.usage,
                    },
                )
                .await;
                Ok(response)
            }
            Err(e) => {
                let error = MenuAgentError::from(e);
                emit(
                    callbacks,
                    CallbackEvent::Error {
                        error: error.clone(),
                        context: format!("model call to {}", self.chat_config.model_id),
                    },
                )
                .await;
                Err(error)
            }
        }
    }

    /// Run one tool call
    ///
    /// Unknown tools and bad arguments come back as error text for the model. A failing
    /// knowledge base aborts the run.
    async fn run_tool(
        &self,
        call: &ToolCall,
        tools: &ToolRegistry,
        callbacks: &dyn CallbackHandler,
        summary: &mut ExecutionSummary,
    ) -> Result<Message, MenuAgentError> {
        emit(
            callbacks,
            CallbackEvent::ToolStart {
                tool_name: call.name.clone(),
                tool_use_id: call.id.clone(),
                input: call.input.clone(),
            },
        )
        .await;

        let started = Instant::now();
        let (text, is_error) = match tools.execute_tool(&call.name, Some(call.input.clone())).await
        {
            Ok(result) => (result.to_text(), !result.success),
            Err(e) if e.is_fatal() => {
                summary.tools_called.push(call.name.clone());
                summary.tools_failed.push(call.name.clone());
                emit(
                    callbacks,
                    CallbackEvent::ToolComplete {
                        tool_name: call.name.clone(),
                        tool_use_id: call.id.clone(),
                        output: None,
                        error: Some(e.to_string()),
                        duration: started.elapsed(),
                    },
                )
                .await;

                let error = MenuAgentError::from(e);
                emit(
                    callbacks,
                    CallbackEvent::Error {
                        error: error.clone(),
                        context: format!("tool {}", call.name),
                    },
                )
                .await;
                return Err(error);
            }
            Err(e) => (format!("Error: {}", e), true),
        };
        let duration = started.elapsed();

        summary.tools_called.push(call.name.clone());
        if is_error {
            warn!("Tool {} failed: {}", call.name, text);
            summary.tools_failed.push(call.name.clone());
        } else {
            debug!("Tool {} returned {} bytes in {:?}", call.name, text.len(), duration);
        }

        emit(
            callbacks,
            CallbackEvent::ToolComplete {
                tool_name: call.name.clone(),
                tool_use_id: call.id.clone(),
                output: (!is_error).then(|| text.clone()),
                error: is_error.then(|| text.clone()),
                duration,
            },
        )
        .await;

        Ok(Message::tool_result(call.id.clone(), text, is_error))
    }
}

#[async_trait]
impl CompletionEngine for ToolCallingEngine {
    async fn complete(
        &self,
        mut conversation: Messages,
        tools: &ToolRegistry,
        callbacks: &dyn CallbackHandler,
    ) -> Result<Messages, MenuAgentError> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let prompt = conversation
            .iter()
            .rev()
            .find(|msg| msg.role.is_user())
            .and_then(Message::text)
            .unwrap_or_default();

        emit(callbacks, CallbackEvent::RunStart { run_id, prompt }).await;

        let tool_schemas = tools.get_tool_schemas().await;
        let mut summary = ExecutionSummary::default();
        let mut final_text = None;

        loop {
            if summary.cycles >= self.max_cycles {
                warn!(
                    "Run {} stopped after {} cycles without a final answer",
                    run_id, self.max_cycles
                );
                summary.hit_cycle_limit = true;
                break;
            }
            summary.cycles += 1;

            let response = self
                .call_model(&conversation, &tool_schemas, callbacks)
                .await?;
            if let Some(usage) = &response.usage {
                summary.add_usage(usage);
            }

            conversation.push(assistant_turn(&response));

            if !response.has_tool_calls() {
                final_text = Some(response.content);
                break;
            }

            debug!(
                "Cycle {} requested {} tool call(s)",
                summary.cycles,
                response.tool_calls.len()
            );
            for call in &response.tool_calls {
                let turn = self.run_tool(call, tools, callbacks, &mut summary).await?;
                conversation.push(turn);
            }
        }

        summary.duration = started.elapsed();
        info!(
            "Run {} finished: {} cycle(s), {} tool call(s), {} tokens in {:?}",
            run_id,
            summary.cycles,
            summary.tools_called.len(),
            summary.usage.total_tokens,
            summary.duration
        );

        emit(
            callbacks,
            CallbackEvent::RunComplete {
                summary,
                response: final_text,
            },
        )
        .await;

        Ok(conversation)
    }
}

/// Assistant turn for a model response: its text (if any) followed by its tool calls
fn assistant_turn(response: &ChatResponse) -> Message {
    let mut content = Vec::with_capacity(response.tool_calls.len() + 1);
    if !response.content.is_empty() {
        content.push(ContentBlock::text(response.content.clone()));
    }
    content.extend(response.tool_calls.iter().map(|call| ContentBlock::ToolUse {
        id: call.id.clone(),
        name: call.name.clone(),
        input: call.input.clone(),
    }));
    Message::new(MessageRole::Assistant, content)
}

/// Deliver an event; handler failures are logged and otherwise ignored
async fn emit(callbacks: &dyn CallbackHandler, event: CallbackEvent) {
    if let Err(e) = callbacks.handle_event(event).await {
        warn!("Callback handler failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::callbacks::{CallbackError, NullCallbackHandler, ToolEvent};
    use crate::knowledge::{default_menu, IndexConfig, KnowledgeBase};
    use crate::llm::traits::LlmError;
    use crate::test_support::{text_response, tool_call_response, KeywordEmbedder, ScriptedProvider};
    use crate::tools::menu_registry;
    use serde_json::json;
    use std::sync::Mutex;

    async fn registry() -> ToolRegistry {
        let knowledge = KnowledgeBase::build(
            default_menu(),
            Arc::new(KeywordEmbedder::default()),
            &IndexConfig::default(),
        )
        .await
        .unwrap();
        menu_registry(Arc::new(knowledge), 3).await.unwrap()
    }

    fn conversation(text: &str) -> Messages {
        let mut conversation = Messages::with_system_prompt("be helpful");
        conversation.add_user_message(text);
        conversation
    }

    #[derive(Default)]
    struct ToolLog(Mutex<Vec<String>>);

    #[async_trait]
    impl CallbackHandler for ToolLog {
        async fn on_tool(&self, event: ToolEvent) -> Result<(), CallbackError> {
            if let ToolEvent::Failed { name, .. } = &event {
                self.0.lock().unwrap().push(format!("failed:{}", name));
            }
            if let ToolEvent::Completed { name, .. } = &event {
                self.0.lock().unwrap().push(format!("completed:{}", name));
            }
            Err(CallbackError::ExecutionFailed("handler is broken".into()))
        }
    }

    #[tokio::test]
    async fn test_answer_without_tools_ends_after_one_cycle() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("Hello!")]));
        let engine = ToolCallingEngine::new(provider.clone(), ChatConfig::default());

        let result = engine
            .complete(conversation("hi"), &registry().await, &NullCallbackHandler)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.last().unwrap().text().as_deref(), Some("Hello!"));

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let names: Vec<_> = requests[0].1.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["lookup_price", "place_order"]);
        assert_eq!(requests[0].0.system_prompt.as_deref(), Some("be helpful"));
    }

    #[tokio::test]
    async fn test_tool_calls_are_executed_and_fed_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("c1", "lookup_price", json!({"query": "Big Mac"})),
            tool_call_response("c2", "place_order", json!({"items": "Big Mac"})),
            text_response("A Big Mac is $5. Your order is placed."),
        ]));
        let engine = ToolCallingEngine::new(provider.clone(), ChatConfig::default());

        let result = engine
            .complete(conversation("Big Mac please"), &registry().await, &NullCallbackHandler)
            .await
            .unwrap();

        // user, (assistant, tool) x2, assistant
        assert_eq!(result.len(), 6);
        assert_eq!(result[1].tool_uses().len(), 1);
        assert_eq!(result[2].role, MessageRole::Tool);
        assert!(result[2].text().unwrap().starts_with("Big Mac: $5"));
        assert_eq!(result[4].text().as_deref(), Some("ORDER_PLACED: [Big Mac]"));
        assert_eq!(result.tool_call_count(), 2);

        // the second request already carries the first tool result
        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].0.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("c1", "refund_order", json!({})),
            text_response("Sorry, I cannot do that."),
        ]));
        let engine = ToolCallingEngine::new(provider, ChatConfig::default());
        let log = ToolLog::default();

        let result = engine
            .complete(conversation("refund me"), &registry().await, &log)
            .await
            .unwrap();

        match &result[2].content[0] {
            ContentBlock::ToolResult {
                content, is_error, ..
            } => {
                assert!(*is_error);
                assert!(content.starts_with("Error:"));
                assert!(content.contains("refund_order"));
            }
            other => panic!("expected tool result, got {:?}", other),
        }
        // a failing handler does not stop the run
        assert_eq!(*log.0.lock().unwrap(), vec!["failed:refund_order"]);
        assert_eq!(
            result.last().unwrap().text().as_deref(),
            Some("Sorry, I cannot do that.")
        );
    }

    #[tokio::test]
    async fn test_missing_tool_argument_is_reported_to_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("c1", "lookup_price", json!({})),
            text_response("Which item?"),
        ]));
        let engine = ToolCallingEngine::new(provider, ChatConfig::default());

        let result = engine
            .complete(conversation("price?"), &registry().await, &NullCallbackHandler)
            .await
            .unwrap();

        assert!(result[2].text().unwrap().starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_knowledge_failure_aborts_run() {
        let knowledge = KnowledgeBase::build(
            default_menu(),
            Arc::new(KeywordEmbedder::failing_after(1)),
            &IndexConfig::default(),
        )
        .await
        .unwrap();
        let tools = menu_registry(Arc::new(knowledge), 3).await.unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("c1", "lookup_price", json!({"query": "Big Mac"})),
            text_response("Sorry, I could not check the menu."),
        ]));
        let engine = ToolCallingEngine::new(provider.clone(), ChatConfig::default());
        let log = ToolLog::default();

        let err = engine
            .complete(conversation("How much is a Big Mac?"), &tools, &log)
            .await
            .unwrap_err();

        assert!(matches!(err, MenuAgentError::EmbeddingError { .. }));
        // the model never saw the failure
        assert_eq!(provider.requests().len(), 1);
        assert_eq!(*log.0.lock().unwrap(), vec!["failed:lookup_price"]);
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            LlmError::AuthenticationError {
                provider: crate::llm::traits::ProviderType::Gemini,
            },
        )]));
        let engine = ToolCallingEngine::new(provider, ChatConfig::default());

        let err = engine
            .complete(conversation("hi"), &registry().await, &NullCallbackHandler)
            .await
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[tokio::test]
    async fn test_cycle_limit_returns_conversation_so_far() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("c1", "place_order", json!({"items": "Fries"})),
            tool_call_response("c2", "place_order", json!({"items": "Fries"})),
            text_response("never reached"),
        ]));
        let engine =
            ToolCallingEngine::new(provider.clone(), ChatConfig::default()).with_max_cycles(2);

        let result = engine
            .complete(conversation("fries"), &registry().await, &NullCallbackHandler)
            .await
            .unwrap();

        assert_eq!(provider.requests().len(), 2);
        assert_eq!(result.last().unwrap().role, MessageRole::Tool);
    }
}
