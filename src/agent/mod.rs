//! The burger shop agent: one user message in, one reply (plus trace id) out.
//!
//! An [`Agent`] is built once by the entry point and shared by reference. Each
//! [`respond`](Agent::respond) call builds a fresh conversation (instruction preamble
//! plus the user's text), hands it to the [`CompletionEngine`] together with the menu
//! tools, and extracts the final answer from what comes back.
//!
//! ```no_run
//! use menu_agent::agent::Agent;
//! use menu_agent::knowledge::{default_menu, IndexConfig, KnowledgeBase, OpenAiCompatibleEmbeddings};
//! use menu_agent::llm::OpenAiCompatibleProvider;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let key = std::env::var("GEMINI_API_KEY")?;
//! let knowledge = KnowledgeBase::build(
//!     default_menu(),
//!     Arc::new(OpenAiCompatibleEmbeddings::gemini(&key)),
//!     &IndexConfig::default(),
//! )
//! .await?;
//!
//! let agent = Agent::builder()
//!     .provider(Arc::new(OpenAiCompatibleProvider::gemini(&key)?))
//!     .knowledge(Arc::new(knowledge))
//!     .max_cycles(5)
//!     .build()
//!     .await?;
//!
//! let reply = agent.respond("What's the price of Fries?").await?;
//! println!("Agent: {}", reply);
//! # Ok(())
//! # }
//! ```

pub mod callbacks;
pub mod event_loop;
pub mod result;

pub use callbacks::{CallbackHandler, PrintingCallbackHandler, PrintingConfig};
pub use event_loop::{CompletionEngine, ToolCallingEngine, DEFAULT_MAX_CYCLES};
pub use result::{extract_reply, render_raw, AgentReply, ExecutionSummary, ExtractedReply, ReplySource};

use crate::config::AppConfig;
use crate::knowledge::{KnowledgeBase, OpenAiCompatibleEmbeddings};
use crate::llm::providers::OpenAiCompatibleProvider;
use crate::llm::traits::{ChatConfig, LlmProvider};
use crate::telemetry::{ObservabilityClient, TraceHandler, DEFAULT_TRACE_NAME};
use crate::tools::{menu_registry, Tool, ToolRegistry, DEFAULT_TOP_K};
use crate::types::{Message, Messages};
use crate::{MenuAgentError, Result};
use callbacks::CompositeCallbackHandler;
use std::sync::Arc;
use tracing::{debug, info};

/// Instructions sent ahead of every conversation
pub const SYSTEM_PROMPT: &str = "You are a helpful burger shop assistant. Your job is to:
1. Help customers find menu items and prices using the lookup_price tool
2. Place orders for customers using the place_order tool

Always be friendly and helpful. When a customer asks about prices, use the lookup_price tool first.
When they want to order, use the place_order tool with the items they requested.

Important: Always look up prices before confirming them to customers.";

/// Reply plus the turns the engine appended after the user's message
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub reply: AgentReply,
    pub turns: Vec<Message>,
}

/// The assembled agent: engine, tools, knowledge base and observability
pub struct Agent {
    engine: Arc<dyn CompletionEngine>,
    tools: ToolRegistry,
    knowledge: Arc<KnowledgeBase>,
    system_prompt: String,
    observability: Option<ObservabilityClient>,
    trace_name: String,
    callbacks: Vec<Arc<dyn CallbackHandler>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("tools", &self.tools)
            .field("knowledge_records", &self.knowledge.len())
            .field("observability", &self.observability)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Build the production agent: Gemini chat and embeddings, default menu tools
    ///
    /// Fails with a configuration error before any network call when the API key is
    /// missing. The knowledge base is embedded here, once.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config.api_key()?;

        let provider = OpenAiCompatibleProvider::new(&config.provider.base_url, api_key)?
            .with_retry_config(config.provider.retry_config());
        let embedder = OpenAiCompatibleEmbeddings::new(
            config.embedding_base_url(),
            api_key,
            &config.embedding.model,
        )
        .with_retry_config(config.provider.retry_config());

        let knowledge = KnowledgeBase::build(
            config.knowledge.records.clone(),
            Arc::new(embedder),
            &config.knowledge.index_config(),
        )
        .await?;
        info!(
            "Knowledge base ready with {} records ({})",
            knowledge.len(),
            config.embedding.model
        );

        let mut builder = Agent::builder()
            .provider(Arc::new(provider))
            .chat_config(config.provider.chat_config())
            .knowledge(Arc::new(knowledge))
            .top_k(config.knowledge.top_k)
            .max_cycles(config.agent.max_cycles)
            .trace_name(&config.observability.trace_name);
        if let Some(prompt) = &config.agent.system_prompt {
            builder = builder.system_prompt(prompt);
        }
        if config.observability.enabled {
            builder = builder.observability(ObservabilityClient::from_config(&config.observability));
        }
        builder.build().await
    }

    /// Answer one user message
    pub async fn respond(&self, user_text: &str) -> Result<AgentReply> {
        Ok(self.run(user_text).await?.reply)
    }

    /// Answer one user message and keep the appended turns
    pub async fn run(&self, user_text: &str) -> Result<AgentRun> {
        let mut conversation = Messages::with_system_prompt(&self.system_prompt);
        conversation.add_user_message(user_text);
        let offset = conversation.len();

        let tracer = self
            .observability
            .as_ref()
            .map(|client| Arc::new(TraceHandler::new(client.clone(), &self.trace_name)));

        let mut handlers = self.callbacks.clone();
        if let Some(tracer) = &tracer {
            handlers.push(tracer.clone());
        }
        let callbacks = CompositeCallbackHandler::with_handlers(handlers);

        let conversation = match self
            .engine
            .complete(conversation, &self.tools, &callbacks)
            .await
        {
            Ok(conversation) => conversation,
            Err(e) => {
                if let Some(tracer) = &tracer {
                    tracer.finish(None).await;
                }
                return Err(e);
            }
        };

        let (text, source) = match extract_reply(&conversation) {
            Some(extracted) => (extracted.text, extracted.source),
            None => {
                debug!("No reply turn found, falling back to the raw conversation");
                (render_raw(&conversation), ReplySource::RawFallback)
            }
        };

        let trace_id = match &tracer {
            Some(tracer) => {
                tracer.finish(Some(&text)).await;
                tracer.last_trace_id()
            }
            None => None,
        };

        Ok(AgentRun {
            reply: AgentReply {
                text,
                trace_id,
                source,
            },
            turns: conversation.appended_since(offset).to_vec(),
        })
    }

    /// Attach another handler to every later call
    pub fn add_callback_handler(&mut self, handler: Arc<dyn CallbackHandler>) {
        self.callbacks.push(handler);
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn observability(&self) -> Option<&ObservabilityClient> {
        self.observability.as_ref()
    }
}

/// Builder for [`Agent`]
///
/// A knowledge base is required, and either a provider or a ready-made engine.
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    engine: Option<Arc<dyn CompletionEngine>>,
    knowledge: Option<Arc<KnowledgeBase>>,
    chat_config: ChatConfig,
    system_prompt: String,
    max_cycles: u32,
    top_k: usize,
    observability: Option<ObservabilityClient>,
    trace_name: String,
    callbacks: Vec<Arc<dyn CallbackHandler>>,
    extra_tools: Vec<Box<dyn Tool>>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            engine: None,
            knowledge: None,
            chat_config: ChatConfig::default(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_cycles: DEFAULT_MAX_CYCLES,
            top_k: DEFAULT_TOP_K,
            observability: None,
            trace_name: DEFAULT_TRACE_NAME.to_string(),
            callbacks: Vec::new(),
            extra_tools: Vec::new(),
        }
    }

    /// Drive the default tool-calling engine with this provider
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use a custom engine; provider, chat config and max cycles are then ignored
    pub fn engine(mut self, engine: Arc<dyn CompletionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn knowledge(mut self, knowledge: Arc<KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn chat_config(mut self, chat_config: ChatConfig) -> Self {
        self.chat_config = chat_config;
        self
    }

    pub fn model<S: Into<String>>(mut self, model_id: S) -> Self {
        self.chat_config.model_id = model_id.into();
        self
    }

    pub fn system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Records returned per price lookup
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Open a trace per call on this client
    pub fn observability(mut self, client: ObservabilityClient) -> Self {
        self.observability = Some(client);
        self
    }

    pub fn trace_name<S: Into<String>>(mut self, name: S) -> Self {
        self.trace_name = name.into();
        self
    }

    pub fn with_callback_handler<H: CallbackHandler + 'static>(mut self, handler: H) -> Self {
        self.callbacks.push(Arc::new(handler));
        self
    }

    pub fn with_printing_callbacks(self) -> Self {
        self.with_callback_handler(PrintingCallbackHandler::default())
    }

    /// Offer an extra tool next to the menu tools
    pub fn tool(mut self, tool: Box<dyn Tool>) -> Self {
        self.extra_tools.push(tool);
        self
    }

    pub async fn build(self) -> Result<Agent> {
        let knowledge = self.knowledge.ok_or_else(|| {
            MenuAgentError::configuration_error("Agent requires a knowledge base")
        })?;

        let tools = menu_registry(Arc::clone(&knowledge), self.top_k).await?;
        for tool in self.extra_tools {
            tools.register_tool(tool).await?;
        }

        let engine: Arc<dyn CompletionEngine> = match (self.engine, self.provider) {
            (Some(engine), _) => engine,
            (None, Some(provider)) => Arc::new(
                ToolCallingEngine::new(provider, self.chat_config).with_max_cycles(self.max_cycles),
            ),
            (None, None) => {
                return Err(MenuAgentError::configuration_error(
                    "Agent requires a provider or a completion engine",
                ))
            }
        };

        debug!("Agent built with tools {:?}", tools.tool_names().await);

        Ok(Agent {
            engine,
            tools,
            knowledge,
            system_prompt: self.system_prompt,
            observability: self.observability,
            trace_name: self.trace_name,
            callbacks: self.callbacks,
        })
    }
}
