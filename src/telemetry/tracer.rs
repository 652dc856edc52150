//! Per-call trace recorder.
//!
//! A [`TraceHandler`] is attached to exactly one engine run. It opens a trace when the
//! run starts, turns model calls into generations and tool calls into spans, and on
//! [`finish`](TraceHandler::finish) hands everything to the [`ObservabilityClient`].

use super::langfuse::{timestamp_now, ObservabilityClient};
use crate::agent::callbacks::{CallbackError, CallbackEvent, CallbackHandler};
use crate::types::Messages;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Generate a random 128-bit trace ID as hex string
fn generate_trace_id() -> String {
    format!("{:032x}", fastrand::u128(..))
}

/// Generate a random 64-bit observation ID as hex string
fn generate_observation_id() -> String {
    format!("{:016x}", fastrand::u64(..))
}

/// Compact role/text rendering of a conversation for trace inputs
fn conversation_input(messages: &Messages) -> Value {
    let mut turns = Vec::with_capacity(messages.len() + 1);
    if let Some(system_prompt) = &messages.system_prompt {
        turns.push(json!({"role": "system", "content": system_prompt}));
    }
    turns.extend(messages.iter().map(|msg| {
        json!({
            "role": msg.role.as_str(),
            "content": msg.text().unwrap_or_default(),
        })
    }));
    Value::Array(turns)
}

#[derive(Debug)]
struct OpenGeneration {
    id: String,
    start_time: String,
    model: String,
    input: Value,
}

#[derive(Debug)]
struct OpenSpan {
    id: String,
    start_time: String,
    input: Value,
}

#[derive(Debug, Default)]
struct TraceState {
    trace_id: Option<String>,
    start_time: Option<String>,
    input: Option<String>,
    output: Option<String>,
    metadata: serde_json::Map<String, Value>,
    generation: Option<OpenGeneration>,
    spans: HashMap<String, OpenSpan>,
    /// Finished observations as `(ingestion type, body)`
    observations: Vec<(&'static str, Value)>,
    error: Option<String>,
}

/// Callback handler that records one run as a trace
#[derive(Debug)]
pub struct TraceHandler {
    client: ObservabilityClient,
    trace_name: String,
    state: Mutex<TraceState>,
}

impl TraceHandler {
    pub fn new(client: ObservabilityClient, trace_name: impl Into<String>) -> Self {
        Self {
            client,
            trace_name: trace_name.into(),
            state: Mutex::new(TraceState::default()),
        }
    }

    /// Trace id of the run, once it has started
    pub fn last_trace_id(&self) -> Option<String> {
        self.state().trace_id.clone()
    }

    /// Number of recorded generations and spans
    pub fn observation_count(&self) -> usize {
        self.state().observations.len()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, TraceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Export the trace and its observations when the client has credentials
    ///
    /// `output` overrides the text recorded from the run. A local client only drops the
    /// recorded observations. Export failures are logged and swallowed.
    pub async fn finish(&self, output: Option<&str>) {
        let events = {
            let mut state = self.state();
            let Some(trace_id) = state.trace_id.clone() else {
                return;
            };
            if !self.client.exports() {
                state.observations.clear();
                return;
            }
            if let Some(output) = output {
                state.output = Some(output.to_string());
            }

            let mut trace = json!({
                "id": trace_id,
                "name": self.trace_name,
                "timestamp": state.start_time.clone().unwrap_or_else(timestamp_now),
                "input": state.input,
                "output": state.output,
                "metadata": Value::Object(state.metadata.clone()),
            });
            if let Some(error) = &state.error {
                trace["metadata"]["error"] = Value::String(error.clone());
            }

            let mut events = vec![("trace-create", trace)];
            events.append(&mut state.observations);
            events
        };

        for (event_type, body) in events {
            self.client.enqueue(event_type, body);
        }

        match self.client.flush().await {
            Ok(sent) => debug!("Exported trace with {} events", sent),
            Err(e) => warn!("Failed to export trace: {}", e),
        }
    }
}

#[async_trait]
impl CallbackHandler for TraceHandler {
    async fn handle_event(&self, event: CallbackEvent) -> Result<(), CallbackError> {
        let mut state = self.state();

        match event {
            CallbackEvent::RunStart { run_id, prompt } => {
                state.trace_id = Some(generate_trace_id());
                state.start_time = Some(timestamp_now());
                state.input = Some(prompt);
                state
                    .metadata
                    .insert("run_id".to_string(), Value::String(run_id.to_string()));
            }
            CallbackEvent::ModelStart {
                model_id, messages, ..
            } => {
                state.generation = Some(OpenGeneration {
                    id: generate_observation_id(),
                    start_time: timestamp_now(),
                    model: model_id,
                    input: conversation_input(&messages),
                });
            }
            CallbackEvent::ModelComplete {
                model_id,
                response,
                tool_calls,
                tokens,
                ..
            } => {
                let trace_id = state.trace_id.clone();
                let open = state.generation.take().unwrap_or_else(|| OpenGeneration {
                    id: generate_observation_id(),
                    start_time: timestamp_now(),
                    model: model_id,
                    input: Value::Null,
                });
                let mut body = json!({
                    "id": open.id,
                    "traceId": trace_id,
                    "name": "chat",
                    "startTime": open.start_time,
                    "endTime": timestamp_now(),
                    "model": open.model,
                    "input": open.input,
                    "output": response,
                    "metadata": {"tool_calls": tool_calls},
                });
                if let Some(usage) = tokens {
                    body["usage"] = json!({
                        "input": usage.input_tokens,
                        "output": usage.output_tokens,
                        "total": usage.total_tokens,
                    });
                }
                state.observations.push(("generation-create", body));
            }
            CallbackEvent::ToolStart {
                tool_use_id, input, ..
            } => {
                state.spans.insert(
                    tool_use_id,
                    OpenSpan {
                        id: generate_observation_id(),
                        start_time: timestamp_now(),
                        input,
                    },
                );
            }
            CallbackEvent::ToolComplete {
                tool_name,
                tool_use_id,
                output,
                error,
                ..
            } => {
                let trace_id = state.trace_id.clone();
                let open = state.spans.remove(&tool_use_id).unwrap_or_else(|| OpenSpan {
                    id: generate_observation_id(),
                    start_time: timestamp_now(),
                    input: Value::Null,
                });
                let mut body = json!({
                    "id": open.id,
                    "traceId": trace_id,
                    "name": tool_name,
                    "startTime": open.start_time,
                    "endTime": timestamp_now(),
                    "input": open.input,
                    "output": output,
                });
                if let Some(error) = error {
                    body["level"] = Value::String("ERROR".to_string());
                    body["statusMessage"] = Value::String(error);
                }
                state.observations.push(("span-create", body));
            }
            CallbackEvent::RunComplete { summary, response } => {
                state.output = response;
                state.metadata.insert("cycles".to_string(), json!(summary.cycles));
                state
                    .metadata
                    .insert("tools_called".to_string(), json!(summary.tools_called));
                state.metadata.insert(
                    "total_tokens".to_string(),
                    json!(summary.usage.total_tokens),
                );
            }
            CallbackEvent::Error { error, context } => {
                state.error = Some(format!("{}: {}", context, error));
            }
        }
        Ok(())
    }
}
