//! Experiment runner: a fixed dataset pushed through the agent and scored.

use super::evaluators::{EvaluationInput, Evaluation, ItemEvaluator, RunEvaluator};
use crate::agent::{Agent, AgentReply};
use crate::telemetry::ObservabilityClient;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One dataset case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentItem {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl ExperimentItem {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name, or the input when unnamed
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.input)
    }
}

/// The four regression cases for the burger shop
pub fn default_dataset() -> Vec<ExperimentItem> {
    vec![
        ExperimentItem::new("How much is a Big Mac?", "$5").named("Price lookup - Big Mac"),
        ExperimentItem::new("What's the price of Fries?", "$2").named("Price lookup - Fries"),
        ExperimentItem::new(
            "How much is a Big Mac and please order one.",
            "$5 and ORDER_PLACED",
        )
        .named("RAG + Tool execution"),
        ExperimentItem::new("I'd like to order a Whopper and Fries please.", "ORDER_PLACED")
            .named("Order placement"),
    ]
}

/// Anything that answers a dataset input
#[async_trait]
pub trait ExperimentTask: Send + Sync {
    async fn run(&self, input: &str) -> Result<AgentReply>;
}

#[async_trait]
impl ExperimentTask for Agent {
    async fn run(&self, input: &str) -> Result<AgentReply> {
        self.respond(input).await
    }
}

/// Outcome of one dataset case
#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    pub item: ExperimentItem,
    pub output: Option<String>,
    pub trace_id: Option<String>,
    /// Task failure, if the agent returned an error
    pub error: Option<String>,
    pub evaluations: Vec<Evaluation>,
}

/// Outcome of a whole experiment
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentResult {
    pub name: String,
    pub item_results: Vec<ItemResult>,
    pub run_evaluations: Vec<Evaluation>,
}

impl ExperimentResult {
    pub fn run_evaluation(&self, name: &str) -> Option<&Evaluation> {
        self.run_evaluations.iter().find(|e| e.name == name)
    }

    /// Value of the `average_score` run evaluation
    pub fn average_score(&self) -> Option<f64> {
        self.run_evaluation("average_score").and_then(|e| e.value)
    }
}

/// Run every item through `task`, score it, then aggregate
///
/// Items run one after another. A failed task is scored against an empty output, so
/// it counts as a miss rather than being skipped. When `scorer` is given, every item
/// score with a trace id is attached to that trace and flushed at the end.
pub async fn run_experiment(
    name: &str,
    items: &[ExperimentItem],
    task: &dyn ExperimentTask,
    evaluators: &[ItemEvaluator],
    run_evaluators: &[RunEvaluator],
    scorer: Option<&ObservabilityClient>,
) -> ExperimentResult {
    info!("Running experiment '{}' over {} items", name, items.len());
    let mut item_results = Vec::with_capacity(items.len());

    for item in items {
        let (output, trace_id, error) = match task.run(&item.input).await {
            Ok(reply) => (Some(reply.text), reply.trace_id, None),
            Err(e) => {
                warn!("Experiment item '{}' failed: {}", item.label(), e);
                (None, None, Some(e.to_string()))
            }
        };

        let input = EvaluationInput {
            input: &item.input,
            output: output.as_deref().unwrap_or(""),
            expected_output: &item.expected_output,
        };
        let evaluations: Vec<Evaluation> =
            evaluators.iter().map(|evaluate| evaluate(&input)).collect();

        if let (Some(scorer), Some(trace_id)) = (scorer, &trace_id) {
            for evaluation in &evaluations {
                if let Some(value) = evaluation.value {
                    scorer.create_score(trace_id, &evaluation.name, value, Some(&evaluation.comment));
                }
            }
        }

        item_results.push(ItemResult {
            item: item.clone(),
            output,
            trace_id,
            error,
            evaluations,
        });
    }

    let run_evaluations = run_evaluators
        .iter()
        .map(|evaluate| evaluate(&item_results))
        .collect();

    if let Some(scorer) = scorer {
        if let Err(e) = scorer.flush().await {
            warn!("Failed to send experiment scores: {}", e);
        }
    }

    ExperimentResult {
        name: name.to_string(),
        item_results,
        run_evaluations,
    }
}
