//! LLM-graded evaluation.
//!
//! A judge model reads the criteria, the user input, the actual reply and a
//! description of the expected behaviour, and answers with a JSON verdict
//! `{"score": 0..1, "reason": "..."}`.

use crate::error::MenuAgentError;
use crate::llm::traits::{ChatConfig, LlmProvider};
use crate::types::Messages;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Score a verdict needs to pass when no threshold is given
pub const DEFAULT_THRESHOLD: f64 = 0.7;

const JUDGE_INSTRUCTIONS: &str = "You are an evaluation judge. Be objective and consistent. \
Score how well the actual output satisfies the criteria, from 0.0 (not at all) to 1.0 (fully). \
Respond with only a JSON object of the form {\"score\": <number>, \"reason\": \"<brief explanation>\"}.";

/// One LLM-graded case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeRubric {
    pub name: String,
    pub criteria: String,
    pub input: String,
    /// Description of the expected behaviour
    pub expected_output: String,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

/// The judge's decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgeVerdict {
    pub name: String,
    /// Clamped to `0.0..=1.0`
    pub score: f64,
    pub reason: String,
    pub passed: bool,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    score: f64,
    #[serde(default)]
    reason: String,
}

/// Judge backed by any chat provider
#[derive(Debug, Clone)]
pub struct LlmJudge {
    provider: Arc<dyn LlmProvider>,
    config: ChatConfig,
}

impl LlmJudge {
    /// Judge with deterministic sampling on `model_id`
    pub fn new(provider: Arc<dyn LlmProvider>, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            config: ChatConfig {
                temperature: Some(0.0),
                ..ChatConfig::new(model_id)
            },
        }
    }

    pub fn with_config(provider: Arc<dyn LlmProvider>, config: ChatConfig) -> Self {
        Self { provider, config }
    }

    /// Grade `actual_output` against a rubric
    pub async fn evaluate(&self, rubric: &JudgeRubric, actual_output: &str) -> Result<JudgeVerdict> {
        let mut messages = Messages::with_system_prompt(JUDGE_INSTRUCTIONS);
        messages.add_user_message(&judge_prompt(rubric, actual_output));

        let response = self
            .provider
            .chat(&self.config.model_id, &messages, &self.config)
            .await?;
        debug!("Judge response for {}: {}", rubric.name, response.content);

        let (score, reason) = parse_verdict(&response.content)?;
        Ok(JudgeVerdict {
            name: rubric.name.clone(),
            score,
            reason,
            passed: score >= rubric.threshold,
        })
    }
}

fn judge_prompt(rubric: &JudgeRubric, actual_output: &str) -> String {
    format!(
        "Criteria ({}):\n{}\n\nInput:\n\"{}\"\n\nActual output:\n\"{}\"\n\nExpected behaviour:\n\"{}\"",
        rubric.name, rubric.criteria, rubric.input, actual_output, rubric.expected_output
    )
}

/// Pull `(score, reason)` out of the judge's reply
///
/// Accepts surrounding prose or a fenced code block around the JSON object.
pub fn parse_verdict(text: &str) -> Result<(f64, String)> {
    let json = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(MenuAgentError::model_error(format!(
                "Judge returned no JSON verdict: {}",
                text
            )))
        }
    };

    let raw: RawVerdict = serde_json::from_str(json).map_err(|e| {
        MenuAgentError::model_error(format!("Judge returned an invalid verdict: {}", e))
    })?;
    if !raw.score.is_finite() {
        return Err(MenuAgentError::model_error("Judge score is not a number"));
    }

    Ok((raw.score.clamp(0.0, 1.0), raw.reason))
}

/// The four LLM-graded cases of the regression suite
pub fn judge_rubrics() -> Vec<JudgeRubric> {
    let rubric = |name: &str, input: &str, expected: &str, criteria: &str| JudgeRubric {
        name: name.to_string(),
        criteria: criteria.to_string(),
        input: input.to_string(),
        expected_output: expected.to_string(),
        threshold: DEFAULT_THRESHOLD,
    };

    vec![
        rubric(
            "Correctness",
            "How much is a Big Mac and please order one.",
            "The agent should retrieve that a Big Mac costs $5 from the menu database, \
             inform the customer of the price, and place an order for a Big Mac using \
             the place_order tool, confirming the order was placed.",
            "Determine if the actual output demonstrates that: \
             1) The correct price for Big Mac ($5) was retrieved and mentioned, AND \
             2) An order was placed (indicated by ORDER_PLACED confirmation or acknowledgment of placing the order). \
             The response should show both the price lookup and order placement occurred.",
        ),
        rubric(
            "Price Retrieval Correctness",
            "What's the price of Fries?",
            "The agent should retrieve that Fries cost $2 from the menu database \
             and inform the customer of the price.",
            "Determine if the actual output correctly states that Fries cost $2. \
             The price should be accurate based on the menu lookup.",
        ),
        rubric(
            "Order Placement Correctness",
            "I'd like to order a Whopper and Fries please.",
            "The agent should place an order for a Whopper and Fries, \
             confirming the order with ORDER_PLACED or similar confirmation.",
            "Determine if the actual output confirms that an order was placed \
             for a Whopper and Fries. Look for ORDER_PLACED confirmation or \
             acknowledgment that the order has been submitted.",
        ),
        rubric(
            "Friendly Tone",
            "Hi! What can you help me with?",
            "The agent should respond in a friendly, welcoming manner, \
             explaining that it can help with menu information and placing orders.",
            "Evaluate if the actual output is friendly, welcoming, and helpful. \
             The response should be warm and customer-service oriented, \
             making the customer feel welcome at the burger shop.",
        ),
    ]
}
