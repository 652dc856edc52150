//! Deterministic evaluators for agent replies.
//!
//! Item evaluators score one `(input, output, expected)` triple; run evaluators
//! aggregate the scores of a whole experiment. Both return an [`Evaluation`], whose
//! `value` is `None` when there was nothing to score.

use super::experiment::ItemResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PRICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\d+)").expect("price pattern is valid"));

/// One named score with a human-readable comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub name: String,
    pub value: Option<f64>,
    pub comment: String,
}

impl Evaluation {
    pub fn new(name: &str, value: Option<f64>, comment: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value,
            comment: comment.into(),
        }
    }

    fn pass(name: &str, comment: impl Into<String>) -> Self {
        Self::new(name, Some(1.0), comment)
    }

    fn fail(name: &str, comment: impl Into<String>) -> Self {
        Self::new(name, Some(0.0), comment)
    }

    pub fn passed(&self) -> bool {
        self.value == Some(1.0)
    }
}

/// What an item evaluator looks at
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub input: &'a str,
    pub output: &'a str,
    pub expected_output: &'a str,
}

pub type ItemEvaluator = fn(&EvaluationInput<'_>) -> Evaluation;
pub type RunEvaluator = fn(&[ItemResult]) -> Evaluation;

/// Every `" and "`-separated part of the expected text appears in the output,
/// ignoring case
pub fn contains_expected(item: &EvaluationInput<'_>) -> Evaluation {
    const NAME: &str = "contains_expected";
    if item.output.is_empty() || item.expected_output.is_empty() {
        return Evaluation::fail(NAME, "Missing output or expected");
    }

    let output = item.output.to_lowercase();
    let parts: Vec<&str> = item.expected_output.split(" and ").map(str::trim).collect();
    if parts.iter().all(|part| output.contains(&part.to_lowercase())) {
        Evaluation::pass(NAME, format!("Found all expected: {:?}", parts))
    } else {
        Evaluation::fail(NAME, format!("Missing some of: {:?}", parts))
    }
}

/// The first `$<digits>` of the expected text appears verbatim in the output
pub fn price_accuracy(item: &EvaluationInput<'_>) -> Evaluation {
    const NAME: &str = "price_accuracy";
    if item.output.is_empty() {
        return Evaluation::fail(NAME, "No output");
    }

    let Some(price) = PRICE_PATTERN.find(item.expected_output) else {
        return Evaluation::pass(NAME, "No price expected");
    };
    let price = price.as_str();

    if item.output.contains(price) {
        Evaluation::pass(NAME, format!("Correct price {} found", price))
    } else {
        Evaluation::fail(NAME, format!("Expected {}, not found in output", price))
    }
}

/// When an order is expected, the output must say one was placed
pub fn tool_execution(item: &EvaluationInput<'_>) -> Evaluation {
    const NAME: &str = "tool_execution";
    if item.expected_output.is_empty() {
        return Evaluation::fail(NAME, "Missing expected output");
    }
    if !item.expected_output.to_uppercase().contains("ORDER_PLACED") {
        return Evaluation::pass(NAME, "No tool execution expected");
    }
    if item.output.is_empty() {
        return Evaluation::fail(NAME, "No output");
    }

    let lower = item.output.to_lowercase();
    let has_order =
        lower.contains("order") && (lower.contains("placed") || item.output.contains("ORDER_PLACED"));
    if has_order {
        Evaluation::pass(NAME, "Order was placed")
    } else {
        Evaluation::fail(NAME, "Order was expected but not placed")
    }
}

/// Mean of every non-null item score
pub fn average_score(results: &[ItemResult]) -> Evaluation {
    const NAME: &str = "average_score";
    let scores: Vec<f64> = results
        .iter()
        .flat_map(|result| result.evaluations.iter())
        .filter_map(|evaluation| evaluation.value)
        .collect();

    if scores.is_empty() {
        return Evaluation::new(NAME, None, "No scores available");
    }

    let average = scores.iter().sum::<f64>() / scores.len() as f64;
    Evaluation::new(
        NAME,
        Some(average),
        format!(
            "Average across {} evaluations: {:.2}%",
            scores.len(),
            average * 100.0
        ),
    )
}

/// The three item evaluators, in reporting order
pub fn default_item_evaluators() -> Vec<ItemEvaluator> {
    vec![contains_expected, price_accuracy, tool_execution]
}

pub fn default_run_evaluators() -> Vec<RunEvaluator> {
    vec![average_score]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::experiment::ExperimentItem;

    fn item<'a>(output: &'a str, expected_output: &'a str) -> EvaluationInput<'a> {
        EvaluationInput {
            input: "question",
            output,
            expected_output,
        }
    }

    #[test]
    fn test_contains_expected_splits_on_and() {
        let eval = contains_expected(&item(
            "A Big Mac is $5. Your order_placed confirmation is ready.",
            "$5 and ORDER_PLACED",
        ));
        assert!(eval.passed());

        let eval = contains_expected(&item("A Big Mac is $5.", "$5 and ORDER_PLACED"));
        assert_eq!(eval.value, Some(0.0));

        let eval = contains_expected(&item("", "$5"));
        assert_eq!(eval.value, Some(0.0));
        assert_eq!(eval.comment, "Missing output or expected");
    }

    #[test]
    fn test_price_accuracy() {
        assert!(price_accuracy(&item("Fries are $2.", "$2")).passed());
        assert!(!price_accuracy(&item("Fries are $3.", "$2")).passed());
        // "$5" must appear verbatim; "$50" contains it
        assert!(price_accuracy(&item("That's $50", "$5 and ORDER_PLACED")).passed());

        let eval = price_accuracy(&item("Order placed!", "ORDER_PLACED"));
        assert_eq!(eval.value, Some(1.0));
        assert_eq!(eval.comment, "No price expected");

        assert_eq!(price_accuracy(&item("", "$2")).value, Some(0.0));
    }

    #[test]
    fn test_tool_execution() {
        assert!(tool_execution(&item("Fries are $2.", "$2")).passed());
        assert!(tool_execution(&item("Your order has been placed!", "ORDER_PLACED")).passed());
        assert!(tool_execution(&item("ORDER_PLACED: [Whopper, Fries] order", "ORDER_PLACED")).passed());
        assert!(!tool_execution(&item("A Whopper is $6.", "ORDER_PLACED")).passed());
        assert_eq!(tool_execution(&item("", "ORDER_PLACED")).value, Some(0.0));
    }

    #[test]
    fn test_average_score_ignores_null_values() {
        let results = vec![ItemResult {
            item: ExperimentItem::new("q", "$5"),
            output: Some("$5".into()),
            trace_id: None,
            error: None,
            evaluations: vec![
                Evaluation::new("a", Some(1.0), ""),
                Evaluation::new("b", Some(0.0), ""),
                Evaluation::new("c", None, ""),
            ],
        }];

        let eval = average_score(&results);
        assert_eq!(eval.value, Some(0.5));
        assert!(eval.comment.contains("2 evaluations"));

        assert_eq!(average_score(&[]).value, None);
    }
}
