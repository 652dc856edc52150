//! Evaluation harness: deterministic evaluators, an experiment runner over a fixed
//! dataset, and an LLM judge for rubric-graded checks.

pub mod evaluators;
pub mod experiment;
pub mod judge;

pub use evaluators::{
    average_score, contains_expected, default_item_evaluators, default_run_evaluators,
    price_accuracy, tool_execution, Evaluation, EvaluationInput, ItemEvaluator, RunEvaluator,
};
pub use experiment::{
    default_dataset, run_experiment, ExperimentItem, ExperimentResult, ExperimentTask, ItemResult,
};
pub use judge::{judge_rubrics, parse_verdict, JudgeRubric, JudgeVerdict, LlmJudge, DEFAULT_THRESHOLD};
