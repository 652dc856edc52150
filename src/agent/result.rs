//! Reply extraction and execution summaries.
//!
//! A completion run returns the whole conversation. [`extract_reply`] decides which
//! turn is the final answer: scanning newest to oldest, the first assistant turn with
//! text wins, otherwise the first turn with text that did not come from the user.
//! When no turn qualifies the caller falls back to [`render_raw`].

use crate::llm::traits::Usage;
use crate::types::{MessageRole, Messages};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a reply's text came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReplySource {
    /// An assistant turn with text
    Assistant,
    /// Another non-user turn with text (tool result, system or unknown role)
    OtherTurn { role: String },
    /// No turn qualified; the text is the rendered conversation
    RawFallback,
}

/// The turn picked as the final answer
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedReply {
    pub text: String,
    pub source: ReplySource,
    /// Position of the picked turn in the conversation
    pub turn_index: usize,
}

/// Pick the final answer from a finished conversation
pub fn extract_reply(conversation: &Messages) -> Option<ExtractedReply> {
    conversation
        .messages
        .iter()
        .enumerate()
        .rev()
        .find_map(|(index, message)| {
            let text = message.non_empty_text()?;
            let source = match &message.role {
                MessageRole::Assistant => ReplySource::Assistant,
                MessageRole::User => return None,
                other => ReplySource::OtherTurn {
                    role: other.to_string(),
                },
            };
            Some(ExtractedReply {
                text,
                source,
                turn_index: index,
            })
        })
}

/// String rendering of a whole conversation, used when nothing can be extracted
pub fn render_raw(conversation: &Messages) -> String {
    serde_json::to_string(conversation).unwrap_or_else(|_| format!("{:?}", conversation))
}

/// What one engine run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionSummary {
    /// Model calls made
    pub cycles: u32,
    /// Tools invoked, in call order, including failed invocations
    pub tools_called: Vec<String>,
    pub tools_failed: Vec<String>,
    pub duration: Duration,
    /// Token usage summed over all model calls that reported it
    pub usage: Usage,
    /// Whether the run stopped because it hit the cycle limit
    pub hit_cycle_limit: bool,
}

impl ExecutionSummary {
    pub fn used_tools(&self) -> bool {
        !self.tools_called.is_empty()
    }

    pub(crate) fn add_usage(&mut self, usage: &Usage) {
        self.usage.input_tokens += usage.input_tokens;
        self.usage.output_tokens += usage.output_tokens;
        self.usage.total_tokens += usage.total_tokens;
    }
}

/// Final answer of one `respond` call
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub text: String,
    /// Observability trace id, when a trace was opened for the call
    pub trace_id: Option<String>,
    pub source: ReplySource,
}

impl AgentReply {
    pub fn is_raw_fallback(&self) -> bool {
        self.source == ReplySource::RawFallback
    }
}

impl fmt::Display for AgentReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentBlock, Message};
    use serde_json::json;

    fn tool_use_turn() -> Message {
        Message::new(
            MessageRole::Assistant,
            vec![ContentBlock::ToolUse {
                id: "call_0".into(),
                name: "lookup_price".into(),
                input: json!({"query": "Big Mac"}),
            }],
        )
    }

    #[test]
    fn test_assistant_turn_after_tool_turn_wins() {
        let conversation = Messages::from(vec![
            Message::user("How much is a Big Mac?"),
            tool_use_turn(),
            Message::tool_result("call_0", "Big Mac: $5", false),
            Message::assistant("A Big Mac is $5."),
        ]);

        let reply = extract_reply(&conversation).unwrap();
        assert_eq!(reply.text, "A Big Mac is $5.");
        assert_eq!(reply.source, ReplySource::Assistant);
        assert_eq!(reply.turn_index, 3);
    }

    #[test]
    fn test_tool_turn_is_used_when_last_with_text() {
        let conversation = Messages::from(vec![
            Message::user("Order fries"),
            tool_use_turn(),
            Message::tool_result("call_0", "ORDER_PLACED: [Fries]", false),
        ]);

        let reply = extract_reply(&conversation).unwrap();
        assert_eq!(reply.text, "ORDER_PLACED: [Fries]");
        assert_eq!(
            reply.source,
            ReplySource::OtherTurn {
                role: "tool".into()
            }
        );
    }

    #[test]
    fn test_blank_assistant_turn_is_skipped() {
        let conversation = Messages::from(vec![
            Message::user("hi"),
            Message::tool_result("call_0", "Fries: $2", false),
            Message::assistant("   "),
        ]);

        let reply = extract_reply(&conversation).unwrap();
        assert_eq!(reply.text, "Fries: $2");
    }

    #[test]
    fn test_reply_text_is_not_trimmed() {
        let conversation = Messages::from(vec![
            Message::user("Fries?"),
            Message::assistant("  Fries are $2.\n"),
        ]);

        let reply = extract_reply(&conversation).unwrap();
        assert_eq!(reply.text, "  Fries are $2.\n");
    }

    #[test]
    fn test_unknown_role_counts_as_non_user() {
        let conversation = Messages::from(vec![
            Message::user("hi"),
            Message::new(
                MessageRole::Other("critic".into()),
                vec![ContentBlock::text("looks fine")],
            ),
        ]);

        let reply = extract_reply(&conversation).unwrap();
        assert_eq!(
            reply.source,
            ReplySource::OtherTurn {
                role: "critic".into()
            }
        );
    }

    #[test]
    fn test_user_only_conversation_has_no_reply() {
        let conversation = Messages::from(vec![Message::user("anyone there?")]);
        assert!(extract_reply(&conversation).is_none());
        assert!(extract_reply(&Messages::new()).is_none());

        let raw = render_raw(&conversation);
        assert!(raw.contains("anyone there?"));
    }

    #[test]
    fn test_summary_usage_accumulates() {
        let mut summary = ExecutionSummary::default();
        summary.add_usage(&Usage::new(10, 5));
        summary.add_usage(&Usage::new(3, 2));
        assert_eq!(summary.usage, Usage::new(13, 7));
        assert!(!summary.used_tools());
    }
}
