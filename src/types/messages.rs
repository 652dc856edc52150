//! Message types for agent conversations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::content::ContentBlock;

/// Role of a turn in the conversation
///
/// Roles the crate does not know about are kept verbatim in `Other` so that a provider
/// returning e.g. a `"model"` or `"critic"` turn still round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the customer
    User,
    /// Message from the AI assistant
    Assistant,
    /// System message (instructions, context)
    System,
    /// Result of a tool invocation
    Tool,
    #[serde(untagged)]
    Other(String),
}

impl MessageRole {
    pub fn as_str(&self) -> &str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::Tool => "tool",
            MessageRole::Other(role) => role,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, MessageRole::User)
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for MessageRole {
    fn from(role: &str) -> Self {
        match role {
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            "system" => MessageRole::System,
            "tool" => MessageRole::Tool,
            other => MessageRole::Other(other.to_string()),
        }
    }
}

/// A single turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Message {
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(MessageRole::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self::new(MessageRole::Assistant, vec![ContentBlock::text(text)])
    }

    pub fn system<S: Into<String>>(text: S) -> Self {
        Self::new(MessageRole::System, vec![ContentBlock::text(text)])
    }

    /// Create a tool turn carrying the plain-text result of one invocation
    pub fn tool_result<S: Into<String>>(tool_use_id: S, content: S, is_error: bool) -> Self {
        Self::new(
            MessageRole::Tool,
            vec![ContentBlock::tool_result(tool_use_id, content, is_error)],
        )
    }

    pub fn new(role: MessageRole, content: Vec<ContentBlock>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            metadata: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: String, value: serde_json::Value) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Get the text payload of this turn (if any)
    ///
    /// Text blocks and tool-result contents are concatenated in order; tool-use blocks
    /// carry no text.
    pub fn text(&self) -> Option<String> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.clone()),
                ContentBlock::ToolResult { content, .. } => Some(content.clone()),
                ContentBlock::ToolUse { .. } => None,
            })
            .reduce(|acc, text| acc + &text)
    }

    /// Text payload exactly as stored, `None` when blank or whitespace-only
    pub fn non_empty_text(&self) -> Option<String> {
        self.text().filter(|text| !text.trim().is_empty())
    }

    pub fn has_tool_use(&self) -> bool {
        self.content.iter().any(ContentBlock::is_tool_use)
    }

    pub fn has_tool_result(&self) -> bool {
        self.content.iter().any(ContentBlock::is_tool_result)
    }

    pub fn tool_uses(&self) -> Vec<&ContentBlock> {
        self.content
            .iter()
            .filter(|block| block.is_tool_use())
            .collect()
    }
}

/// A conversation: ordered turns plus the optional instruction preamble
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Messages {
    /// Turns in chronological order
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Messages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            system_prompt: Some(system_prompt.into()),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|msg| msg.role == MessageRole::Assistant)
    }

    pub fn add_user_message(&mut self, text: &str) {
        self.push(Message::user(text));
    }

    /// Turns appended after the first `offset` turns
    pub fn appended_since(&self, offset: usize) -> &[Message] {
        self.messages.get(offset..).unwrap_or(&[])
    }

    /// Total number of tool invocations requested across all assistant turns
    pub fn tool_call_count(&self) -> usize {
        self.messages
            .iter()
            .map(|msg| msg.tool_uses().len())
            .sum()
    }
}

impl std::ops::Deref for Messages {
    type Target = Vec<Message>;

    fn deref(&self) -> &Self::Target {
        &self.messages
    }
}

impl std::ops::DerefMut for Messages {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.messages
    }
}

impl From<Vec<Message>> for Messages {
    fn from(messages: Vec<Message>) -> Self {
        Self {
            messages,
            system_prompt: None,
        }
    }
}

impl IntoIterator for Messages {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("How much is a Big Mac?");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.text(), Some("How much is a Big Mac?".to_string()));
        assert!(!msg.has_tool_use());
        assert!(!msg.has_tool_result());
    }

    #[test]
    fn test_tool_turn_text_is_result_content() {
        let msg = Message::tool_result("call_1", "Big Mac: $5", false);
        assert_eq!(msg.role, MessageRole::Tool);
        assert!(msg.has_tool_result());
        assert_eq!(msg.text().as_deref(), Some("Big Mac: $5"));
    }

    #[test]
    fn test_tool_use_only_turn_has_no_text() {
        let msg = Message::new(
            MessageRole::Assistant,
            vec![ContentBlock::tool_use(
                "call_1",
                "place_order",
                json!({"items": "Big Mac"}),
            )],
        );
        assert_eq!(msg.text(), None);
        assert_eq!(msg.non_empty_text(), None);
        assert_eq!(msg.tool_uses().len(), 1);
    }

    #[test]
    fn test_blank_text_is_not_non_empty() {
        assert_eq!(Message::assistant("   \n").non_empty_text(), None);
        assert_eq!(
            Message::assistant("  ok ").non_empty_text().as_deref(),
            Some("  ok ")
        );
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_value(MessageRole::Tool).unwrap(), json!("tool"));
        assert_eq!(
            serde_json::to_value(MessageRole::Other("critic".into())).unwrap(),
            json!("critic")
        );

        let role: MessageRole = serde_json::from_value(json!("assistant")).unwrap();
        assert_eq!(role, MessageRole::Assistant);
        let role: MessageRole = serde_json::from_value(json!("model")).unwrap();
        assert_eq!(role, MessageRole::Other("model".to_string()));

        assert_eq!(MessageRole::from("tool"), MessageRole::Tool);
        assert_eq!(MessageRole::Other("model".into()).to_string(), "model");
    }

    #[test]
    fn test_messages_collection() {
        let mut messages = Messages::with_system_prompt("Be friendly.");
        assert!(messages.is_empty());

        messages.add_user_message("Hello");
        messages.push(Message::new(
            MessageRole::Assistant,
            vec![ContentBlock::tool_use("c1", "lookup_price", json!({"query": "fries"}))],
        ));
        messages.push(Message::tool_result("c1", "Fries: $2", false));
        messages.push(Message::assistant("Fries are $2."));

        assert_eq!(messages.len(), 4);
        assert_eq!(messages.tool_call_count(), 1);
        assert_eq!(messages.appended_since(1).len(), 3);
        assert!(messages.appended_since(10).is_empty());
        assert_eq!(
            messages.last_assistant_message().and_then(|m| m.text()),
            Some("Fries are $2.".to_string())
        );
        assert_eq!(messages.system_prompt.as_deref(), Some("Be friendly."));
    }
}
