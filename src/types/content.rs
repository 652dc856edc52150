//! Content block types for messages.

use serde::{Deserialize, Serialize};

/// A block of content within a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content
    Text { text: String },
    /// Tool invocation requested by the assistant
    ToolUse {
        /// Provider-assigned identifier for this call
        id: String,
        /// Name of the tool to call
        name: String,
        /// Input parameters for the tool
        input: serde_json::Value,
    },
    /// Result of a tool execution, always plain text
    ToolResult {
        /// ID of the tool call this result answers
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_use<S: Into<String>>(id: S, name: S, input: serde_json::Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result<S: Into<String>>(tool_use_id: S, content: S, is_error: bool) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }

    /// Get the text content if this is a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }

    /// Get `(id, name, input)` if this is a tool use block
    pub fn as_tool_use(&self) -> Option<(&str, &str, &serde_json::Value)> {
        match self {
            Self::ToolUse { id, name, input } => Some((id, name, input)),
            _ => None,
        }
    }

    /// Get `(tool_use_id, content, is_error)` if this is a tool result block
    pub fn as_tool_result(&self) -> Option<(&str, &str, bool)> {
        match self {
            Self::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Some((tool_use_id, content, *is_error)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_block_accessors() {
        let text = ContentBlock::text("Big Mac: $5");
        assert_eq!(text.as_text(), Some("Big Mac: $5"));
        assert!(!text.is_tool_use());

        let call = ContentBlock::tool_use("call_1", "lookup_price", json!({"query": "fries"}));
        let (id, name, input) = call.as_tool_use().unwrap();
        assert_eq!(id, "call_1");
        assert_eq!(name, "lookup_price");
        assert_eq!(input["query"], "fries");

        let result = ContentBlock::tool_result("call_1", "Fries: $2", false);
        assert!(result.is_tool_result());
        assert_eq!(result.as_tool_result(), Some(("call_1", "Fries: $2", false)));
    }

    #[test]
    fn test_content_block_serialization_tag() {
        let block = ContentBlock::tool_result("call_9", "ORDER_PLACED: [Fries]", false);
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "tool_result");
        assert_eq!(value["content"], "ORDER_PLACED: [Fries]");

        let parsed: ContentBlock =
            serde_json::from_value(json!({"type": "text", "text": "hi"})).unwrap();
        assert_eq!(parsed, ContentBlock::text("hi"));
    }
}
