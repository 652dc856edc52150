//! The burger shop's two tools: menu price lookup and order placement.

use super::{Tool, ToolError, ToolRegistry, ToolResult};
use crate::knowledge::{EmbeddingError, KnowledgeBase, MenuRecord};
use crate::tool;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Lookup answer when no menu record was retrieved
pub const NO_ITEMS_FOUND: &str = "No items found matching your query.";

/// Marker that starts every order confirmation
pub const ORDER_PLACED_PREFIX: &str = "ORDER_PLACED";

/// Records retrieved per lookup
pub const DEFAULT_TOP_K: usize = 3;

/// Wrap the item text verbatim as `ORDER_PLACED: [<items>]`
pub fn format_order(items: &str) -> String {
    format!("{}: [{}]", ORDER_PLACED_PREFIX, items)
}

/// Join retrieved records with newlines, or the no-match sentinel
pub fn format_lookup(records: &[MenuRecord]) -> String {
    if records.is_empty() {
        return NO_ITEMS_FOUND.to_string();
    }
    records
        .iter()
        .map(MenuRecord::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Semantic price lookup over the shared knowledge base
#[derive(Debug, Clone)]
pub struct LookupPriceTool {
    knowledge: Arc<KnowledgeBase>,
    top_k: usize,
}

impl LookupPriceTool {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self {
            knowledge,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Closest records joined by `\n`, or [`NO_ITEMS_FOUND`]
    pub async fn lookup(&self, query: &str) -> Result<String, EmbeddingError> {
        let records = self.knowledge.retrieve(query, self.top_k).await?;
        Ok(format_lookup(&records))
    }
}

#[async_trait]
impl Tool for LookupPriceTool {
    fn name(&self) -> &str {
        "lookup_price"
    }

    fn description(&self) -> &str {
        "Search the menu database for item prices. Use this tool when the user asks about menu items or prices."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The item name or question to search for (e.g., \"Big Mac\")"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, parameters: Option<Value>) -> Result<ToolResult, ToolError> {
        let query = parameters
            .as_ref()
            .and_then(|p| p.get("query"))
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParameters {
                message: "Missing required parameter: query".to_string(),
            })?;

        let answer = self
            .lookup(query)
            .await
            .map_err(|e| ToolError::KnowledgeUnavailable {
                message: e.to_string(),
            })?;
        Ok(ToolResult::success(Value::String(answer)))
    }
}

#[tool]
/// Place an order for the specified items. Use this tool when the user wants to order
/// items from the menu.
///
/// Args:
///     items: Comma-separated list of items to order (e.g., "Big Mac, Fries")
pub async fn place_order(items: String) -> Result<String, String> {
    Ok(format_order(&items))
}

/// Registry holding `lookup_price` and `place_order`, in that order
pub async fn menu_registry(
    knowledge: Arc<KnowledgeBase>,
    top_k: usize,
) -> Result<ToolRegistry, ToolError> {
    let registry = ToolRegistry::new();
    registry
        .register_tool(Box::new(LookupPriceTool::new(knowledge).with_top_k(top_k)))
        .await?;
    registry.register_tool(place_order()).await?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{default_menu, IndexConfig};
    use crate::test_support::KeywordEmbedder;

    async fn knowledge(records: Vec<MenuRecord>) -> Arc<KnowledgeBase> {
        Arc::new(
            KnowledgeBase::build(
                records,
                Arc::new(KeywordEmbedder::default()),
                &IndexConfig::default(),
            )
            .await
            .unwrap(),
        )
    }

    #[test]
    fn test_format_order_is_verbatim() {
        assert_eq!(format_order("Big Mac"), "ORDER_PLACED: [Big Mac]");
        assert_eq!(format_order("Whopper, Fries"), "ORDER_PLACED: [Whopper, Fries]");
        assert_eq!(format_order(""), "ORDER_PLACED: []");
        assert_eq!(format_order("Big Mac"), format_order("Big Mac"));
    }

    #[tokio::test]
    async fn test_lookup_big_mac_and_fries() {
        let tool = LookupPriceTool::new(knowledge(default_menu()).await);

        let answer = tool.lookup("How much is a Big Mac?").await.unwrap();
        assert!(answer.contains("$5"));
        assert_eq!(answer.lines().next(), Some("Big Mac: $5"));
        assert_eq!(answer.lines().count(), 3);

        let answer = tool.with_top_k(1).lookup("Fries").await.unwrap();
        assert_eq!(answer, "Fries: $2");
    }

    #[tokio::test]
    async fn test_empty_knowledge_base_returns_sentinel() {
        let tool = LookupPriceTool::new(knowledge(Vec::new()).await);
        let answer = tool.lookup("Big Mac").await.unwrap();
        assert_eq!(answer, NO_ITEMS_FOUND);
        assert!(!answer.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_tool_execute() {
        let tool = LookupPriceTool::new(knowledge(default_menu()).await).with_top_k(1);
        let result = tool
            .execute(Some(json!({"query": "whopper"})))
            .await
            .unwrap();
        assert_eq!(result.to_text(), "Whopper: $6");

        let err = tool.execute(Some(json!({"q": "x"}))).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters { .. }));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_fatal() {
        let kb = KnowledgeBase::build(
            default_menu(),
            Arc::new(KeywordEmbedder::failing_after(1)),
            &IndexConfig::default(),
        )
        .await
        .unwrap();
        let tool = LookupPriceTool::new(Arc::new(kb));

        assert!(tool.lookup("Big Mac").await.is_err());
        let err = tool
            .execute(Some(json!({"query": "Big Mac"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::KnowledgeUnavailable { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_place_order_tool_from_macro() {
        let tool = place_order();
        assert_eq!(tool.name(), "place_order");
        assert!(tool.description().starts_with("Place an order for the specified items."));

        let schema = tool.parameters_schema();
        assert_eq!(schema["properties"]["items"]["type"], "string");
        assert_eq!(schema["required"], json!(["items"]));
        assert!(schema["properties"]["items"]["description"]
            .as_str()
            .unwrap()
            .starts_with("Comma-separated list of items"));

        let result = tool
            .execute(Some(json!({"items": "Whopper, Fries"})))
            .await
            .unwrap();
        assert_eq!(result.to_text(), "ORDER_PLACED: [Whopper, Fries]");

        let err = tool.execute(None).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters { .. }));
    }

    #[tokio::test]
    async fn test_menu_registry_order() {
        let registry = menu_registry(knowledge(default_menu()).await, 3)
            .await
            .unwrap();
        let schemas = registry.get_tool_schemas().await;
        let names: Vec<&str> = schemas.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["lookup_price", "place_order"]);
    }
}
