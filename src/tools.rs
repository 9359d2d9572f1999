//! Tool definitions and the registry that dispatches them.
//!
//! Every tool is a small [`Tool`] implementation that binds its parameters
//! and forwards one call to the [`SearchBackend`]. The full set lives in a
//! static table; which ones are exposed is decided at startup by filtering
//! that table with the enabled-name list from the config.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                ToolRegistry                 │
//! │  hybrid_search  semantic_search  text_search│
//! │  filtered_search              fetch_document│
//! └──────────────────────┬──────────────────────┘
//!                        ▼
//!              SearchBackend (Azure AI Search)
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::backend::{Document, SearchBackend, SearchMode, SearchRequest};

/// Names of every tool this server knows how to build.
pub const KNOWN_TOOLS: [&str; 5] = [
    "hybrid_search",
    "semantic_search",
    "text_search",
    "filtered_search",
    "fetch_document",
];

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A named, schema-typed operation callable by an MCP client.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Identifier used in `tools/call`, e.g. `"hybrid_search"`.
    fn name(&self) -> &str;

    /// One-line description shown to agents in `tools/list`.
    fn description(&self) -> &str;

    /// JSON Schema for the parameters object.
    ///
    /// Defaults declared here are filled in by [`validate_params`] before
    /// [`execute`](Tool::execute) runs.
    fn parameters_schema(&self) -> Value;

    /// Executes the tool with validated parameters.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// What a tool can reach while executing.
pub struct ToolContext {
    backend: Arc<dyn SearchBackend>,
}

impl ToolContext {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn SearchBackend {
        self.backend.as_ref()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

fn query_schema(default_top: u32, extra: Option<(&str, Value)>) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert(
        "query".to_string(),
        json!({ "type": "string", "description": "The search query" }),
    );
    let mut required = vec![json!("query")];
    if let Some((name, schema)) = extra {
        properties.insert(name.to_string(), schema);
        required.push(json!(name));
    }
    properties.insert(
        "top".to_string(),
        json!({
            "type": "integer",
            "description": "Maximum results to return",
            "default": default_top,
            "minimum": 1,
            "maximum": u32::MAX
        }),
    );
    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn results_payload(docs: Vec<Document>) -> Value {
    json!({
        "count": docs.len(),
        "results": docs,
    })
}

// Parameters have already been validated, so these only fail on a
// schema/implementation mismatch.
fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str> {
    params[name]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("parameter '{}' must be a string", name))
}

fn top_param(params: &Value) -> Result<u32> {
    params["top"]
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| anyhow::anyhow!("parameter 'top' must be a positive integer"))
}

/// Runs a plain query in one of the ranking modes.
pub struct QueryTool {
    name: &'static str,
    description: &'static str,
    mode: SearchMode,
    default_top: u32,
}

impl QueryTool {
    pub fn hybrid(default_top: u32) -> Self {
        Self {
            name: "hybrid_search",
            description: "Combines full-text and vector search for balanced results.",
            mode: SearchMode::Hybrid,
            default_top,
        }
    }

    pub fn semantic(default_top: u32) -> Self {
        Self {
            name: "semantic_search",
            description: "Performs AI-powered semantic search that understands context and \
                          meaning. Works with or without a semantic configuration.",
            mode: SearchMode::Semantic,
            default_top,
        }
    }

    pub fn text(default_top: u32) -> Self {
        Self {
            name: "text_search",
            description: "Traditional keyword-based text search.",
            mode: SearchMode::Text,
            default_top,
        }
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> Value {
        query_schema(self.default_top, None)
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let request = SearchRequest::new(str_param(&params, "query")?, top_param(&params)?, self.mode);
        let docs = ctx.backend().search(&request).await?;
        Ok(results_payload(docs))
    }
}

/// Query narrowed by a boolean filter expression.
pub struct FilteredSearchTool {
    default_top: u32,
}

impl FilteredSearchTool {
    pub fn new(default_top: u32) -> Self {
        Self { default_top }
    }
}

#[async_trait]
impl Tool for FilteredSearchTool {
    fn name(&self) -> &str {
        "filtered_search"
    }

    fn description(&self) -> &str {
        "Search with OData filter expressions to narrow results \
         (e.g. \"category eq 'AI' and year ge 2020\")."
    }

    fn parameters_schema(&self) -> Value {
        query_schema(
            self.default_top,
            Some((
                "filter",
                json!({
                    "type": "string",
                    "description": "OData filter expression (e.g. \"category eq 'AI' and year ge 2020\")"
                }),
            )),
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let request = SearchRequest::new(
            str_param(&params, "query")?,
            top_param(&params)?,
            SearchMode::Text,
        )
        .with_filter(str_param(&params, "filter")?);
        let docs = ctx.backend().search(&request).await?;
        Ok(results_payload(docs))
    }
}

/// Retrieves one document by key.
pub struct FetchDocumentTool;

#[async_trait]
impl Tool for FetchDocumentTool {
    fn name(&self) -> &str {
        "fetch_document"
    }

    fn description(&self) -> &str {
        "Retrieve a specific document by its unique ID. Returns the complete document with all fields."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "document_id": { "type": "string", "description": "Document key" }
            },
            "required": ["document_id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let doc = ctx.backend().fetch(str_param(&params, "document_id")?).await?;
        Ok(Value::Object(doc))
    }
}

/// Builds the tool definition for `name`, or `None` if no such tool exists.
pub fn build_tool(name: &str, default_top: u32) -> Option<Box<dyn Tool>> {
    let tool: Box<dyn Tool> = match name {
        "hybrid_search" => Box::new(QueryTool::hybrid(default_top)),
        "semantic_search" => Box::new(QueryTool::semantic(default_top)),
        "text_search" => Box::new(QueryTool::text(default_top)),
        "filtered_search" => Box::new(FilteredSearchTool::new(default_top)),
        "fetch_document" => Box::new(FetchDocumentTool),
        _ => return None,
    };
    Some(tool)
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter Validation
// ═══════════════════════════════════════════════════════════════════════

/// Validates `params` against a tool's JSON Schema and fills in defaults.
///
/// Checks required fields, JSON types and integer `minimum`/`maximum`. Properties not
/// in the schema are passed through untouched.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value, String> {
    let mut result = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => return Err(format!("parameters must be an object, got {}", json_type_name(other))),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for req_field in &required {
        if !matches!(result.get(*req_field), Some(v) if !v.is_null()) {
            return Err(format!("missing required parameter: {}", req_field));
        }
    }

    for (prop_name, prop_schema) in &properties {
        match result.get(prop_name) {
            Some(value) if !value.is_null() => {
                if let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) {
                    let type_ok = match expected_type {
                        "string" => value.is_string(),
                        "integer" => value.is_i64() || value.is_u64(),
                        "number" => value.is_number(),
                        "boolean" => value.is_boolean(),
                        "array" => value.is_array(),
                        "object" => value.is_object(),
                        _ => true,
                    };
                    if !type_ok {
                        return Err(format!(
                            "parameter '{}' must be of type '{}', got {}",
                            prop_name,
                            expected_type,
                            json_type_name(value)
                        ));
                    }
                }

                if let (Some(min), Some(n)) = (
                    prop_schema.get("minimum").and_then(|m| m.as_i64()),
                    value.as_i64(),
                ) {
                    if n < min {
                        return Err(format!("parameter '{}' must be >= {}, got {}", prop_name, min, n));
                    }
                }

                if let (Some(max), Some(n)) = (
                    prop_schema.get("maximum").and_then(|m| m.as_u64()),
                    value.as_u64(),
                ) {
                    if n > max {
                        return Err(format!("parameter '{}' must be <= {}, got {}", prop_name, max, n));
                    }
                }
            }
            _ => {
                if let Some(default) = prop_schema.get("default") {
                    result.insert(prop_name.clone(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Why a tool call did not produce a result.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no tool registered with name: {0}")]
    UnknownTool(String),
    #[error("{tool}: {message}")]
    InvalidParams { tool: String, message: String },
    /// The backend failed; the message is passed through unchanged.
    #[error(transparent)]
    Backend(anyhow::Error),
}

/// The set of tools exposed to clients, in registration order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    backend: Arc<dyn SearchBackend>,
}

impl ToolRegistry {
    /// Create an empty registry dispatching to `backend`.
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            tools: Vec::new(),
            backend,
        }
    }

    /// Registers exactly the named tools, in order.
    ///
    /// Unknown or repeated names are an error.
    pub fn from_enabled(
        backend: Arc<dyn SearchBackend>,
        enabled: &[String],
        default_top: u32,
    ) -> Result<Self> {
        let mut registry = Self::new(backend);
        for name in enabled {
            let tool = build_tool(name, default_top)
                .ok_or_else(|| anyhow::anyhow!("unknown tool: {}", name))?;
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Register a tool. A second tool with the same name is rejected.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<()> {
        if self.find(tool.name()).is_some() {
            anyhow::bail!("tool already registered: {}", tool.name());
        }
        tracing::debug!(tool = tool.name(), "registered tool");
        self.tools.push(tool);
        Ok(())
    }

    /// Get all registered tools.
    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    /// Find a tool by name.
    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Looks up `name`, binds `params` and runs the tool.
    pub async fn dispatch(&self, name: &str, params: Value) -> Result<Value, DispatchError> {
        let tool = self
            .find(name)
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;

        let params = validate_params(&tool.parameters_schema(), &params).map_err(|message| {
            DispatchError::InvalidParams {
                tool: name.to_string(),
                message,
            }
        })?;

        let ctx = ToolContext::new(self.backend.clone());
        tool.execute(params, &ctx).await.map_err(|e| {
            tracing::warn!(tool = name, error = %e, "tool call failed");
            DispatchError::Backend(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns `docs` for every search and records each request.
    struct StubBackend {
        docs: Vec<Document>,
        calls: Mutex<Vec<SearchRequest>>,
    }

    impl StubBackend {
        fn with_ids(ids: &[&str]) -> Arc<Self> {
            let docs = ids
                .iter()
                .map(|id| json!({ "id": id }).as_object().cloned().unwrap())
                .collect();
            Arc::new(Self {
                docs,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<SearchRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchBackend for StubBackend {
        async fn search(&self, request: &SearchRequest) -> Result<Vec<Document>> {
            self.calls.lock().unwrap().push(request.clone());
            Ok(self.docs.clone())
        }

        async fn fetch(&self, document_id: &str) -> Result<Document> {
            self.docs
                .iter()
                .find(|d| d["id"] == document_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("document not found: {}", document_id))
        }
    }

    fn all_tools() -> Vec<String> {
        KNOWN_TOOLS.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn hybrid_search_preserves_order_and_count() {
        let backend = StubBackend::with_ids(&["c", "a", "b"]);
        let registry =
            ToolRegistry::from_enabled(backend.clone(), &["hybrid_search".to_string()], 5).unwrap();

        let out = registry
            .dispatch("hybrid_search", json!({ "query": "test", "top": 5 }))
            .await
            .unwrap();

        assert_eq!(out["count"], 3);
        let ids: Vec<&str> = out["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        let calls = backend.calls();
        assert_eq!(calls, vec![SearchRequest::new("test", 5, SearchMode::Hybrid)]);
    }

    #[tokio::test]
    async fn top_defaults_from_profile() {
        let backend = StubBackend::with_ids(&[]);
        let registry = ToolRegistry::from_enabled(backend.clone(), &all_tools(), 30).unwrap();

        registry
            .dispatch("semantic_search", json!({ "query": "x" }))
            .await
            .unwrap();
        registry
            .dispatch("text_search", json!({ "query": "y", "top": 2 }))
            .await
            .unwrap();

        let calls = backend.calls();
        assert_eq!(calls[0], SearchRequest::new("x", 30, SearchMode::Semantic));
        assert_eq!(calls[1], SearchRequest::new("y", 2, SearchMode::Text));
    }

    #[tokio::test]
    async fn filter_reaches_backend_unmodified() {
        let backend = StubBackend::with_ids(&["a"]);
        let registry = ToolRegistry::from_enabled(backend.clone(), &all_tools(), 5).unwrap();
        let filter = "category eq 'AI' and year ge 2020";

        registry
            .dispatch("filtered_search", json!({ "query": "q", "filter": filter }))
            .await
            .unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].filter.as_deref(), Some(filter));
        assert_eq!(calls[0].filter.as_ref().map(|f| f.as_bytes()), Some(filter.as_bytes()));
    }

    #[tokio::test]
    async fn fetch_document_found_and_missing() {
        let backend = StubBackend::with_ids(&["doc-1"]);
        let registry = ToolRegistry::from_enabled(backend, &all_tools(), 5).unwrap();

        let doc = registry
            .dispatch("fetch_document", json!({ "document_id": "doc-1" }))
            .await
            .unwrap();
        assert_eq!(doc, json!({ "id": "doc-1" }));

        let err = registry
            .dispatch("fetch_document", json!({ "document_id": "missing-id" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Backend(_)));
        assert_eq!(err.to_string(), "document not found: missing-id");
    }

    #[tokio::test]
    async fn missing_required_param_is_invalid_params() {
        let backend = StubBackend::with_ids(&["a"]);
        let registry = ToolRegistry::from_enabled(backend.clone(), &all_tools(), 5).unwrap();

        let err = registry
            .dispatch("filtered_search", json!({ "query": "q" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidParams { .. }));
        assert!(err.to_string().contains("missing required parameter: filter"));

        let err = registry
            .dispatch("hybrid_search", json!({ "query": "q", "top": 0 }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidParams { .. }));

        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn oversized_top_is_invalid_params() {
        let backend = StubBackend::with_ids(&["a"]);
        let registry =
            ToolRegistry::from_enabled(backend.clone(), &["hybrid_search".to_string()], 5).unwrap();

        let err = registry
            .dispatch("hybrid_search", json!({ "query": "q", "top": 5_000_000_000u64 }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidParams { .. }));
        assert!(err.to_string().contains("must be <= 4294967295"), "{err}");
        assert!(backend.calls().is_empty());

        registry
            .dispatch("hybrid_search", json!({ "query": "q", "top": u32::MAX }))
            .await
            .unwrap();
        assert_eq!(backend.calls()[0].top, u32::MAX);
    }

    #[tokio::test]
    async fn dormant_tools_are_not_dispatchable() {
        let backend = StubBackend::with_ids(&["a"]);
        let registry =
            ToolRegistry::from_enabled(backend.clone(), &["hybrid_search".to_string()], 5).unwrap();
        assert_eq!(registry.names(), vec!["hybrid_search"]);

        let err = registry
            .dispatch("text_search", json!({ "query": "q" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownTool(_)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let backend = StubBackend::with_ids(&["a"]);
        let mut registry = ToolRegistry::new(backend.clone());
        registry.register(Box::new(QueryTool::hybrid(5))).unwrap();
        let err = registry.register(Box::new(QueryTool::hybrid(5))).unwrap_err();
        assert_eq!(err.to_string(), "tool already registered: hybrid_search");
        assert_eq!(registry.len(), 1);

        registry
            .dispatch("hybrid_search", json!({ "query": "q" }))
            .await
            .unwrap();
        assert_eq!(backend.calls().len(), 1);

        let enabled = vec!["text_search".to_string(), "text_search".to_string()];
        assert!(ToolRegistry::from_enabled(backend, &enabled, 5).is_err());
    }

    #[test]
    fn validate_params_type_errors() {
        let schema = QueryTool::text(5).parameters_schema();
        let err = validate_params(&schema, &json!({ "query": 42 })).unwrap_err();
        assert_eq!(err, "parameter 'query' must be of type 'string', got number");

        let err = validate_params(&schema, &json!("query")).unwrap_err();
        assert!(err.contains("must be an object"));

        let ok = validate_params(&schema, &json!({ "query": "q", "extra": true })).unwrap();
        assert_eq!(ok, json!({ "query": "q", "top": 5, "extra": true }));
    }

    #[test]
    fn every_known_tool_builds() {
        for name in KNOWN_TOOLS {
            let tool = build_tool(name, 5).unwrap();
            assert_eq!(tool.name(), name);
            assert_eq!(tool.parameters_schema()["type"], "object");
        }
        assert!(build_tool("nope", 5).is_none());
    }
}
