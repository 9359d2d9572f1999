//! MCP JSON-RPC protocol bridge.
//!
//! Adapts the [`ToolRegistry`] to rmcp's [`ServerHandler`] so the same
//! dispatch path serves every transport.
//!
//! * Registered tools are listed via `list_tools` and invoked via `call_tool`.
//! * Unknown tools and bad parameters are protocol errors; backend failures
//!   are tool results with `is_error` set, carrying the backend's message.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};

use crate::tools::{DispatchError, ToolRegistry};

/// Bridges the tool registry to the MCP protocol.
///
/// Each MCP session receives a clone of this struct; the registry is
/// shared and immutable.
#[derive(Clone)]
pub struct McpBridge {
    tools: Arc<ToolRegistry>,
}

impl McpBridge {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    /// Convert a registry tool into an rmcp `Tool` descriptor.
    fn to_mcp_tool(tool: &dyn crate::tools::Tool) -> Tool {
        let schema_value = tool.parameters_schema();
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> = match schema_value {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }

    /// Runs a tool call and shapes the outcome for the protocol layer.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<CallToolResult, McpError> {
        let params = arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        match self.tools.dispatch(name, params).await {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result).unwrap_or_default();
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e @ DispatchError::UnknownTool(_)) => {
                Err(McpError::new(ErrorCode::METHOD_NOT_FOUND, e.to_string(), None))
            }
            Err(e @ DispatchError::InvalidParams { .. }) => {
                Err(McpError::new(ErrorCode::INVALID_PARAMS, e.to_string(), None))
            }
            Err(DispatchError::Backend(e)) => {
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "azure-search-mcp".to_string(),
                title: Some("Azure AI Search MCP".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Search an Azure AI Search index. Available tools: {}.",
                self.tools.names().join(", ")
            )),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = %request.name, "tool call");
        self.call(&request.name, request.arguments).await
    }
}
