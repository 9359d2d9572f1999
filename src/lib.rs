//! # azure-search-mcp
//!
//! An MCP (Model Context Protocol) server that exposes queries against an
//! Azure AI Search index as tools for AI agents.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  config  │──▶│ ToolRegistry │──▶│  McpBridge   │──▶│  transport   │
//! │ env+toml │   │  (tools.rs)  │   │   (mcp.rs)   │   │ http/sse/io  │
//! └──────────┘   └──────┬───────┘   └──────────────┘   └──────┬───────┘
//!                       ▼                                     │
//!              ┌─────────────────┐                  ┌─────────┴────────┐
//!              │ SearchBackend   │                  │ SecurityPolicy   │
//!              │ (Azure REST)    │                  │ Host/Origin gate │
//!              └─────────────────┘                  └──────────────────┘
//! ```
//!
//! ## Tools
//!
//! | Tool | Parameters |
//! |------|------------|
//! | `hybrid_search` | `query`, `top` |
//! | `semantic_search` | `query`, `top` |
//! | `text_search` | `query`, `top` |
//! | `filtered_search` | `query`, `filter`, `top` |
//! | `fetch_document` | `document_id` |
//!
//! Which tools are exposed is configured at startup; see [`config`].
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Required environment, profiles, optional TOML file |
//! | [`security`] | Host/Origin admission policy and middleware |
//! | [`backend`] | `SearchBackend` trait and request types |
//! | [`azure`] | Azure AI Search REST client |
//! | [`tools`] | Tool definitions, parameter validation, registry |
//! | [`mcp`] | rmcp `ServerHandler` bridge |
//! | [`server`] | Transport runner for all three transports (streamable HTTP, SSE, stdio) |
//! | [`sse`] | Legacy HTTP+SSE transport |

pub mod azure;
pub mod backend;
pub mod config;
pub mod mcp;
pub mod security;
pub mod server;
pub mod sse;
pub mod tools;

pub use backend::{Document, SearchBackend, SearchMode, SearchRequest};
pub use config::{Config, Profile, TransportKind};
pub use mcp::McpBridge;
pub use security::SecurityPolicy;
pub use tools::{Tool, ToolRegistry};
