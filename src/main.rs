//! # azure-search-mcp
//!
//! Serves Azure AI Search queries as MCP tools.
//!
//! ## Environment
//!
//! | Variable | Required |
//! |----------|----------|
//! | `AZURE_SEARCH_ENDPOINT` | yes |
//! | `AZURE_SEARCH_API_KEY` | yes |
//! | `AZURE_SEARCH_INDEX_NAME` | yes |
//! | `AZURE_SEARCH_ENABLED_TOOLS` | no, comma-separated tool names |
//! | `AZURE_SEARCH_SEMANTIC_CONFIG` | no |
//! | `AZURE_SEARCH_VECTOR_FIELDS` | no |
//! | `AZURE_SEARCH_API_VERSION` | no |
//! | `RUST_LOG` | no, defaults to `info` |
//!
//! ## Examples
//!
//! ```bash
//! azure-search-mcp                                  # streamable-http on 0.0.0.0:8000
//! azure-search-mcp --port 9000
//! azure-search-mcp --host 127.0.0.1                 # localhost only, rebinding protection on
//! azure-search-mcp --transport stdio                # legacy local-process mode
//! azure-search-mcp --transport sse --port 8000      # legacy SSE
//! azure-search-mcp --profile legacy                 # stdio, port 8080, top 30
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use azure_search_mcp::azure::AzureSearchClient;
use azure_search_mcp::config::{self, Profile, TransportKind};
use azure_search_mcp::mcp::McpBridge;
use azure_search_mcp::server;
use azure_search_mcp::tools::ToolRegistry;

/// Azure AI Search MCP server.
#[derive(Parser)]
#[command(name = "azure-search-mcp", version, about = "Azure AI Search MCP Server")]
struct Cli {
    /// Transport protocol. Defaults to the profile's transport
    /// (`streamable-http` for standard, `stdio` for legacy).
    #[arg(long, value_enum)]
    transport: Option<TransportKind>,

    /// Host to bind to for the HTTP transports.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port for the HTTP transports. Defaults to 8000 (standard) or 8080 (legacy).
    #[arg(long)]
    port: Option<u16>,

    /// Deployment profile supplying transport, port, `top` and tool defaults.
    #[arg(long, value_enum, default_value_t = Profile::Standard)]
    profile: Profile,

    /// Optional TOML file with `[search]` and `[tools]` settings.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Logs go to stderr so stdout stays free for the stdio transport.
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let lookup = |name: &str| std::env::var(name).ok();

    // Gate everything else on the required connection values.
    let connection = config::validate_required(lookup)?;

    let cfg = config::load_config(connection, cli.profile, cli.config.as_deref(), lookup)?;
    let transport = cli.transport.unwrap_or(cli.profile.default_transport());
    let port = cli.port.unwrap_or(cli.profile.default_port());

    let backend = Arc::new(
        AzureSearchClient::new(&cfg.search).context("failed to build search client")?,
    );
    let registry = ToolRegistry::from_enabled(backend, &cfg.tools.enabled, cfg.tools.default_top)?;
    tracing::info!(
        index = %cfg.search.index_name,
        tools = ?registry.names(),
        "registered {} tool(s)",
        registry.len()
    );

    let bridge = McpBridge::new(Arc::new(registry));
    server::run(bridge, transport, &cli.host, port).await
}
