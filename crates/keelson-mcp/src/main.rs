//! keelson-mcp server binary.
//!
//! This binary runs the MCP server using stdio transport.

use keelson_mcp::context::AppContext;
use keelson_mcp::KeelsonMcpServer;
use rmcp::ServiceExt;
use std::sync::Arc;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr (stdout is used for MCP protocol)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("starting keelson-mcp server");

    let ctx = Arc::new(AppContext::from_env().await?);
    let server = KeelsonMcpServer::new(ctx);

    let service = server.serve((stdin(), stdout())).await?;

    tracing::info!("keelson-mcp server ready");

    service.waiting().await?;

    tracing::info!("keelson-mcp server stopped");
    Ok(())
}
