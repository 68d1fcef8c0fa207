//! Backlog MCP server binary.
//!
//! This binary runs the MCP server using stdio transport.

use backlog_mcp::BacklogMcpServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the MCP protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting backlog-mcp server");

    let server = BacklogMcpServer::new();
    server.run().await?;

    Ok(())
}
