//! CodeSeeker MCP Server.
//!
//! Exposes code intelligence tools to AI coding agents via the
//! Model Context Protocol (MCP) over stdio.

use anyhow::Result;
use clap::Parser;
use rmcp::{transport::stdio, ServiceExt};

use codeseeker_core::{Config, Engine};
use codeseeker_mcp::tools::CodeSeekerServer;

/// CodeSeeker MCP Server
#[derive(Parser, Debug)]
#[command(name = "codeseeker-mcp", version, about)]
struct Args {
    /// Path to the repository to index and serve.
    #[arg(long, default_value = ".")]
    repo: String,

    /// Transport protocol to use. Only stdio is implemented; sse is reserved.
    #[arg(long, default_value = "stdio", value_parser = ["stdio", "sse"])]
    transport: String,

    /// Port for SSE transport (ignored for stdio).
    #[arg(long, default_value_t = 3179)]
    port: u16,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Index the repository before serving, if it has no index yet.
    #[arg(long, default_value_t = true)]
    auto_index: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The stdio transport uses stdout for the JSON-RPC stream, so all
    // logging must go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .with_writer(std::io::stderr)
        .init();

    let repo_path = std::path::Path::new(&args.repo);
    if !repo_path.exists() {
        anyhow::bail!("repository path does not exist: {}", args.repo);
    }
    let repo_path = repo_path.canonicalize()?;

    if args.transport == "sse" {
        anyhow::bail!("sse transport is not yet implemented, use --transport stdio (port {} reserved)", args.port);
    }

    tracing::info!(repo = %repo_path.display(), "starting CodeSeeker MCP server");

    let config = Config::defaults(&repo_path);
    let mut engine = Engine::with_config(config)?;

    if engine.status()?.files_indexed == 0 && args.auto_index {
        tracing::info!("no existing index found, running initial index");
        let result = engine.run_index(false).await?;
        tracing::info!(indexed = result.files_indexed, chunks = result.chunks_created, "initial index complete");
    }

    let server = CodeSeekerServer::new(engine);
    let service = server.serve(stdio()).await.map_err(|e| anyhow::anyhow!("MCP serve error: {e}"))?;
    service.waiting().await.map_err(|e| anyhow::anyhow!("MCP runtime error: {e}"))?;

    Ok(())
}
