// src/main.rs
// contextd - memory server for coding assistants

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use contextd::config::EnvConfig;
use contextd::mcp::ContextdMcpServer;
use contextd::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("CONTEXTD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cfg = EnvConfig::load();
    let state = Arc::new(AppState::build(&cfg)?);
    let _reaper = state.spawn_reaper();

    let http_addr = cfg.http_addr.clone();
    let http_state = state.clone();
    let http_handle = tokio::spawn(async move {
        let router = contextd::http::create_router(http_state);
        let listener = match tokio::net::TcpListener::bind(&http_addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(addr = %http_addr, error = %e, "failed to bind HTTP listener");
                return;
            }
        };
        tracing::info!(addr = %http_addr, "HTTP surface listening");
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "HTTP server exited with an error");
        }
    });

    let mcp_server = ContextdMcpServer::new(state.clone());
    let transport = rmcp::transport::io::stdio();
    let service = rmcp::serve_server(mcp_server, transport).await?;
    service.waiting().await?;

    http_handle.abort();
    Ok(())
}
