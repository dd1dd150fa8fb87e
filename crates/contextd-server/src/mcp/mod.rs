// src/mcp/mod.rs
// MCP server wiring, grounded on crates/mira-server/src/mcp/{mod.rs,router.rs,handler.rs}'s
// `#[tool_router]` + `ServerHandler` shape. Unlike the teacher, tool calls here run
// synchronously to completion — there is no task-manager/async-job layer, since every tool
// in this surface resolves in milliseconds to a few seconds under its own timeout (tools/).

use std::sync::Arc;

use contextd_types::{
    CheckpointListRequest, CheckpointSaveRequest, CheckpointSearchRequest, ContextThresholdRequest,
    MemoryConsolidateRequest, RemediationSaveRequest, RemediationSearchRequest, SessionEndRequest,
    SessionStartRequest,
};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::wrapper::Parameters;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{tool, tool_router, ErrorData, ServerHandler};
use serde::Serialize;

use crate::error::ContextdError;
use crate::AppState;

/// Converts a tool's typed result into the wire shape rmcp expects: a short text summary
/// plus the full structured payload, or a text error when the domain call failed.
fn tool_result<T: Serialize>(result: Result<T, ContextdError>) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(value) => {
            let structured = serde_json::to_value(&value).map_err(|e| {
                ErrorData::internal_error(format!("failed to serialize tool output: {e}"), None)
            })?;
            Ok(CallToolResult {
                content: vec![Content::text("ok")],
                structured_content: Some(structured),
                is_error: Some(false),
                meta: None,
            })
        }
        Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
    }
}

/// MCP server state: a thin wrapper around `AppState` plus the macro-generated router.
#[derive(Clone)]
pub struct ContextdMcpServer {
    state: Arc<AppState>,
    tool_router: ToolRouter<Self>,
}

impl ContextdMcpServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl ContextdMcpServer {
    #[tool(description = "Save a point-in-time summary of in-progress session work for a project.")]
    async fn checkpoint_save(
        &self,
        Parameters(req): Parameters<CheckpointSaveRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        tool_result(crate::tools::checkpoint::save(&self.state, req).await)
    }

    #[tool(description = "Search a project's checkpoints by semantic similarity to a query.")]
    async fn checkpoint_search(
        &self,
        Parameters(req): Parameters<CheckpointSearchRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        tool_result(crate::tools::checkpoint::search(&self.state, req).await)
    }

    #[tool(description = "List a project's checkpoints, most recent first.")]
    async fn checkpoint_list(
        &self,
        Parameters(req): Parameters<CheckpointListRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        tool_result(crate::tools::checkpoint::list(&self.state, req).await)
    }

    #[tool(description = "Save a known error -> fix pairing, shared across all projects.")]
    async fn remediation_save(
        &self,
        Parameters(req): Parameters<RemediationSaveRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        tool_result(crate::tools::remediation::save(&self.state, req).await)
    }

    #[tool(description = "Find past remediations for an error using hybrid semantic and string matching.")]
    async fn remediation_search(
        &self,
        Parameters(req): Parameters<RemediationSearchRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        tool_result(crate::tools::remediation::search(&self.state, req).await)
    }

    #[tool(description = "Cluster and consolidate similar reasoning memories for a project into fewer, stronger lessons.")]
    async fn memory_consolidate(
        &self,
        Parameters(req): Parameters<MemoryConsolidateRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        tool_result(crate::tools::memory::consolidate(&self.state, req).await)
    }

    #[tool(description = "Start or resume a session: surfaces the latest checkpoint and active memories for a project.")]
    async fn session_start(
        &self,
        Parameters(req): Parameters<SessionStartRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        tool_result(crate::tools::session::start(&self.state, req).await)
    }

    #[tool(description = "Report a session's current context-window usage percentage.")]
    async fn context_threshold(
        &self,
        Parameters(req): Parameters<ContextThresholdRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        tool_result(crate::tools::session::context_threshold(&self.state, req).await)
    }

    #[tool(description = "End a session, recording a reasoning memory from its task, approach, and outcome.")]
    async fn session_end(
        &self,
        Parameters(req): Parameters<SessionEndRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        tool_result(crate::tools::session::end(&self.state, req).await)
    }
}

impl ServerHandler for ContextdMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation {
                name: "contextd".into(),
                title: Some("contextd - memory server for coding assistants".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Persists checkpoints, remediations, and reasoning memories across coding sessions."
                    .into(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        }))
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            use rmcp::handler::server::tool::ToolCallContext;
            let ctx = ToolCallContext::new(self, request, context);
            self.tool_router.call(ctx).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;

    #[tokio::test]
    async fn lists_all_nine_tools() {
        std::env::set_var("CONTEXTD_VECTOR_BACKEND_URL", "http://localhost:1");
        let state = Arc::new(AppState::build(&EnvConfig::load()).unwrap());
        let server = ContextdMcpServer::new(state);
        let tools = server.tool_router.list_all();
        assert_eq!(tools.len(), 9);
    }
}
