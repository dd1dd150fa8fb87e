// src/tools/memory.rs
// Typed dispatch for the memory-consolidation tool. Recall/feedback/archive are exposed
// only through the orchestrator's session flows and the HTTP surface today, not as
// standalone MCP tools — consolidation is the one operation a coding assistant calls
// directly.

use contextd_types::{MemoryConsolidateRequest, MemoryConsolidateResponse};

use super::{run_with_policy, SharedState, SEARCH_TIMEOUT};
use crate::config::ConsolidationConfig;
use crate::error::Result;

pub async fn consolidate(state: &SharedState, req: MemoryConsolidateRequest) -> Result<MemoryConsolidateResponse> {
    run_with_policy(&state.limiters.memory_consolidate, SEARCH_TIMEOUT, async {
        let defaults = ConsolidationConfig::default();
        let outcome = state
            .distiller
            .consolidate(
                &req.project_id,
                req.similarity_threshold.unwrap_or(defaults.similarity_threshold),
                req.dry_run,
                req.max_clusters.unwrap_or(defaults.max_clusters_per_run),
            )
            .await?;
        Ok(MemoryConsolidateResponse {
            created_memories: outcome.created_memories,
            archived_memories: outcome.archived_memories,
            skipped_count: outcome.skipped_count,
            total_processed: outcome.total_processed,
            duration_seconds: outcome.duration_seconds,
        })
    })
    .await
}
