// src/tools/session.rs
// Typed dispatch for the three session-lifecycle tools: start, context_threshold, end.

use contextd_types::{
    ContextThresholdRequest, ContextThresholdResponse, SessionEndRequest, SessionEndResponse,
    SessionStartRequest, SessionStartResponse,
};

use super::{run_with_policy, SharedState, SEARCH_TIMEOUT, WRITE_TIMEOUT};
use crate::error::Result;

pub async fn start(state: &SharedState, req: SessionStartRequest) -> Result<SessionStartResponse> {
    run_with_policy(&state.limiters.session_start, SEARCH_TIMEOUT, async {
        let outcome = state.orchestrator.session_start(req.project_id, req.session_id).await?;
        Ok(SessionStartResponse {
            checkpoint: outcome.checkpoint,
            memories: outcome.memories,
            resumed: outcome.resumed,
        })
    })
    .await
}

pub async fn context_threshold(state: &SharedState, req: ContextThresholdRequest) -> Result<ContextThresholdResponse> {
    run_with_policy(&state.limiters.context_threshold, WRITE_TIMEOUT, async {
        let message = state
            .orchestrator
            .context_threshold(req.project_id, req.session_id, req.percent)
            .await?;
        Ok(ContextThresholdResponse { message })
    })
    .await
}

pub async fn end(state: &SharedState, req: SessionEndRequest) -> Result<SessionEndResponse> {
    run_with_policy(&state.limiters.session_end, WRITE_TIMEOUT, async {
        let outcome = state
            .orchestrator
            .session_end(req.project_id, req.session_id, req.task, req.approach, req.outcome, req.tags, req.notes)
            .await?;
        Ok(SessionEndResponse {
            memories_created: outcome.memories_created,
            message: outcome.message,
        })
    })
    .await
}
