// src/tools/checkpoint.rs
// Typed dispatch for the three checkpoint tools: save, search, list.

use contextd_types::{
    CheckpointListRequest, CheckpointListResponse, CheckpointSaveRequest, CheckpointSaveResponse,
    CheckpointSearchRequest, CheckpointSearchResponse,
};

use super::{run_with_policy, SharedState, SEARCH_TIMEOUT, WRITE_TIMEOUT};
use crate::error::Result;

pub async fn save(state: &SharedState, req: CheckpointSaveRequest) -> Result<CheckpointSaveResponse> {
    run_with_policy(&state.limiters.checkpoint_save, WRITE_TIMEOUT, async {
        let checkpoint = state
            .checkpoints
            .save(req.project_path, req.summary, req.content, req.tags, req.metadata, req.branch)
            .await?;
        Ok(CheckpointSaveResponse {
            id: checkpoint.id,
            created_at: checkpoint.created_at,
        })
    })
    .await
}

pub async fn search(state: &SharedState, req: CheckpointSearchRequest) -> Result<CheckpointSearchResponse> {
    run_with_policy(&state.limiters.checkpoint_search, SEARCH_TIMEOUT, async {
        let results = state.checkpoints.search(req).await?;
        Ok(CheckpointSearchResponse { results })
    })
    .await
}

pub async fn list(state: &SharedState, req: CheckpointListRequest) -> Result<CheckpointListResponse> {
    run_with_policy(&state.limiters.checkpoint_list, SEARCH_TIMEOUT, async {
        let checkpoints = state
            .checkpoints
            .list(req.project_path, req.limit, req.offset, req.tags)
            .await?;
        Ok(CheckpointListResponse { checkpoints })
    })
    .await
}
