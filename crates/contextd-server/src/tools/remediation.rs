// src/tools/remediation.rs
// Typed dispatch for the two remediation tools: save, search.

use contextd_types::{
    RemediationSaveRequest, RemediationSaveResponse, RemediationSearchRequest,
    RemediationSearchResponse,
};

use super::{run_with_policy, SharedState, SEARCH_TIMEOUT, WRITE_TIMEOUT};
use crate::error::Result;

pub async fn save(state: &SharedState, req: RemediationSaveRequest) -> Result<RemediationSaveResponse> {
    run_with_policy(&state.limiters.remediation_save, WRITE_TIMEOUT, async {
        let remediation = state
            .remediations
            .save(
                req.error_message,
                req.error_type,
                req.solution,
                req.project_path,
                req.context,
                req.tags,
                req.severity,
                req.stack_trace,
            )
            .await?;
        Ok(RemediationSaveResponse {
            id: remediation.id,
            timestamp: remediation.timestamp,
        })
    })
    .await
}

pub async fn search(state: &SharedState, req: RemediationSearchRequest) -> Result<RemediationSearchResponse> {
    run_with_policy(&state.limiters.remediation_search, SEARCH_TIMEOUT, async {
        let results = state.remediations.search(req).await?;
        Ok(RemediationSearchResponse { results })
    })
    .await
}
