// src/http/mod.rs
// HTTP surface for session-lifecycle hooks, grounded on crates/mira-server/src/web/mod.rs's
// Router::new().route(...).with_state(state) shape. Every handler here dispatches through
// the same tools/ registry the MCP transport uses, so validation and error mapping are
// defined exactly once.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use contextd_types::{
    CheckpointListRequest, CheckpointSaveRequest, CheckpointSearchRequest, ContextThresholdRequest,
    MemoryConsolidateRequest, RemediationSaveRequest, RemediationSearchRequest, SessionEndRequest,
    SessionStartRequest,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::ContextdError;
use crate::tools;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/checkpoints", post(checkpoint_save))
        .route("/checkpoints/search", post(checkpoint_search))
        .route("/checkpoints/list", post(checkpoint_list))
        .route("/remediations", post(remediation_save))
        .route("/remediations/search", post(remediation_search))
        .route("/memories/consolidate", post(memory_consolidate))
        .route("/session/start", post(session_start))
        .route("/session/context-threshold", post(context_threshold))
        .route("/session/end", post(session_end))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Converts a tool result into an HTTP response, mapping the domain error code to its wire
/// status (400/404/408/409/500) the same way for every route.
fn respond<T: Serialize>(result: Result<T, ContextdError>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(err) => {
            let envelope = tools::to_error_envelope(&err);
            let status = StatusCode::from_u16(envelope.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(envelope)).into_response()
        }
    }
}

async fn checkpoint_save(State(state): State<Arc<AppState>>, Json(req): Json<CheckpointSaveRequest>) -> Response {
    respond(tools::checkpoint::save(&state, req).await)
}

async fn checkpoint_search(State(state): State<Arc<AppState>>, Json(req): Json<CheckpointSearchRequest>) -> Response {
    respond(tools::checkpoint::search(&state, req).await)
}

async fn checkpoint_list(State(state): State<Arc<AppState>>, Json(req): Json<CheckpointListRequest>) -> Response {
    respond(tools::checkpoint::list(&state, req).await)
}

async fn remediation_save(State(state): State<Arc<AppState>>, Json(req): Json<RemediationSaveRequest>) -> Response {
    respond(tools::remediation::save(&state, req).await)
}

async fn remediation_search(State(state): State<Arc<AppState>>, Json(req): Json<RemediationSearchRequest>) -> Response {
    respond(tools::remediation::search(&state, req).await)
}

async fn memory_consolidate(State(state): State<Arc<AppState>>, Json(req): Json<MemoryConsolidateRequest>) -> Response {
    respond(tools::memory::consolidate(&state, req).await)
}

async fn session_start(State(state): State<Arc<AppState>>, Json(req): Json<SessionStartRequest>) -> Response {
    respond(tools::session::start(&state, req).await)
}

async fn context_threshold(State(state): State<Arc<AppState>>, Json(req): Json<ContextThresholdRequest>) -> Response {
    respond(tools::session::context_threshold(&state, req).await)
}

async fn session_end(State(state): State<Arc<AppState>>, Json(req): Json<SessionEndRequest>) -> Response {
    respond(tools::session::end(&state, req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        std::env::set_var("CONTEXTD_VECTOR_BACKEND_URL", "http://localhost:1");
        let state = Arc::new(AppState::build(&EnvConfig::load()).unwrap());
        create_router(state)
    }

    #[tokio::test]
    async fn health_returns_200() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn checkpoint_save_with_relative_path_returns_400() {
        let body = serde_json::json!({
            "project_path": "relative/path",
            "summary": "a summary",
        });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/checkpoints")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
