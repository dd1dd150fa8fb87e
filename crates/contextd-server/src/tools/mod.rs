// src/tools/mod.rs
// Tool registry & dispatch: one typed (input, output) pair per tool, each wrapped
// with a default timeout and a global per-tool in-flight cap, and domain errors mapped to
// wire error codes here — exactly once, so the MCP transport and the HTTP surface both
// dispatch through this module instead of duplicating validation/error-mapping logic.

pub mod checkpoint;
pub mod memory;
pub mod remediation;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use contextd_types::ErrorEnvelope;
use tokio::sync::Semaphore;

use crate::error::ContextdError;
use crate::AppState;

/// Default timeout for tools that mutate state (saves, records).
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
/// Default timeout for tools that search or list.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Caps the number of concurrent in-flight calls to a single tool. Each
/// tool in the registry owns one of these.
pub struct ToolLimiter {
    semaphore: Arc<Semaphore>,
}

impl ToolLimiter {
    pub fn new(max_inflight: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_inflight.max(1))),
        }
    }

    pub async fn acquire(&self) -> Result<tokio::sync::OwnedSemaphorePermit, ContextdError> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .map_err(|_| ContextdError::TransientBackend("tool is at its in-flight call limit".to_string()))
    }
}

/// Runs a dispatch future under the tool's timeout and in-flight limiter, converting a
/// timeout into a `ContextdError::Timeout` the same way every tool boundary does.
pub async fn run_with_policy<T, F>(
    limiter: &ToolLimiter,
    timeout: Duration,
    fut: F,
) -> Result<T, ContextdError>
where
    F: std::future::Future<Output = Result<T, ContextdError>>,
{
    let _permit = limiter.acquire().await?;
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ContextdError::Timeout("tool call exceeded its deadline".to_string())),
    }
}

pub fn to_error_envelope(err: &ContextdError) -> ErrorEnvelope {
    ErrorEnvelope {
        code: err.code(),
        message: err.to_string(),
        details: None,
    }
}

/// Shared per-tool limiters, built once from `CONTEXTD_MAX_INFLIGHT_PER_TOOL`.
pub struct ToolLimiters {
    pub checkpoint_save: ToolLimiter,
    pub checkpoint_search: ToolLimiter,
    pub checkpoint_list: ToolLimiter,
    pub remediation_save: ToolLimiter,
    pub remediation_search: ToolLimiter,
    pub memory_consolidate: ToolLimiter,
    pub session_start: ToolLimiter,
    pub context_threshold: ToolLimiter,
    pub session_end: ToolLimiter,
}

impl ToolLimiters {
    pub fn new(max_inflight: usize) -> Self {
        Self {
            checkpoint_save: ToolLimiter::new(max_inflight),
            checkpoint_search: ToolLimiter::new(max_inflight),
            checkpoint_list: ToolLimiter::new(max_inflight),
            remediation_save: ToolLimiter::new(max_inflight),
            remediation_search: ToolLimiter::new(max_inflight),
            memory_consolidate: ToolLimiter::new(max_inflight),
            session_start: ToolLimiter::new(max_inflight),
            context_threshold: ToolLimiter::new(max_inflight),
            session_end: ToolLimiter::new(max_inflight),
        }
    }
}

pub type SharedState = Arc<AppState>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limiter_rejects_beyond_capacity() {
        let limiter = ToolLimiter::new(1);
        let _first = limiter.acquire().await.unwrap();
        let second = limiter.acquire().await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn run_with_policy_converts_timeout() {
        let limiter = ToolLimiter::new(1);
        let result: Result<(), ContextdError> = run_with_policy(&limiter, Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ContextdError::Timeout(_))));
    }
}
