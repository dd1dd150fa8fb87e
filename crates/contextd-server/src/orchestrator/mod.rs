// src/orchestrator/mod.rs
// Session orchestrator: composes the checkpoint, memory, and session services into
// the three session-lifecycle flows hooks call into — session_start, context_threshold, and
// session_end.

use std::sync::Arc;

use contextd_types::{Checkpoint, Memory, Outcome};
use tracing::info;

use crate::checkpoint::CheckpointService;
use crate::error::{ContextdError, Result};
use crate::hooks;
use crate::memory::distiller::MemoryDistiller;
use crate::memory::MemoryService;
use crate::session::SessionManager;

/// Minimum confidence a reasoning memory must carry to be surfaced on session resume.
const RECALL_MIN_CONFIDENCE: f32 = 0.7;
/// Most memories handed back to a resuming session, so it isn't flooded with context.
const RECALL_MAX_MEMORIES: usize = 5;

pub struct SessionOrchestrator {
    checkpoints: Arc<CheckpointService>,
    memories: Arc<MemoryService>,
    sessions: Arc<SessionManager>,
    distiller: Arc<MemoryDistiller>,
}

pub struct SessionStartOutcome {
    pub checkpoint: Option<Checkpoint>,
    pub memories: Vec<Memory>,
    pub resumed: bool,
}

pub struct SessionEndOutcome {
    pub memories_created: Vec<Memory>,
    pub message: String,
}

impl SessionOrchestrator {
    pub fn new(
        checkpoints: Arc<CheckpointService>,
        memories: Arc<MemoryService>,
        sessions: Arc<SessionManager>,
        distiller: Arc<MemoryDistiller>,
    ) -> Self {
        Self {
            checkpoints,
            memories,
            sessions,
            distiller,
        }
    }

    /// Resumes a session: surfaces the most recent checkpoint (if any) and the active
    /// memories for the project, so a coding assistant can re-orient itself without asking
    /// the user to repeat context.
    pub async fn session_start(&self, project_id: String, session_id: String) -> Result<SessionStartOutcome> {
        if project_id.trim().is_empty() {
            return Err(ContextdError::InvalidInput("project_id is required".into()));
        }
        if session_id.trim().is_empty() {
            return Err(ContextdError::InvalidInput("session_id is required".into()));
        }

        self.sessions.start_or_resume(&project_id, &session_id).await;

        let checkpoints = self
            .checkpoints
            .list(project_id.clone(), Some(1), None, Vec::new())
            .await?;
        let checkpoint = checkpoints.into_iter().next();
        let resumed = checkpoint.is_some();

        let mut memories = self.memories.scroll_active(&project_id).await?;
        memories.retain(|m| m.confidence >= RECALL_MIN_CONFIDENCE);
        memories.truncate(RECALL_MAX_MEMORIES);

        info!(project_id = %project_id, session_id = %session_id, resumed, "session started");
        Ok(SessionStartOutcome {
            checkpoint,
            memories,
            resumed,
        })
    }

    /// Records updated context-usage percentage and returns a message when a threshold was
    /// newly crossed, or an empty message otherwise.
    pub async fn context_threshold(&self, project_id: String, session_id: String, percent: f32) -> Result<String> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(ContextdError::InvalidInput("percent must be within [0, 100]".into()));
        }
        let _ = &project_id;
        let crossed = self.sessions.record_usage(&session_id, percent).await?;
        Ok(match crossed {
            Some(90) => "context usage critical — checkpoint immediately".to_string(),
            Some(70) => "context usage high — consider saving a checkpoint".to_string(),
            _ => String::new(),
        })
    }

    /// Ends a session: validates the outcome token, records a reasoning memory from the
    /// task/approach/outcome triple, attempts distillation (best-effort, never fails the
    /// call), and evicts the session record.
    pub async fn session_end(
        &self,
        project_id: String,
        session_id: String,
        task: String,
        approach: String,
        outcome: String,
        tags: Vec<String>,
        notes: Option<String>,
    ) -> Result<SessionEndOutcome> {
        if task.trim().is_empty() {
            return Err(ContextdError::InvalidInput("task is required".into()));
        }
        if approach.trim().is_empty() {
            return Err(ContextdError::InvalidInput("approach is required".into()));
        }
        let outcome = Outcome::parse(&outcome).ok_or_else(|| {
            ContextdError::InvalidInput(format!(
                "outcome '{outcome}' must be one of success, failure, partial"
            ))
        })?;

        let confidence = match outcome {
            Outcome::Success => 0.8,
            Outcome::Partial => 0.6,
            Outcome::Failure => 0.4,
        };

        let memories_created = if hooks::AUTO_DISTILL_ON_SESSION_END {
            let distillation = self
                .distiller
                .distill_session(&task, &approach, &format!("{outcome:?}"), notes.as_deref())
                .await?;
            let memory = self
                .memories
                .record(
                    project_id.clone(),
                    distillation.title,
                    distillation.content,
                    [distillation.tags, tags].concat(),
                    confidence,
                    vec![session_id.clone()],
                )
                .await?;
            vec![memory]
        } else {
            Vec::new()
        };

        self.sessions.end(&session_id).await.ok();

        info!(
            project_id = %project_id,
            session_id = %session_id,
            auto_distill = hooks::AUTO_DISTILL_ON_SESSION_END,
            memories_created = memories_created.len(),
            "session ended"
        );

        Ok(SessionEndOutcome {
            message: if memories_created.is_empty() {
                "session ended".to_string()
            } else {
                "session ended, memory recorded".to_string()
            },
            memories_created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfidenceConfig, SessionConfig};
    use crate::embeddings::hash::HashEmbedder;
    use crate::llm::HeuristicDistiller;
    use crate::vectorstore::memory::InMemoryStore;

    fn orchestrator() -> SessionOrchestrator {
        let store = Arc::new(InMemoryStore::new());
        let embedder: Arc<dyn crate::embeddings::Embedder> = Arc::new(HashEmbedder::default());
        let checkpoints = Arc::new(CheckpointService::new(store.clone(), embedder.clone(), 0.0));
        let memories = Arc::new(MemoryService::new(store, embedder.clone(), ConfidenceConfig::default()));
        let distiller = Arc::new(MemoryDistiller::new(memories.clone(), embedder, Arc::new(HeuristicDistiller)));
        let sessions = SessionManager::new(SessionConfig {
            ttl_seconds: 3600,
            reap_interval_seconds: 300,
        });
        SessionOrchestrator::new(checkpoints, memories, sessions, distiller)
    }

    #[tokio::test]
    async fn session_start_rejects_empty_project_id() {
        let o = orchestrator();
        let err = o.session_start("".into(), "s1".into()).await.unwrap_err();
        assert!(matches!(err, ContextdError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn session_start_is_not_resumed_on_first_call() {
        let o = orchestrator();
        let outcome = o.session_start("proj".into(), "s1".into()).await.unwrap();
        assert!(!outcome.resumed);
    }

    #[tokio::test]
    async fn session_end_rejects_invalid_outcome_token() {
        let o = orchestrator();
        o.session_start("proj".into(), "s1".into()).await.unwrap();
        let err = o
            .session_end("proj".into(), "s1".into(), "task".into(), "approach".into(), "cancelled".into(), vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContextdError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn session_end_records_memory_and_clears_session() {
        let o = orchestrator();
        o.session_start("proj".into(), "s1".into()).await.unwrap();
        let outcome = o
            .session_end(
                "proj".into(),
                "s1".into(),
                "fix the flaky test".into(),
                "added a retry with backoff".into(),
                "success".into(),
                vec!["testing".into()],
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.memories_created.len(), 1);
        assert!(o.sessions.get("s1").await.is_err());
    }

    #[tokio::test]
    async fn context_threshold_rejects_out_of_range_percent() {
        let o = orchestrator();
        o.session_start("proj".into(), "s1".into()).await.unwrap();
        let err = o.context_threshold("proj".into(), "s1".into(), 150.0).await.unwrap_err();
        assert!(matches!(err, ContextdError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn context_threshold_returns_message_on_crossing() {
        let o = orchestrator();
        o.session_start("proj".into(), "s1".into()).await.unwrap();
        let msg = o.context_threshold("proj".into(), "s1".into(), 72.0).await.unwrap();
        assert!(!msg.is_empty());
    }

    #[tokio::test]
    async fn session_start_resumes_when_a_checkpoint_exists() {
        let o = orchestrator();
        o.checkpoints
            .save("/tmp/proj".into(), "earlier checkpoint".into(), None, vec![], Default::default(), None)
            .await
            .unwrap();
        let outcome = o.session_start("/tmp/proj".into(), "s1".into()).await.unwrap();
        assert!(outcome.resumed);
        assert!(outcome.checkpoint.is_some());
    }

    #[tokio::test]
    async fn session_start_filters_memories_below_confidence_threshold() {
        let o = orchestrator();
        o.memories
            .record("proj".into(), "low confidence lesson".into(), "content".into(), vec![], 0.4, vec![])
            .await
            .unwrap();
        o.memories
            .record("proj".into(), "high confidence lesson".into(), "content".into(), vec![], 0.9, vec![])
            .await
            .unwrap();
        let outcome = o.session_start("proj".into(), "s1".into()).await.unwrap();
        assert_eq!(outcome.memories.len(), 1);
        assert_eq!(outcome.memories[0].title, "high confidence lesson");
    }
}
