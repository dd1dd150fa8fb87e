// src/lib.rs
// Crate root: wires every subsystem together behind `AppState`, the shared handle both the
// MCP transport (mcp/) and the HTTP transport (http/) dispatch through.

pub mod checkpoint;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod hooks;
pub mod http;
pub mod llm;
pub mod mcp;
pub mod memory;
pub mod naming;
pub mod orchestrator;
pub mod remediation;
pub mod scrub;
pub mod session;
pub mod tools;
pub mod vectorstore;

use std::sync::Arc;
use std::time::Duration;

use config::EnvConfig;
use embeddings::{Embedder, EmbedderBackend};
use llm::{HeuristicDistiller, LlmDistiller};
use vectorstore::memory::InMemoryStore;
use vectorstore::qdrant::QdrantStore;
use vectorstore::VectorStore;

use checkpoint::CheckpointService;
use memory::distiller::MemoryDistiller;
use memory::MemoryService;
use orchestrator::SessionOrchestrator;
use remediation::RemediationService;
use session::SessionManager;
use tools::ToolLimiters;

/// Every service the tool registry and both transports dispatch through, built once at
/// startup from `EnvConfig`.
pub struct AppState {
    pub checkpoints: Arc<CheckpointService>,
    pub remediations: Arc<RemediationService>,
    pub memories: Arc<MemoryService>,
    pub distiller: Arc<MemoryDistiller>,
    pub orchestrator: Arc<SessionOrchestrator>,
    pub sessions: Arc<SessionManager>,
    pub limiters: ToolLimiters,
    reap_interval: Duration,
}

impl AppState {
    /// Builds every service from `cfg`, connecting to the configured vector backend. Falls
    /// back to the in-memory store only when the configured URL cannot be parsed into a
    /// client at all — a reachability failure at runtime is still surfaced as a
    /// `StoreError` from the first call, not silently downgraded.
    pub fn build(cfg: &EnvConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn VectorStore> = match QdrantStore::connect(&cfg.vector_backend_url) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "failed to construct qdrant client, falling back to in-memory store"
                );
                Arc::new(InMemoryStore::new())
            }
        };

        let embedder: Arc<dyn Embedder> = Arc::new(EmbedderBackend::from_config(cfg));
        let distiller_backend: Arc<dyn LlmDistiller> = Arc::new(HeuristicDistiller);

        let checkpoints = Arc::new(CheckpointService::new(
            store.clone(),
            embedder.clone(),
            config::checkpoint_min_score_default(),
        ));
        let remediations = Arc::new(RemediationService::new(store.clone(), embedder.clone(), cfg.matcher.clone()));
        let memories = Arc::new(MemoryService::new(store.clone(), embedder.clone(), cfg.confidence));
        let distiller = Arc::new(MemoryDistiller::new(memories.clone(), embedder.clone(), distiller_backend));
        let sessions = SessionManager::new(cfg.session);
        let orchestrator = Arc::new(SessionOrchestrator::new(
            checkpoints.clone(),
            memories.clone(),
            sessions.clone(),
            distiller.clone(),
        ));

        Ok(Self {
            checkpoints,
            remediations,
            memories,
            distiller,
            orchestrator,
            sessions,
            limiters: ToolLimiters::new(cfg.max_inflight_per_tool),
            reap_interval: Duration::from_secs(cfg.session.reap_interval_seconds),
        })
    }

    /// Spawns the session TTL reaper as a background task for the process lifetime.
    pub fn spawn_reaper(&self) -> tokio::task::JoinHandle<()> {
        self.sessions.spawn_reaper(self.reap_interval)
    }
}
