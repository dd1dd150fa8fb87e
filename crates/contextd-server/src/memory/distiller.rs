// src/memory/distiller.rs
// Memory consolidation / distillation: greedy single-link clustering of active
// memories by cosine similarity, consolidated per cluster via an LlmDistiller, with
// dry-run/commit semantics and compensating rollback on partial failure. Grounded on the
// cap-and-threshold shape of
// crates/mira-server/src/background/knowledge_distillation.rs (MAX_DISTILLED_MEMORIES,
// MIN_MEMORIES_FOR_DISTILLATION), adapted from SQL-backed team memories to vector-backed
// per-project memories.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use contextd_types::Memory;
use tracing::{info, warn};
use uuid::Uuid;

use super::MemoryService;
use crate::embeddings::Embedder;
use crate::error::{ContextdError, Result};
use crate::llm::LlmDistiller;

const MIN_CLUSTER_SIZE: usize = 2;

pub struct ConsolidationOutcome {
    pub created_memories: Vec<Memory>,
    pub archived_memories: Vec<Uuid>,
    pub skipped_count: u32,
    pub total_processed: u32,
    pub duration_seconds: f64,
}

pub struct MemoryDistiller {
    memory_service: Arc<MemoryService>,
    embedder: Arc<dyn Embedder>,
    distiller: Arc<dyn LlmDistiller>,
}

impl MemoryDistiller {
    pub fn new(memory_service: Arc<MemoryService>, embedder: Arc<dyn Embedder>, distiller: Arc<dyn LlmDistiller>) -> Self {
        Self {
            memory_service,
            embedder,
            distiller,
        }
    }

    pub async fn consolidate(
        &self,
        project_id: &str,
        similarity_threshold: f32,
        dry_run: bool,
        max_clusters: u32,
    ) -> Result<ConsolidationOutcome> {
        if project_id.trim().is_empty() {
            return Err(ContextdError::InvalidInput("project_id is required".into()));
        }
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(ContextdError::InvalidInput(
                "similarity_threshold must be within [0, 1]".into(),
            ));
        }

        let start = Instant::now();
        let active = self.memory_service.scroll_active(project_id).await?;
        let total_processed = active.len() as u32;

        if active.is_empty() {
            return Ok(ConsolidationOutcome {
                created_memories: Vec::new(),
                archived_memories: Vec::new(),
                skipped_count: 0,
                total_processed: 0,
                duration_seconds: start.elapsed().as_secs_f64(),
            });
        }

        let mut embeddings = Vec::with_capacity(active.len());
        for memory in &active {
            let v = self
                .embedder
                .embed(&format!("{} {}", memory.title, memory.content))
                .await
                .map_err(ContextdError::from)?;
            embeddings.push(v);
        }

        let clusters = greedy_cluster(&embeddings, similarity_threshold);
        let mut eligible: Vec<&Vec<usize>> = clusters.iter().filter(|c| c.len() >= MIN_CLUSTER_SIZE).collect();
        eligible.sort_by_key(|c| std::cmp::Reverse(c.len()));
        let skipped_clusters = eligible.len().saturating_sub(max_clusters as usize);
        eligible.truncate(max_clusters as usize);

        let singleton_count = clusters.iter().filter(|c| c.len() < MIN_CLUSTER_SIZE).count() as u32;

        let mut created = Vec::new();
        let mut archived = Vec::new();
        let mut rollback_needed = false;

        for cluster in &eligible {
            let texts: Vec<String> = cluster.iter().map(|&i| active[i].content.clone()).collect();
            let source_ids: Vec<String> = cluster.iter().map(|&i| active[i].id.to_string()).collect();

            let distillation = match self.distiller.consolidate(&texts).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(project_id, error = %e, "llm consolidation failed for cluster, skipping");
                    continue;
                }
            };

            let avg_confidence =
                cluster.iter().map(|&i| active[i].confidence).sum::<f32>() / cluster.len() as f32;

            if dry_run {
                let preview = Memory {
                    id: Uuid::new_v4(),
                    project_id: project_id.to_string(),
                    title: distillation.title,
                    content: distillation.content,
                    tags: distillation.tags,
                    confidence: avg_confidence,
                    source_session_ids: source_ids.clone(),
                    supersedes: Vec::new(),
                    archived: false,
                    created_at: Utc::now(),
                };
                archived.extend(cluster.iter().map(|&i| active[i].id));
                created.push(preview);
                continue;
            }

            let record_result = self
                .memory_service
                .record(
                    project_id.to_string(),
                    distillation.title,
                    distillation.content,
                    distillation.tags,
                    avg_confidence,
                    source_ids,
                )
                .await;

            let new_memory = match record_result {
                Ok(m) => m,
                Err(e) => {
                    warn!(project_id, error = %e, "failed to record consolidated memory, skipping cluster");
                    rollback_needed = true;
                    continue;
                }
            };

            let mut cluster_archived = Vec::new();
            let mut archive_failed = false;
            for &i in cluster.iter() {
                if self.memory_service.archive(project_id, active[i].id).await.is_err() {
                    archive_failed = true;
                    break;
                }
                cluster_archived.push(active[i].id);
            }

            if archive_failed {
                warn!(
                    project_id,
                    memory_id = %new_memory.id,
                    "partial failure archiving cluster members, rolling back consolidated memory"
                );
                let _ = self.memory_service.archive(project_id, new_memory.id).await;
                rollback_needed = true;
                continue;
            }

            created.push(new_memory);
            archived.extend(cluster_archived);
        }

        if rollback_needed {
            warn!(project_id, "consolidation run completed with one or more rolled-back clusters");
        }

        info!(
            project_id,
            clusters_consolidated = created.len(),
            dry_run,
            "consolidation run complete"
        );

        Ok(ConsolidationOutcome {
            created_memories: created,
            archived_memories: archived,
            skipped_count: singleton_count + skipped_clusters as u32,
            total_processed,
            duration_seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// Distills a single ended session's task/approach/outcome into a reasoning memory,
    /// running the same `LlmDistiller` a cluster consolidation uses, just over one text.
    pub async fn distill_session(
        &self,
        task: &str,
        approach: &str,
        outcome_label: &str,
        notes: Option<&str>,
    ) -> Result<crate::llm::Distillation> {
        let mut text = format!("Task: {task}\nApproach: {approach}\nOutcome: {outcome_label}");
        if let Some(notes) = notes {
            text.push_str(&format!("\nNotes: {notes}"));
        }
        self.distiller.consolidate(&[text]).await.map_err(ContextdError::from)
    }
}

/// Greedy single-link clustering: each unassigned point seeds a new cluster and pulls in
/// every remaining unassigned point within `threshold` cosine similarity of it. Simple and
/// order-dependent, but deterministic for a fixed input order and fast enough for the
/// per-project memory counts this system expects.
fn greedy_cluster(embeddings: &[Vec<f32>], threshold: f32) -> Vec<Vec<usize>> {
    let mut assigned = vec![false; embeddings.len()];
    let mut clusters = Vec::new();

    for i in 0..embeddings.len() {
        if assigned[i] {
            continue;
        }
        let mut cluster = vec![i];
        assigned[i] = true;
        for j in (i + 1)..embeddings.len() {
            if assigned[j] {
                continue;
            }
            if cosine(&embeddings[i], &embeddings[j]) >= threshold {
                cluster.push(j);
                assigned[j] = true;
            }
        }
        clusters.push(cluster);
    }
    clusters
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::hash::HashEmbedder;
    use crate::llm::HeuristicDistiller;
    use crate::vectorstore::memory::InMemoryStore;

    fn distiller() -> MemoryDistiller {
        let store = Arc::new(InMemoryStore::new());
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
        let memory_service = Arc::new(MemoryService::new(
            store,
            embedder.clone(),
            crate::config::ConfidenceConfig::default(),
        ));
        MemoryDistiller::new(memory_service, embedder, Arc::new(HeuristicDistiller))
    }

    #[test]
    fn greedy_cluster_groups_identical_vectors() {
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let clusters = greedy_cluster(&embeddings, 0.99);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].len(), 2);
    }

    #[tokio::test]
    async fn consolidate_on_empty_project_is_noop() {
        let d = distiller();
        let result = d.consolidate("empty-project", 0.8, false, 20).await.unwrap();
        assert_eq!(result.total_processed, 0);
        assert!(result.created_memories.is_empty());
    }

    #[tokio::test]
    async fn consolidate_rejects_bad_threshold() {
        let d = distiller();
        let err = d.consolidate("proj", 1.5, false, 20).await.unwrap_err();
        assert!(matches!(err, ContextdError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn dry_run_previews_without_mutating_the_store() {
        let d = distiller();
        d.memory_service
            .record("proj".into(), "lesson one".into(), "always validate input at the boundary".into(), vec![], 0.8, vec![])
            .await
            .unwrap();
        d.memory_service
            .record("proj".into(), "lesson two".into(), "always validate input at the boundary".into(), vec![], 0.8, vec![])
            .await
            .unwrap();

        let result = d.consolidate("proj", 0.5, true, 20).await.unwrap();
        assert_eq!(result.created_memories.len(), 1);
        assert_eq!(result.archived_memories.len(), 2);
        assert_eq!(result.total_processed, 2);

        let still_active = d.memory_service.scroll_active("proj").await.unwrap();
        assert_eq!(still_active.len(), 2);
    }

    #[tokio::test]
    async fn distill_session_produces_a_distillation_from_the_triple() {
        let d = distiller();
        let distillation = d
            .distill_session("fix the flaky test", "added a retry with backoff", "Success", None)
            .await
            .unwrap();
        assert!(distillation.content.contains("added a retry with backoff"));
    }
}
