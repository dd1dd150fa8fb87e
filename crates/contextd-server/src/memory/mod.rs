// src/memory/mod.rs
// Reasoning-memory service: distilled lessons scoped per project, with a confidence
// score adjusted by feedback and archived once it drops below a floor.

pub mod distiller;

use std::sync::Arc;

use chrono::Utc;
use contextd_types::Memory;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::config::ConfidenceConfig;
use crate::embeddings::Embedder;
use crate::error::{ContextdError, Result};
use crate::naming;
use crate::vectorstore::{eq, CollectionSchema, Distance, Filter, Point, SearchParams, VectorStore};

const COLLECTION: &str = "memories";
const DEFAULT_RECALL_LIMIT: usize = 10;

pub struct MemoryService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    confidence: ConfidenceConfig,
}

impl MemoryService {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, confidence: ConfidenceConfig) -> Self {
        Self {
            store,
            embedder,
            confidence,
        }
    }

    fn db_for(project_id: &str) -> String {
        naming::database_name(&contextd_types::DatabaseScope::Project(project_id.to_string()))
    }

    async fn ensure_collection(&self, db: &str) -> Result<()> {
        if !self
            .store
            .collection_exists(db, COLLECTION)
            .await
            .map_err(|e| ContextdError::Internal(e.message))?
        {
            self.store
                .create_collection(
                    db,
                    COLLECTION,
                    CollectionSchema {
                        vector_dim: self.embedder.dim(),
                        distance: Distance::Cosine,
                        indexed_fields: vec!["archived".into()],
                    },
                )
                .await
                .map_err(|e| ContextdError::Internal(e.message))?;
        }
        Ok(())
    }

    pub async fn record(
        &self,
        project_id: String,
        title: String,
        content: String,
        tags: Vec<String>,
        confidence: f32,
        source_session_ids: Vec<String>,
    ) -> Result<Memory> {
        if project_id.trim().is_empty() {
            return Err(ContextdError::InvalidInput("project_id is required".into()));
        }
        if title.trim().is_empty() {
            return Err(ContextdError::InvalidInput("title is required".into()));
        }
        if content.trim().is_empty() {
            return Err(ContextdError::InvalidInput("content is required".into()));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ContextdError::InvalidInput("confidence must be within [0, 1]".into()));
        }

        let title = crate::scrub::scrub(&title).scrubbed;
        let content = crate::scrub::scrub(&content).scrubbed;
        let db = Self::db_for(&project_id);
        self.ensure_collection(&db).await?;

        let memory = Memory {
            id: Uuid::new_v4(),
            project_id: project_id.clone(),
            title: title.clone(),
            content: content.clone(),
            tags,
            confidence,
            source_session_ids,
            supersedes: Vec::new(),
            archived: false,
            created_at: Utc::now(),
        };

        self.upsert_memory(&db, &memory).await?;
        info!(project_id = %memory.project_id, id = %memory.id, "memory recorded");
        Ok(memory)
    }

    async fn upsert_memory(&self, db: &str, memory: &Memory) -> Result<()> {
        let embedding = self
            .embedder
            .embed(&format!("{} {}", memory.title, memory.content))
            .await
            .map_err(ContextdError::from)?;
        let payload = memory_to_payload(memory);
        self.store
            .upsert(
                db,
                COLLECTION,
                vec![Point {
                    id: memory.id.to_string(),
                    vector: embedding,
                    payload,
                }],
            )
            .await
            .map_err(|e| ContextdError::TransientBackend(e.message))
    }

    pub async fn recall(&self, project_id: &str, query: &str, limit: Option<usize>) -> Result<Vec<Memory>> {
        if project_id.trim().is_empty() {
            return Err(ContextdError::InvalidInput("project_id is required".into()));
        }
        let db = Self::db_for(project_id);
        if !self
            .store
            .database_exists(&db)
            .await
            .map_err(|e| ContextdError::Internal(e.message))?
        {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query).await.map_err(ContextdError::from)?;
        let results = self
            .store
            .search(
                &db,
                COLLECTION,
                SearchParams {
                    vector: embedding,
                    limit: limit.unwrap_or(DEFAULT_RECALL_LIMIT),
                    filter: Some(Filter::matches_all(vec![eq("archived", false)])),
                    min_score: None,
                },
            )
            .await
            .map_err(|e| ContextdError::TransientBackend(e.message))?;
        Ok(results
            .into_iter()
            .filter_map(|r| memory_from_payload(&r.point.id, &r.point.payload).ok())
            .collect())
    }

    /// Applies feedback to a stored memory's confidence: `c += alpha * (1 - c)` when
    /// helpful, `c -= beta * c` when not, clamped to [0.05, 0.99]. Archives the memory once
    /// confidence drops to or below the configured floor.
    pub async fn feedback(&self, project_id: &str, memory_id: Uuid, helpful: bool) -> Result<Memory> {
        let db = Self::db_for(project_id);
        let point = self
            .store
            .get(&db, COLLECTION, &memory_id.to_string())
            .await
            .map_err(|e| ContextdError::TransientBackend(e.message))?
            .ok_or_else(|| ContextdError::NotFound(format!("memory '{memory_id}' not found")))?;
        let mut memory = memory_from_payload(&point.id, &point.payload)
            .map_err(|e| ContextdError::Internal(e.to_string()))?;

        memory.confidence = if helpful {
            memory.confidence + self.confidence.alpha * (1.0 - memory.confidence)
        } else {
            memory.confidence - self.confidence.beta * memory.confidence
        }
        .clamp(0.05, 0.99);

        if memory.confidence <= self.confidence.archive_floor {
            memory.archived = true;
        }

        self.upsert_memory(&db, &memory).await?;
        Ok(memory)
    }

    pub async fn archive(&self, project_id: &str, memory_id: Uuid) -> Result<()> {
        let db = Self::db_for(project_id);
        let point = self
            .store
            .get(&db, COLLECTION, &memory_id.to_string())
            .await
            .map_err(|e| ContextdError::TransientBackend(e.message))?
            .ok_or_else(|| ContextdError::NotFound(format!("memory '{memory_id}' not found")))?;
        let mut memory = memory_from_payload(&point.id, &point.payload)
            .map_err(|e| ContextdError::Internal(e.to_string()))?;
        memory.archived = true;
        self.upsert_memory(&db, &memory).await
    }

    pub async fn scroll_active(&self, project_id: &str) -> Result<Vec<Memory>> {
        let db = Self::db_for(project_id);
        if !self
            .store
            .database_exists(&db)
            .await
            .map_err(|e| ContextdError::Internal(e.message))?
        {
            return Ok(Vec::new());
        }
        let page = self
            .store
            .scroll(
                &db,
                COLLECTION,
                crate::vectorstore::ScrollParams {
                    filter: Some(Filter::matches_all(vec![eq("archived", false)])),
                    limit: 1000,
                    offset: None,
                },
            )
            .await
            .map_err(|e| ContextdError::TransientBackend(e.message))?;
        Ok(page
            .points
            .iter()
            .filter_map(|p| memory_from_payload(&p.id, &p.payload).ok())
            .collect())
    }
}

fn memory_to_payload(memory: &Memory) -> serde_json::Value {
    json!({
        "project_id": memory.project_id,
        "title": memory.title,
        "content": memory.content,
        "tags": memory.tags,
        "confidence": memory.confidence,
        "source_session_ids": memory.source_session_ids,
        "supersedes": memory.supersedes.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
        "archived": memory.archived,
        "created_at": memory.created_at.to_rfc3339(),
    })
}

/// Rebuilds a `Memory` from its stored payload, re-scrubbing `title`/`content` on the way
/// out so a point written before this contract existed is still never returned unredacted.
fn memory_from_payload(id: &str, payload: &serde_json::Value) -> anyhow::Result<Memory> {
    Ok(Memory {
        id: Uuid::parse_str(id).unwrap_or_else(|_| Uuid::nil()),
        project_id: payload.get("project_id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        title: crate::scrub::scrub(payload.get("title").and_then(|v| v.as_str()).unwrap_or_default()).scrubbed,
        content: crate::scrub::scrub(payload.get("content").and_then(|v| v.as_str()).unwrap_or_default()).scrubbed,
        tags: payload
            .get("tags")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        confidence: payload.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.5) as f32,
        source_session_ids: payload
            .get("source_session_ids")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        supersedes: payload
            .get("supersedes")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().and_then(|s| Uuid::parse_str(s).ok()))
                    .collect()
            })
            .unwrap_or_default(),
        archived: payload.get("archived").and_then(|v| v.as_bool()).unwrap_or(false),
        created_at: payload
            .get("created_at")
            .and_then(|v| v.as_str())
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::hash::HashEmbedder;
    use crate::vectorstore::memory::InMemoryStore;

    fn service() -> MemoryService {
        MemoryService::new(Arc::new(InMemoryStore::new()), Arc::new(HashEmbedder::default()), ConfidenceConfig::default())
    }

    #[tokio::test]
    async fn record_rejects_out_of_range_confidence() {
        let svc = service();
        let err = svc
            .record("proj".into(), "title".into(), "content".into(), vec![], 1.5, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ContextdError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn feedback_helpful_increases_confidence() {
        let svc = service();
        let memory = svc
            .record("proj".into(), "title".into(), "content here".into(), vec![], 0.5, vec![])
            .await
            .unwrap();
        let updated = svc.feedback("proj", memory.id, true).await.unwrap();
        assert!(updated.confidence > 0.5);
    }

    #[tokio::test]
    async fn feedback_unhelpful_decreases_and_can_archive() {
        let svc = service();
        let memory = svc
            .record("proj".into(), "title".into(), "content here".into(), vec![], 0.31, vec![])
            .await
            .unwrap();
        let updated = svc.feedback("proj", memory.id, false).await.unwrap();
        assert!(updated.confidence < 0.31);
        assert!(updated.archived);
    }

    #[tokio::test]
    async fn record_scrubs_secrets_from_title_and_content() {
        let svc = service();
        let memory = svc
            .record(
                "proj".into(),
                "key is sk-abcdefghijklmnopqrstuvwxyz1234567890".into(),
                "rotate sk-abcdefghijklmnopqrstuvwxyz1234567890 immediately".into(),
                vec![],
                0.8,
                vec![],
            )
            .await
            .unwrap();
        assert!(!memory.title.contains("sk-abcdefghijklmnopqrstuvwxyz1234567890"));
        assert!(!memory.content.contains("sk-abcdefghijklmnopqrstuvwxyz1234567890"));
    }

    #[tokio::test]
    async fn recall_excludes_archived_memories() {
        let svc = service();
        let memory = svc
            .record("proj".into(), "title".into(), "some lesson about retries".into(), vec![], 0.9, vec![])
            .await
            .unwrap();
        svc.archive("proj", memory.id).await.unwrap();
        let results = svc.recall("proj", "lesson about retries", None).await.unwrap();
        assert!(results.iter().all(|m| m.id != memory.id));
    }
}
