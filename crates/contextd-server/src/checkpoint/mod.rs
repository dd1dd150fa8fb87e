// src/checkpoint/mod.rs
// Checkpoint service: point-in-time summaries of in-progress session work.
//
// Service-struct/validate-then-act shape grounded on backend/src/checkpoint/mod.rs's
// CheckpointManager (the manager-holds-a-backend-handle pattern); the snapshot-the-files
// semantics of that teacher file do not apply here — checkpoints in this system are
// free-text summaries, not file-content snapshots.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use contextd_types::{Checkpoint, CheckpointSearchRequest, ScoredCheckpoint};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::embeddings::Embedder;
use crate::error::{ContextdError, Result};
use crate::naming;
use crate::vectorstore::{eq, CollectionSchema, Distance, Filter, Point, SearchParams, VectorStore};

const COLLECTION: &str = "checkpoints";
const MAX_SUMMARY_CHARS: usize = 500;
const MAX_CONTENT_BYTES: usize = 100 * 1024;
const DEFAULT_SEARCH_LIMIT: u32 = 10;

pub struct CheckpointService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    min_score_default: f32,
}

impl CheckpointService {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, min_score_default: f32) -> Self {
        Self {
            store,
            embedder,
            min_score_default,
        }
    }

    fn project_hash(project_path: &str) -> String {
        naming::database_name(&contextd_types::DatabaseScope::Project(project_path.to_string()))
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
                        indexed_fields: vec!["project_hash".into(), "branch".into()],
                    },
                )
                .await
                .map_err(|e| ContextdError::Internal(e.message))?;
        }
        Ok(())
    }

    pub async fn save(
        &self,
        project_path: String,
        summary: String,
        content: Option<String>,
        tags: Vec<String>,
        metadata: HashMap<String, String>,
        branch: Option<String>,
    ) -> Result<Checkpoint> {
        if project_path.trim().is_empty() {
            return Err(ContextdError::InvalidInput("project_path is required".into()));
        }
        if !Path::new(&project_path).is_absolute() {
            return Err(ContextdError::InvalidInput(format!(
                "project_path '{project_path}' must be an absolute path"
            )));
        }
        if summary.trim().is_empty() {
            return Err(ContextdError::InvalidInput("summary is required".into()));
        }
        if summary.chars().count() > MAX_SUMMARY_CHARS {
            return Err(ContextdError::InvalidInput(format!(
                "summary exceeds {MAX_SUMMARY_CHARS} characters"
            )));
        }
        let content = content.unwrap_or_default();
        if content.len() > MAX_CONTENT_BYTES {
            return Err(ContextdError::InvalidInput(format!(
                "content exceeds {MAX_CONTENT_BYTES} bytes"
            )));
        }

        let content = crate::scrub::scrub(&content).scrubbed;
        let summary_clean = crate::scrub::scrub(&summary).scrubbed;

        let branch = match branch {
            Some(b) => b,
            None => detect_branch(&project_path).unwrap_or_default(),
        };

        let db = Self::project_hash(&project_path);
        self.ensure_collection(&db).await?;

        let now = Utc::now();
        let checkpoint = Checkpoint {
            id: Uuid::new_v4(),
            project_path: project_path.clone(),
            project_hash: db.clone(),
            summary: summary_clean.clone(),
            content: content.clone(),
            metadata,
            tags,
            branch,
            created_at: now,
            updated_at: now,
        };

        let embedding = self
            .embedder
            .embed(&format!("{summary_clean}\n\n{content}"))
            .await
            .map_err(ContextdError::from)?;

        let payload = json!({
            "project_path": checkpoint.project_path,
            "project_hash": checkpoint.project_hash,
            "summary": checkpoint.summary,
            "content": checkpoint.content,
            "metadata": checkpoint.metadata,
            "tags": checkpoint.tags,
            "branch": checkpoint.branch,
            "created_at": checkpoint.created_at.to_rfc3339(),
            "updated_at": checkpoint.updated_at.to_rfc3339(),
        });

        self.store
            .upsert(
                &db,
                COLLECTION,
                vec![Point {
                    id: checkpoint.id.to_string(),
                    vector: embedding,
                    payload,
                }],
            )
            .await
            .map_err(|e| ContextdError::TransientBackend(e.message))?;

        info!(project_hash = %checkpoint.project_hash, id = %checkpoint.id, "checkpoint saved");
        Ok(checkpoint)
    }

    pub async fn search(&self, req: CheckpointSearchRequest) -> Result<Vec<ScoredCheckpoint>> {
        if req.project_path.trim().is_empty() {
            return Err(ContextdError::InvalidInput("project_path is required".into()));
        }
        if req.query.trim().is_empty() {
            return Err(ContextdError::InvalidInput("query is required".into()));
        }
        let limit = req.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        if limit == 0 {
            return Err(ContextdError::InvalidInput("limit must be greater than zero".into()));
        }
        if let Some(min_score) = req.min_score {
            if !(0.0..=1.0).contains(&min_score) {
                return Err(ContextdError::InvalidInput("min_score must be within [0, 1]".into()));
            }
        }

        let db = Self::project_hash(&req.project_path);
        if !self
            .store
            .database_exists(&db)
            .await
            .map_err(|e| ContextdError::Internal(e.message))?
        {
            return Ok(Vec::new());
        }

        let mut must = vec![eq("project_hash", db.clone())];
        if let Some(branch) = &req.branch {
            must.push(eq("branch", branch.clone()));
        }

        let embedding = self.embedder.embed(&req.query).await.map_err(ContextdError::from)?;

        let results = self
            .store
            .search(
                &db,
                COLLECTION,
                SearchParams {
                    vector: embedding,
                    limit: limit as usize,
                    filter: Some(Filter::matches_all(must)),
                    min_score: req.min_score.or(Some(self.min_score_default)),
                },
            )
            .await
            .map_err(|e| ContextdError::TransientBackend(e.message))?;

        let mut scored: Vec<ScoredCheckpoint> = results
            .into_iter()
            .filter_map(|r| {
                let cp = checkpoint_from_payload(&r.point.id, &r.point.payload).ok()?;
                if !req.tags.is_empty() && !req.tags.iter().any(|t| cp.tags.contains(t)) {
                    return None;
                }
                Some(ScoredCheckpoint {
                    checkpoint: cp,
                    score: r.score,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }

    pub async fn list(
        &self,
        project_path: String,
        limit: Option<u32>,
        offset: Option<u32>,
        tags: Vec<String>,
    ) -> Result<Vec<Checkpoint>> {
        if project_path.trim().is_empty() {
            return Err(ContextdError::InvalidInput("project_path is required".into()));
        }
        let db = Self::project_hash(&project_path);
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
                    filter: Some(Filter::matches_all(vec![eq("project_hash", db.clone())])),
                    limit: limit.unwrap_or(50) as usize,
                    offset: offset.map(|o| o.to_string()),
                },
            )
            .await
            .map_err(|e| ContextdError::TransientBackend(e.message))?;

        let mut checkpoints: Vec<Checkpoint> = page
            .points
            .iter()
            .filter_map(|p| checkpoint_from_payload(&p.id, &p.payload).ok())
            .filter(|cp| tags.is_empty() || tags.iter().any(|t| cp.tags.contains(t)))
            .collect();
        checkpoints.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(checkpoints)
    }

    pub async fn get(&self, project_path: &str, id: Uuid) -> Result<Checkpoint> {
        let db = Self::project_hash(project_path);
        let point = self
            .store
            .get(&db, COLLECTION, &id.to_string())
            .await
            .map_err(|e| ContextdError::TransientBackend(e.message))?
            .ok_or_else(|| ContextdError::NotFound(format!("checkpoint '{id}' not found")))?;
        checkpoint_from_payload(&point.id, &point.payload)
            .map_err(|e| ContextdError::Internal(e.to_string()))
    }
}

/// Rebuilds a `Checkpoint` from its stored payload, re-scrubbing `summary`/`content` on the
/// way out so a point written before this contract existed (or by an older deployment) is
/// still never returned with a live secret in it.
fn checkpoint_from_payload(id: &str, payload: &serde_json::Value) -> anyhow::Result<Checkpoint> {
    Ok(Checkpoint {
        id: Uuid::parse_str(id).unwrap_or_else(|_| Uuid::nil()),
        project_path: field_str(payload, "project_path"),
        project_hash: field_str(payload, "project_hash"),
        summary: crate::scrub::scrub(&field_str(payload, "summary")).scrubbed,
        content: crate::scrub::scrub(&field_str(payload, "content")).scrubbed,
        metadata: payload
            .get("metadata")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        tags: payload
            .get("tags")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        branch: field_str(payload, "branch"),
        created_at: field_timestamp(payload, "created_at"),
        updated_at: field_timestamp(payload, "updated_at"),
    })
}

fn field_str(payload: &serde_json::Value, key: &str) -> String {
    payload.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

fn field_timestamp(payload: &serde_json::Value, key: &str) -> chrono::DateTime<Utc> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Best-effort current branch name. Returns an empty string (never an error) on a detached
/// HEAD, a non-repository path, or any libgit2 failure — branch detection is a convenience,
/// not a requirement.
fn detect_branch(project_path: &str) -> Option<String> {
    match git2::Repository::open(project_path) {
        Ok(repo) => match repo.head() {
            Ok(head) if head.is_branch() => head.shorthand().map(|s| s.to_string()),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "git HEAD lookup failed");
                None
            }
        },
        Err(e) => {
            debug!(path = %project_path, error = %e, "not a git repository, skipping branch detection");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::hash::HashEmbedder;
    use crate::vectorstore::memory::InMemoryStore;

    fn service() -> CheckpointService {
        CheckpointService::new(Arc::new(InMemoryStore::new()), Arc::new(HashEmbedder::default()), 0.0)
    }

    #[tokio::test]
    async fn save_rejects_relative_project_path() {
        let svc = service();
        let err = svc
            .save("relative/path".into(), "summary".into(), None, vec![], HashMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContextdError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn save_rejects_empty_summary() {
        let svc = service();
        let err = svc
            .save("/tmp/proj".into(), "   ".into(), None, vec![], HashMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContextdError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn save_then_get_roundtrips() {
        let svc = service();
        let saved = svc
            .save(
                "/tmp/proj".into(),
                "fixed the race condition in the session reaper".into(),
                Some("details".into()),
                vec!["bugfix".into()],
                HashMap::new(),
                None,
            )
            .await
            .unwrap();
        let fetched = svc.get("/tmp/proj", saved.id).await.unwrap();
        assert_eq!(fetched.summary, saved.summary);
    }

    #[tokio::test]
    async fn search_only_returns_matching_project() {
        let svc = service();
        svc.save(
            "/tmp/proj-a".into(),
            "refactored the matcher scoring function".into(),
            None,
            vec![],
            HashMap::new(),
            None,
        )
        .await
        .unwrap();
        svc.save(
            "/tmp/proj-b".into(),
            "refactored the matcher scoring function".into(),
            None,
            vec![],
            HashMap::new(),
            None,
        )
        .await
        .unwrap();

        let results = svc
            .search(CheckpointSearchRequest {
                project_path: "/tmp/proj-a".into(),
                query: "matcher scoring".into(),
                limit: None,
                min_score: Some(0.0),
                tags: vec![],
                branch: None,
            })
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.checkpoint.project_path == "/tmp/proj-a"));
    }

    #[tokio::test]
    async fn save_scrubs_secrets_from_content() {
        let svc = service();
        let saved = svc
            .save(
                "/tmp/proj".into(),
                "added new config".into(),
                Some("export key: AKIA1234567890ABCDEF".into()),
                vec![],
                HashMap::new(),
                None,
            )
            .await
            .unwrap();
        assert!(!saved.content.contains("AKIA1234567890ABCDEF"));
    }

    #[test]
    fn detect_branch_is_empty_for_non_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_branch(dir.path().to_str().unwrap()), None);
    }
}
