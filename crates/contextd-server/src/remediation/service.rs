// src/remediation/service.rs
// Remediation service: stores error -> fix pairs globally (not project-scoped) and
// matches new errors against them with the hybrid scorer in matcher.rs.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use contextd_types::{
    MatchBreakdown, Remediation, RemediationSearchRequest, ScoredRemediation, Severity,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{derive_signature, hybrid_score, matcher::passes_thresholds};
use crate::config::MatcherConfig;
use crate::embeddings::Embedder;
use crate::error::{ContextdError, Result};
use crate::vectorstore::{CollectionSchema, Distance, Point, SearchParams, VectorStore};

const DATABASE: &str = "shared";
const COLLECTION: &str = "remediations";
const DEFAULT_SEARCH_LIMIT: u32 = 10;
const SEMANTIC_CANDIDATE_MULTIPLIER: usize = 4;

pub struct RemediationService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    matcher: MatcherConfig,
}

impl RemediationService {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, matcher: MatcherConfig) -> Self {
        Self {
            store,
            embedder,
            matcher,
        }
    }

    async fn ensure_collection(&self) -> Result<()> {
        if !self
            .store
            .collection_exists(DATABASE, COLLECTION)
            .await
            .map_err(|e| ContextdError::Internal(e.message))?
        {
            self.store
                .create_collection(
                    DATABASE,
                    COLLECTION,
                    CollectionSchema {
                        vector_dim: self.embedder.dim(),
                        distance: Distance::Cosine,
                        indexed_fields: vec!["error_type".into(), "signature_hash".into()],
                    },
                )
                .await
                .map_err(|e| ContextdError::Internal(e.message))?;
        }
        Ok(())
    }

    pub async fn save(
        &self,
        error_message: String,
        error_type: String,
        solution: String,
        project_path: Option<String>,
        context: HashMap<String, String>,
        tags: Vec<String>,
        severity: Option<String>,
        stack_trace: Option<String>,
    ) -> Result<Remediation> {
        if error_message.trim().is_empty() {
            return Err(ContextdError::InvalidInput("error_message is required".into()));
        }
        if solution.trim().is_empty() {
            return Err(ContextdError::InvalidInput("solution is required".into()));
        }
        let severity = match severity {
            Some(s) if !s.trim().is_empty() => Some(
                Severity::parse(&s).ok_or_else(|| {
                    ContextdError::InvalidInput(format!("severity '{s}' is not one of low/medium/high/critical"))
                })?,
            ),
            _ => None,
        };

        let solution = crate::scrub::scrub(&solution).scrubbed;
        let error_message_clean = crate::scrub::scrub(&error_message).scrubbed;
        let stack_trace = stack_trace.map(|s| crate::scrub::scrub(&s).scrubbed);

        self.ensure_collection().await?;

        let signature = derive_signature(&error_message_clean, &error_type, stack_trace.as_deref());
        let remediation = Remediation {
            id: Uuid::new_v4(),
            error_message: error_message_clean,
            error_type: signature.error_type.clone(),
            solution,
            project_path,
            context,
            tags,
            severity,
            stack_trace,
            timestamp: Utc::now().timestamp(),
            signature,
        };

        let embedding = self
            .embedder
            .embed(&format!("{}: {}", remediation.error_type, remediation.error_message))
            .await
            .map_err(ContextdError::from)?;

        let payload = json!({
            "error_message": remediation.error_message,
            "error_type": remediation.error_type,
            "solution": remediation.solution,
            "project_path": remediation.project_path,
            "context": remediation.context,
            "tags": remediation.tags,
            "severity": remediation.severity,
            "stack_trace": remediation.stack_trace,
            "timestamp": remediation.timestamp,
            "signature_hash": remediation.signature.hash,
            "normalized_error": remediation.signature.normalized_error,
            "stack_signature": remediation.signature.stack_signature,
        });

        self.store
            .upsert(
                DATABASE,
                COLLECTION,
                vec![Point {
                    id: remediation.id.to_string(),
                    vector: embedding,
                    payload,
                }],
            )
            .await
            .map_err(|e| ContextdError::TransientBackend(e.message))?;

        info!(id = %remediation.id, error_type = %remediation.error_type, "remediation saved");
        Ok(remediation)
    }

    pub async fn search(&self, req: RemediationSearchRequest) -> Result<Vec<ScoredRemediation>> {
        if req.error_message.trim().is_empty() {
            return Err(ContextdError::InvalidInput("error_message is required".into()));
        }
        let limit = req.limit.unwrap_or(DEFAULT_SEARCH_LIMIT) as usize;
        if limit == 0 {
            return Err(ContextdError::InvalidInput("limit must be greater than zero".into()));
        }

        if !self
            .store
            .collection_exists(DATABASE, COLLECTION)
            .await
            .map_err(|e| ContextdError::Internal(e.message))?
        {
            return Ok(Vec::new());
        }

        let query_signature = derive_signature(&req.error_message, "", req.stack_trace.as_deref());
        let embedding = self
            .embedder
            .embed(&format!("{}: {}", query_signature.error_type, req.error_message))
            .await
            .map_err(ContextdError::from)?;

        let candidates = self
            .store
            .search(
                DATABASE,
                COLLECTION,
                SearchParams {
                    vector: embedding,
                    limit: limit * SEMANTIC_CANDIDATE_MULTIPLIER,
                    filter: None,
                    min_score: Some(self.matcher.min_semantic),
                },
            )
            .await
            .map_err(|e| ContextdError::TransientBackend(e.message))?;

        let mut scored: Vec<ScoredRemediation> = Vec::new();
        for candidate in candidates {
            let Ok(remediation) = remediation_from_payload(&candidate.point.id, &candidate.point.payload) else {
                continue;
            };
            if !req.tags.is_empty() && !req.tags.iter().any(|t| remediation.tags.contains(t)) {
                continue;
            }
            let breakdown: MatchBreakdown = hybrid_score(
                &self.matcher,
                candidate.score,
                &query_signature.normalized_error,
                &remediation.signature.normalized_error,
                &query_signature.error_type,
                &remediation.signature.error_type,
                &query_signature.stack_signature,
                &remediation.signature.stack_signature,
            );
            if !passes_thresholds(&self.matcher, &breakdown) {
                continue;
            }
            if let Some(min) = req.min_score {
                if breakdown.hybrid < min {
                    continue;
                }
            }
            scored.push(ScoredRemediation {
                remediation,
                match_: breakdown,
            });
        }

        // Precedence: stronger error-type match first, then higher semantic score, then the
        // more recently saved remediation, then lexicographic id as a final deterministic tie-break.
        scored.sort_by(|a, b| {
            b.match_
                .type_match
                .cmp(&a.match_.type_match)
                .then_with(|| b.match_.semantic.partial_cmp(&a.match_.semantic).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| b.remediation.timestamp.cmp(&a.remediation.timestamp))
                .then_with(|| a.remediation.id.cmp(&b.remediation.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Rebuilds a `Remediation` from its stored payload, re-scrubbing `error_message`/`solution`/
/// `stack_trace` on the way out so a point written before this contract existed is still
/// never returned unredacted.
fn remediation_from_payload(id: &str, payload: &serde_json::Value) -> anyhow::Result<Remediation> {
    use contextd_types::ErrorSignature;
    let error_message =
        crate::scrub::scrub(payload.get("error_message").and_then(|v| v.as_str()).unwrap_or_default()).scrubbed;
    let error_type = payload.get("error_type").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let stack_trace = payload
        .get("stack_trace")
        .and_then(|v| v.as_str())
        .map(|s| crate::scrub::scrub(s).scrubbed);
    let signature = ErrorSignature {
        normalized_error: payload.get("normalized_error").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        error_type: error_type.clone(),
        stack_signature: payload.get("stack_signature").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        hash: payload.get("signature_hash").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
    };
    Ok(Remediation {
        id: Uuid::parse_str(id).unwrap_or_else(|_| Uuid::nil()),
        error_message,
        error_type,
        solution: crate::scrub::scrub(payload.get("solution").and_then(|v| v.as_str()).unwrap_or_default()).scrubbed,
        project_path: payload.get("project_path").and_then(|v| v.as_str()).map(|s| s.to_string()),
        context: payload
            .get("context")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        tags: payload
            .get("tags")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        severity: payload
            .get("severity")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        stack_trace,
        timestamp: payload.get("timestamp").and_then(|v| v.as_i64()).unwrap_or_default(),
        signature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::hash::HashEmbedder;
    use crate::vectorstore::memory::InMemoryStore;

    fn service() -> RemediationService {
        RemediationService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(HashEmbedder::default()),
            MatcherConfig {
                min_semantic: 0.0,
                min_string: 0.0,
                min_hybrid: 0.0,
                ..MatcherConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn save_rejects_empty_error_message() {
        let svc = service();
        let err = svc
            .save("  ".into(), "T".into(), "fix".into(), None, HashMap::new(), vec![], None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContextdError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn save_rejects_unknown_severity() {
        let svc = service();
        let err = svc
            .save(
                "connection refused".into(),
                "ConnError".into(),
                "retry with backoff".into(),
                None,
                HashMap::new(),
                vec![],
                Some("urgent".into()),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ContextdError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn search_finds_matching_remediation() {
        let svc = service();
        svc.save(
            "connection refused on port 5432".into(),
            "ConnectionError".into(),
            "check that postgres is running".into(),
            None,
            HashMap::new(),
            vec![],
            None,
            None,
        )
        .await
        .unwrap();

        let results = svc
            .search(RemediationSearchRequest {
                error_message: "connection refused on port 5432".into(),
                stack_trace: None,
                limit: None,
                min_score: None,
                tags: vec![],
            })
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(results[0].match_.hybrid > 0.0);
    }

    #[tokio::test]
    async fn save_scrubs_secrets_from_solution() {
        let svc = service();
        let r = svc
            .save(
                "db auth failed".into(),
                "AuthError".into(),
                "rotate the key sk-abcdefghijklmnopqrstuvwxyz1234567890".into(),
                None,
                HashMap::new(),
                vec![],
                None,
                None,
            )
            .await
            .unwrap();
        assert!(!r.solution.contains("sk-abcdefghijklmnopqrstuvwxyz1234567890"));
    }

    #[tokio::test]
    async fn search_ranks_exact_type_match_above_fuzzy_type_match() {
        let svc = service();
        svc.save(
            "ImportError: No module named 'requests'".into(),
            "ImportError".into(),
            "pip install requests".into(),
            None,
            HashMap::new(),
            vec![],
            None,
            None,
        )
        .await
        .unwrap();
        svc.save(
            "ModuleNotFoundError: No module named 'requests'".into(),
            "ModuleNotFoundError".into(),
            "pip install requests".into(),
            None,
            HashMap::new(),
            vec![],
            None,
            None,
        )
        .await
        .unwrap();

        let results = svc
            .search(RemediationSearchRequest {
                error_message: "ImportError: No module named 'requests'".into(),
                stack_trace: None,
                limit: None,
                min_score: None,
                tags: vec![],
            })
            .await
            .unwrap();
        assert!(results[0].match_.type_match);
        assert_eq!(results[0].remediation.error_type, "importerror");
    }
}
