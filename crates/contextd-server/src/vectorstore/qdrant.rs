// src/vectorstore/qdrant.rs
// Qdrant-backed VectorStore, grounded on backend/src/memory/storage/qdrant/multi_store.rs:
// logical databases map to a collection-name prefix, collections are physical Qdrant
// collections, and payload filters translate to qdrant-client's Filter/Condition types.
// Retry/backoff is grounded on llm/http_client.rs's execute_with_retry.

use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance as QDistance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, warn};

use super::{
    BackendCapabilities, CollectionSchema, Distance, HealthStatus, Point, ScoredPoint, ScrollPage,
    ScrollParams, SearchParams, StoreError, StoreResult, VectorStore,
};
use crate::naming;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 1000;

pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    pub fn connect(url: &str) -> anyhow::Result<Self> {
        let client = Qdrant::from_url(url).build()?;
        Ok(Self { client })
    }

    fn collection_key(database: &str, collection: &str) -> String {
        format!("{database}__{collection}")
    }

    /// Runs `op` with exponential backoff + 20% jitter across up to 3 attempts, matching the
    /// 1s/2s/4s schedule used for backend retries elsewhere in the service layer.
    async fn with_retry<T, F, Fut>(&self, op_name: &str, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, qdrant_client::QdrantError>>,
    {
        let mut last_err = None;
        for attempt in 0..RETRY_ATTEMPTS {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    warn!(op = op_name, attempt, error = %e, "qdrant call failed");
                    last_err = Some(e);
                    if attempt + 1 < RETRY_ATTEMPTS {
                        let base = RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
                        let jitter = (base as f64 * (rand::random::<f64>() * 0.4 - 0.2)) as i64;
                        let delay = (base as i64 + jitter).max(0) as u64;
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }
        Err(StoreError::retryable(format!(
            "{op_name} failed after {RETRY_ATTEMPTS} attempts: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    fn to_qdrant_filter(filter: &super::Filter) -> qdrant_client::qdrant::Filter {
        use qdrant_client::qdrant::{Condition as QCondition, Filter as QFilter};

        let to_q = |c: &super::Condition| -> QCondition {
            let super::Condition::Matches { key, value } = c;
            match value {
                serde_json::Value::String(s) => QCondition::matches(key, s.clone()),
                serde_json::Value::Bool(b) => QCondition::matches(key, *b),
                serde_json::Value::Number(n) if n.is_i64() => {
                    QCondition::matches(key, n.as_i64().unwrap())
                }
                other => QCondition::matches(key, other.to_string()),
            }
        };

        QFilter {
            must: filter.must.iter().map(to_q).collect(),
            must_not: filter.must_not.iter().map(to_q).collect(),
            should: filter.should.iter().map(to_q).collect(),
            ..Default::default()
        }
    }
}

fn to_qdrant_distance(d: Distance) -> QDistance {
    match d {
        Distance::Cosine => QDistance::Cosine,
        Distance::Dot => QDistance::Dot,
        Distance::Euclidean => QDistance::Euclid,
    }
}

/// Flattens a JSON object into the `HashMap<String, qdrant_client::qdrant::Value>` shape
/// Qdrant's `PointStruct::new` expects, the same way the teacher builds payloads field by
/// field rather than going through a generic JSON-to-payload converter.
fn json_to_payload_map(
    value: &serde_json::Value,
) -> std::collections::HashMap<String, qdrant_client::qdrant::Value> {
    let mut payload = std::collections::HashMap::new();
    let Some(obj) = value.as_object() else {
        return payload;
    };
    for (k, v) in obj {
        let qv: qdrant_client::qdrant::Value = match v {
            serde_json::Value::String(s) => s.clone().into(),
            serde_json::Value::Bool(b) => (*b).into(),
            serde_json::Value::Number(n) if n.is_i64() => n.as_i64().unwrap().into(),
            serde_json::Value::Number(n) if n.is_f64() => n.as_f64().unwrap().into(),
            other => other.to_string().into(),
        };
        payload.insert(k.clone(), qv);
    }
    payload
}

#[async_trait]
impl VectorStore for QdrantStore {
    // Qdrant has no native "database" concept; logical databases are realized purely as a
    // naming prefix on collections, matching the teacher's multi-tenant scheme.
    async fn create_database(&self, _name: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn database_exists(&self, name: &str) -> StoreResult<bool> {
        let prefix = format!("{name}__");
        let collections = self.list_collections_raw().await?;
        Ok(collections.iter().any(|c| c.starts_with(&prefix)))
    }

    async fn list_databases(&self) -> StoreResult<Vec<String>> {
        let collections = self.list_collections_raw().await?;
        let mut dbs: Vec<String> = collections
            .iter()
            .filter_map(|c| c.split_once("__").map(|(db, _)| db.to_string()))
            .collect();
        dbs.sort();
        dbs.dedup();
        Ok(dbs)
    }

    async fn delete_database(&self, name: &str) -> StoreResult<()> {
        let prefix = format!("{name}__");
        for c in self.list_collections_raw().await? {
            if c.starts_with(&prefix) {
                self.with_retry("delete_collection", || self.client.delete_collection(c.clone()))
                    .await?;
            }
        }
        Ok(())
    }

    async fn create_collection(
        &self,
        database: &str,
        collection: &str,
        schema: CollectionSchema,
    ) -> StoreResult<()> {
        let key = Self::collection_key(database, collection);
        let vectors = VectorParamsBuilder::new(schema.vector_dim as u64, to_qdrant_distance(schema.distance));
        self.with_retry("create_collection", || {
            self.client
                .create_collection(CreateCollectionBuilder::new(key.clone()).vectors_config(vectors.clone()))
        })
        .await?;
        for field in &schema.indexed_fields {
            debug!(field = %field, collection = %key, "field indexing requested");
        }
        Ok(())
    }

    async fn collection_exists(&self, database: &str, collection: &str) -> StoreResult<bool> {
        let key = Self::collection_key(database, collection);
        self.with_retry("collection_exists", || self.client.collection_exists(key.clone()))
            .await
    }

    async fn list_collections(&self, database: &str) -> StoreResult<Vec<String>> {
        let prefix = format!("{database}__");
        Ok(self
            .list_collections_raw()
            .await?
            .into_iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(|s| s.to_string()))
            .collect())
    }

    async fn delete_collection(&self, database: &str, collection: &str) -> StoreResult<()> {
        let key = Self::collection_key(database, collection);
        self.with_retry("delete_collection", || self.client.delete_collection(key.clone()))
            .await
    }

    async fn upsert(&self, database: &str, collection: &str, points: Vec<Point>) -> StoreResult<()> {
        let key = Self::collection_key(database, collection);
        let structs: Vec<PointStruct> = points
            .iter()
            .map(|p| PointStruct::new(p.id.clone(), p.vector.clone(), json_to_payload_map(&p.payload)))
            .collect();
        self.with_retry("upsert", || {
            self.client
                .upsert_points(UpsertPointsBuilder::new(key.clone(), structs.clone()))
        })
        .await?;
        Ok(())
    }

    async fn get(&self, database: &str, collection: &str, id: &str) -> StoreResult<Option<Point>> {
        let results = self
            .scroll(
                database,
                collection,
                ScrollParams {
                    filter: Some(super::Filter::matches_all(vec![super::eq("id", id)])),
                    limit: 1,
                    offset: None,
                },
            )
            .await?;
        Ok(results.points.into_iter().next())
    }

    async fn delete_points(&self, database: &str, collection: &str, ids: &[String]) -> StoreResult<()> {
        let key = Self::collection_key(database, collection);
        let point_ids: Vec<qdrant_client::qdrant::PointId> =
            ids.iter().map(|id| id.clone().into()).collect();
        self.with_retry("delete_points", || {
            self.client.delete_points(
                qdrant_client::qdrant::DeletePointsBuilder::new(key.clone())
                    .points(point_ids.clone()),
            )
        })
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        database: &str,
        collection: &str,
        params: SearchParams,
    ) -> StoreResult<Vec<ScoredPoint>> {
        let key = Self::collection_key(database, collection);
        let mut builder = SearchPointsBuilder::new(key.clone(), params.vector.clone(), params.limit as u64)
            .with_payload(true);
        if let Some(filter) = &params.filter {
            builder = builder.filter(Self::to_qdrant_filter(filter));
        }
        if let Some(min_score) = params.min_score {
            builder = builder.score_threshold(min_score);
        }
        let response = self
            .with_retry("search", || self.client.search_points(builder.clone()))
            .await?;
        Ok(response
            .result
            .into_iter()
            .map(|sp| ScoredPoint {
                score: sp.score,
                point: Point {
                    id: sp
                        .id
                        .map(|id| format!("{:?}", id))
                        .unwrap_or_default(),
                    vector: Vec::new(),
                    payload: qdrant_payload_to_json(sp.payload),
                },
            })
            .collect())
    }

    async fn scroll(
        &self,
        database: &str,
        collection: &str,
        params: ScrollParams,
    ) -> StoreResult<ScrollPage> {
        let key = Self::collection_key(database, collection);
        let mut builder = qdrant_client::qdrant::ScrollPointsBuilder::new(key.clone())
            .limit(params.limit.max(1) as u32)
            .with_payload(true)
            .with_vectors(true);
        if let Some(filter) = &params.filter {
            builder = builder.filter(Self::to_qdrant_filter(filter));
        }
        let response = self
            .with_retry("scroll", || self.client.scroll(builder.clone()))
            .await?;
        let points = response
            .result
            .into_iter()
            .map(|p| Point {
                id: p.id.map(|id| format!("{:?}", id)).unwrap_or_default(),
                vector: Vec::new(),
                payload: qdrant_payload_to_json(p.payload),
            })
            .collect();
        Ok(ScrollPage {
            points,
            next_offset: response.next_page_offset.map(|id| format!("{:?}", id)),
        })
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            native_databases: false,
            distances: vec![Distance::Cosine, Distance::Dot, Distance::Euclidean],
            supports_filterless_scroll: true,
            max_vector_dim: 65536,
        }
    }

    async fn health(&self) -> HealthStatus {
        match self.client.health_check().await {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = %e, "qdrant health check failed");
                HealthStatus::Unreachable
            }
        }
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl QdrantStore {
    async fn list_collections_raw(&self) -> StoreResult<Vec<String>> {
        let response = self
            .with_retry("list_collections", || self.client.list_collections())
            .await?;
        Ok(response.into_iter().map(|c| c.name).collect())
    }
}

fn qdrant_payload_to_json(
    payload: std::collections::HashMap<String, qdrant_client::qdrant::Value>,
) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = payload
        .into_iter()
        .map(|(k, v)| (k, qdrant_value_to_json(v)))
        .collect();
    serde_json::Value::Object(map)
}

fn qdrant_value_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    serde_json::to_value(value.kind).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_key_joins_database_and_collection() {
        assert_eq!(QdrantStore::collection_key("proj_ab", "checkpoints"), "proj_ab__checkpoints");
    }

    #[test]
    fn distance_mapping_covers_all_variants() {
        assert_eq!(to_qdrant_distance(Distance::Cosine), QDistance::Cosine);
        assert_eq!(to_qdrant_distance(Distance::Dot), QDistance::Dot);
        assert_eq!(to_qdrant_distance(Distance::Euclidean), QDistance::Euclid);
    }
}
