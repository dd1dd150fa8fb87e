// src/vectorstore/memory.rs
// In-memory VectorStore used by tests only (never wired into main.rs).
//
// Brute-force cosine similarity over a Vec<Point> per collection. Mirrors the teacher's
// "throwaway backend per test" philosophy (db/test_support.rs) adapted from SQLite rows to
// vector points, so service-layer tests never need a live Qdrant instance.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    BackendCapabilities, CollectionSchema, Condition, Distance, Filter, HealthStatus, Point,
    ScoredPoint, ScrollPage, ScrollParams, SearchParams, StoreError, StoreResult, VectorStore,
};

#[derive(Default)]
struct Collection {
    schema: CollectionSchema,
    points: Vec<Point>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<HashMap<String, HashMap<String, Collection>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(point: &Point, filter: &Filter) -> bool {
    let check = |c: &Condition| match c {
        Condition::Matches { key, value } => point.payload.get(key) == Some(value),
    };
    if !filter.must.iter().all(check) {
        return false;
    }
    if filter.must_not.iter().any(check) {
        return false;
    }
    if !filter.should.is_empty() && !filter.should.iter().any(check) {
        return false;
    }
    true
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

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn create_database(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn database_exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.inner.lock().unwrap().contains_key(name))
    }

    async fn list_databases(&self) -> StoreResult<Vec<String>> {
        Ok(self.inner.lock().unwrap().keys().cloned().collect())
    }

    async fn delete_database(&self, name: &str) -> StoreResult<()> {
        self.inner.lock().unwrap().remove(name);
        Ok(())
    }

    async fn create_collection(
        &self,
        database: &str,
        collection: &str,
        schema: CollectionSchema,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let db = inner.entry(database.to_string()).or_default();
        db.entry(collection.to_string()).or_insert(Collection {
            schema,
            points: Vec::new(),
        });
        Ok(())
    }

    async fn collection_exists(&self, database: &str, collection: &str) -> StoreResult<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .get(database)
            .map(|db| db.contains_key(collection))
            .unwrap_or(false))
    }

    async fn list_collections(&self, database: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .get(database)
            .map(|db| db.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_collection(&self, database: &str, collection: &str) -> StoreResult<()> {
        if let Some(db) = self.inner.lock().unwrap().get_mut(database) {
            db.remove(collection);
        }
        Ok(())
    }

    async fn upsert(&self, database: &str, collection: &str, points: Vec<Point>) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let db = inner
            .get_mut(database)
            .ok_or_else(|| StoreError::terminal(format!("database '{database}' does not exist")))?;
        let coll = db
            .get_mut(collection)
            .ok_or_else(|| StoreError::terminal(format!("collection '{collection}' does not exist")))?;
        for p in points {
            coll.points.retain(|existing| existing.id != p.id);
            coll.points.push(p);
        }
        Ok(())
    }

    async fn get(&self, database: &str, collection: &str, id: &str) -> StoreResult<Option<Point>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .get(database)
            .and_then(|db| db.get(collection))
            .and_then(|coll| coll.points.iter().find(|p| p.id == id).cloned()))
    }

    async fn delete_points(&self, database: &str, collection: &str, ids: &[String]) -> StoreResult<()> {
        if let Some(db) = self.inner.lock().unwrap().get_mut(database) {
            if let Some(coll) = db.get_mut(collection) {
                coll.points.retain(|p| !ids.contains(&p.id));
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        database: &str,
        collection: &str,
        params: SearchParams,
    ) -> StoreResult<Vec<ScoredPoint>> {
        let inner = self.inner.lock().unwrap();
        let Some(coll) = inner.get(database).and_then(|db| db.get(collection)) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<ScoredPoint> = coll
            .points
            .iter()
            .filter(|p| params.filter.as_ref().map(|f| matches(p, f)).unwrap_or(true))
            .map(|p| ScoredPoint {
                point: p.clone(),
                score: cosine(&p.vector, &params.vector),
            })
            .filter(|sp| params.min_score.map(|min| sp.score >= min).unwrap_or(true))
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(params.limit);
        Ok(scored)
    }

    async fn scroll(
        &self,
        database: &str,
        collection: &str,
        params: ScrollParams,
    ) -> StoreResult<ScrollPage> {
        let inner = self.inner.lock().unwrap();
        let Some(coll) = inner.get(database).and_then(|db| db.get(collection)) else {
            return Ok(ScrollPage::default());
        };
        let start = params
            .offset
            .as_ref()
            .and_then(|o| o.parse::<usize>().ok())
            .unwrap_or(0);
        let filtered: Vec<&Point> = coll
            .points
            .iter()
            .filter(|p| params.filter.as_ref().map(|f| matches(p, f)).unwrap_or(true))
            .collect();
        let end = (start + params.limit.max(1)).min(filtered.len());
        let page: Vec<Point> = filtered.get(start..end).unwrap_or(&[]).iter().map(|p| (*p).clone()).collect();
        let next_offset = if end < filtered.len() {
            Some(end.to_string())
        } else {
            None
        };
        Ok(ScrollPage {
            points: page,
            next_offset,
        })
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            native_databases: true,
            distances: vec![Distance::Cosine],
            supports_filterless_scroll: true,
            max_vector_dim: usize::MAX,
        }
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::Healthy
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create_database("db").await.unwrap();
        store
            .create_collection(
                "db",
                "coll",
                CollectionSchema {
                    vector_dim: 3,
                    distance: super::super::Distance::Cosine,
                    indexed_fields: vec![],
                },
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let store = seeded_store().await;
        store
            .upsert(
                "db",
                "coll",
                vec![Point {
                    id: "1".into(),
                    vector: vec![1.0, 0.0, 0.0],
                    payload: json!({"tag": "a"}),
                }],
            )
            .await
            .unwrap();
        let got = store.get("db", "coll", "1").await.unwrap();
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let store = seeded_store().await;
        store
            .upsert(
                "db",
                "coll",
                vec![
                    Point { id: "1".into(), vector: vec![1.0, 0.0, 0.0], payload: json!({}) },
                    Point { id: "2".into(), vector: vec![0.0, 1.0, 0.0], payload: json!({}) },
                ],
            )
            .await
            .unwrap();
        let results = store
            .search(
                "db",
                "coll",
                SearchParams {
                    vector: vec![1.0, 0.0, 0.0],
                    limit: 10,
                    filter: None,
                    min_score: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(results[0].point.id, "1");
    }

    #[tokio::test]
    async fn upsert_into_missing_collection_is_terminal() {
        let store = InMemoryStore::new();
        let err = store
            .upsert("db", "coll", vec![Point { id: "1".into(), vector: vec![], payload: json!({}) }])
            .await
            .unwrap_err();
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn filter_excludes_non_matching_payloads() {
        let store = seeded_store().await;
        store
            .upsert(
                "db",
                "coll",
                vec![
                    Point { id: "1".into(), vector: vec![1.0, 0.0, 0.0], payload: json!({"project": "a"}) },
                    Point { id: "2".into(), vector: vec![1.0, 0.0, 0.0], payload: json!({"project": "b"}) },
                ],
            )
            .await
            .unwrap();
        let results = store
            .search(
                "db",
                "coll",
                SearchParams {
                    vector: vec![1.0, 0.0, 0.0],
                    limit: 10,
                    filter: Some(Filter::matches_all(vec![super::super::eq("project", "a")])),
                    min_score: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].point.id, "1");
    }
}
