// src/vectorstore/mod.rs
// Multi-tenant vector store abstraction.
//
// This trait is the single seam between every service (checkpoint, remediation, memory) and
// whatever backend actually stores vectors. It is grounded on the shape of the teacher's
// storage abstraction in backend/src/memory/storage/qdrant/multi_store.rs: databases are
// logical namespaces, each holding named collections, each collection holding points with a
// fixed-dimension vector plus a JSON-ish payload. Filters are a small boolean-tree DSL so
// callers never leak backend-specific query syntax up through the service layer.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
    Dot,
    Euclidean,
}

#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub vector_dim: usize,
    pub distance: Distance,
    /// Payload keys the backend should build an index on, for filter performance.
    pub indexed_fields: Vec<String>,
}

impl Default for CollectionSchema {
    fn default() -> Self {
        Self {
            vector_dim: 0,
            distance: Distance::Cosine,
            indexed_fields: Vec::new(),
        }
    }
}

/// A single stored vector plus its payload.
#[derive(Debug, Clone)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// Result of a similarity search: a point and its similarity score (higher is better,
/// already normalized to the store's distance metric — callers never see raw distances).
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub point: Point,
    pub score: f32,
}

/// Boolean filter tree matched against point payloads. Mirrors the must/must_not/should
/// shape of Qdrant's own filter so the Qdrant adapter can translate it near 1:1, while
/// keeping the type backend-agnostic for the in-memory test adapter.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub must: Vec<Condition>,
    pub must_not: Vec<Condition>,
    pub should: Vec<Condition>,
}

impl Filter {
    pub fn matches_all(conditions: Vec<Condition>) -> Self {
        Self {
            must: conditions,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.must_not.is_empty() && self.should.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Condition {
    /// Payload field equals an exact scalar value.
    Matches { key: String, value: Value },
}

pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Condition {
    Condition::Matches {
        key: key.into(),
        value: value.into(),
    }
}

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub vector: Vec<f32>,
    pub limit: usize,
    pub filter: Option<Filter>,
    pub min_score: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct ScrollParams {
    pub filter: Option<Filter>,
    pub limit: usize,
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub points: Vec<Point>,
    pub next_offset: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unreachable,
}

/// What a backend adapter actually supports, so callers can branch instead of guessing.
#[derive(Debug, Clone)]
pub struct BackendCapabilities {
    /// True when the backend has a native notion of "database"; false when databases are
    /// simulated as a collection-name prefix (Qdrant).
    pub native_databases: bool,
    pub distances: Vec<Distance>,
    pub supports_filterless_scroll: bool,
    pub max_vector_dim: usize,
}

/// Error raised by a backend adapter. `retryable` distinguishes transient conditions (the
/// caller's retry/backoff wrapper should retry) from terminal ones (bad request, not found)
/// that retrying can never fix.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
    pub retryable: bool,
}

impl StoreError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Backend-agnostic multi-tenant vector store contract.
///
/// Implementors: [`qdrant::QdrantStore`] for production, [`memory::InMemoryStore`] for tests.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_database(&self, name: &str) -> StoreResult<()>;
    async fn database_exists(&self, name: &str) -> StoreResult<bool>;
    async fn list_databases(&self) -> StoreResult<Vec<String>>;
    async fn delete_database(&self, name: &str) -> StoreResult<()>;

    async fn create_collection(
        &self,
        database: &str,
        collection: &str,
        schema: CollectionSchema,
    ) -> StoreResult<()>;
    async fn collection_exists(&self, database: &str, collection: &str) -> StoreResult<bool>;
    async fn list_collections(&self, database: &str) -> StoreResult<Vec<String>>;
    async fn delete_collection(&self, database: &str, collection: &str) -> StoreResult<()>;

    async fn upsert(&self, database: &str, collection: &str, points: Vec<Point>) -> StoreResult<()>;
    async fn get(&self, database: &str, collection: &str, id: &str) -> StoreResult<Option<Point>>;
    async fn delete_points(&self, database: &str, collection: &str, ids: &[String]) -> StoreResult<()>;
    async fn search(
        &self,
        database: &str,
        collection: &str,
        params: SearchParams,
    ) -> StoreResult<Vec<ScoredPoint>>;
    async fn scroll(
        &self,
        database: &str,
        collection: &str,
        params: ScrollParams,
    ) -> StoreResult<ScrollPage>;

    /// Does this backend support payload-only scroll filtering without a query vector?
    fn supports_filterless_scroll(&self) -> bool {
        true
    }

    /// Static description of what this backend supports, so callers can branch on it
    /// instead of probing behavior at call time.
    fn capabilities(&self) -> BackendCapabilities;

    async fn health(&self) -> HealthStatus;
    async fn close(&self) -> StoreResult<()>;
}
