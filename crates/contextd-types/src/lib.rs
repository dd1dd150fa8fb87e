// crates/contextd-types/src/lib.rs

//! Shared data contracts between the contextd server and its tool/HTTP callers.
//!
//! This crate holds only the domain model: the entities of the data model (checkpoints,
//! remediations, reasoning memories, sessions) and the request/response envelopes of the
//! MCP tool surface. It carries no backend-specific logic so it can be depended on by
//! future client code without pulling in the vector-store or embedder stacks.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Checkpoint
// ============================================================================

/// A point-in-time summary of in-progress session work, scoped to a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Checkpoint {
    pub id: Uuid,
    /// Absolute, normalized filesystem path to the project root.
    pub project_path: String,
    /// Deterministic hash of `project_path`; never crosses projects in a query.
    pub project_hash: String,
    /// Human-written summary, 1..=500 chars.
    pub summary: String,
    /// Free-form content, bounded to 100 KB.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Empty string when branch auto-detection found nothing (never `None` on the wire).
    #[serde(default)]
    pub branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Remediation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Derived, deterministic view of a `Remediation` used for matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorSignature {
    pub normalized_error: String,
    pub error_type: String,
    pub stack_signature: String,
    pub hash: String,
}

/// A stored error -> fix pairing, shared globally across projects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Remediation {
    pub id: Uuid,
    pub error_message: String,
    pub error_type: String,
    pub solution: String,
    pub project_path: Option<String>,
    #[serde(default)]
    pub context: HashMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub severity: Option<Severity>,
    pub stack_trace: Option<String>,
    /// Unix seconds.
    pub timestamp: i64,
    pub signature: ErrorSignature,
}

// ============================================================================
// Reasoning memory
// ============================================================================

/// A distilled lesson with a confidence score, scoped per project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Memory {
    pub id: Uuid,
    pub project_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Bounded to [0, 1].
    pub confidence: f32,
    #[serde(default)]
    pub source_session_ids: Vec<String>,
    #[serde(default)]
    pub supersedes: Vec<Uuid>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Database scope
// ============================================================================

/// Logical namespace an entity lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum DatabaseScope {
    Shared,
    Project(String),
    User(String),
}

// ============================================================================
// Session
// ============================================================================

/// Transient tracking record owned exclusively by the session manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SessionRecord {
    pub session_id: String,
    pub project_id: String,
    pub tokens_used: u64,
    pub usage_percent: f32,
    pub threshold_70_hit: bool,
    pub threshold_90_hit: bool,
    pub checkpoint_count: u32,
    pub tokens_saved: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Outcome of a completed coding session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    Partial,
}

impl Outcome {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }
}

// ============================================================================
// Wire envelopes for the tool surface
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointSaveRequest {
    pub project_path: String,
    pub summary: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointSaveResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointSearchRequest {
    pub project_path: String,
    pub query: String,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub min_score: Option<f32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScoredCheckpoint {
    pub checkpoint: Checkpoint,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointSearchResponse {
    pub results: Vec<ScoredCheckpoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointListRequest {
    pub project_path: String,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointListResponse {
    pub checkpoints: Vec<Checkpoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RemediationSaveRequest {
    pub error_message: String,
    pub error_type: String,
    pub solution: String,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub context: HashMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub stack_trace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RemediationSaveResponse {
    pub id: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RemediationSearchRequest {
    pub error_message: String,
    #[serde(default)]
    pub stack_trace: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub min_score: Option<f32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MatchBreakdown {
    pub semantic: f32,
    pub string: f32,
    pub hybrid: f32,
    pub type_match: bool,
    pub stack_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScoredRemediation {
    pub remediation: Remediation,
    #[serde(rename = "match")]
    pub match_: MatchBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RemediationSearchResponse {
    pub results: Vec<ScoredRemediation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MemoryConsolidateRequest {
    pub project_id: String,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub max_clusters: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MemoryConsolidateResponse {
    pub created_memories: Vec<Memory>,
    pub archived_memories: Vec<Uuid>,
    pub skipped_count: u32,
    pub total_processed: u32,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SessionStartRequest {
    pub project_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionStartResponse {
    pub checkpoint: Option<Checkpoint>,
    pub memories: Vec<Memory>,
    pub resumed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContextThresholdRequest {
    pub project_id: String,
    pub session_id: String,
    pub percent: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContextThresholdResponse {
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SessionEndRequest {
    pub project_id: String,
    pub session_id: String,
    pub task: String,
    pub approach: String,
    pub outcome: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionEndResponse {
    pub memories_created: Vec<Memory>,
    pub message: String,
}

// ============================================================================
// Error envelope
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    Conflict,
    TimeoutError,
    InternalError,
}

impl ErrorCode {
    /// HTTP status this error code maps to on the REST surface.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationError => 400,
            Self::NotFound => 404,
            Self::TimeoutError => 408,
            Self::Conflict => 409,
            Self::InternalError => 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parse_roundtrip() {
        assert_eq!(Severity::parse("High"), Some(Severity::High));
        assert_eq!(Severity::parse("bogus"), None);
    }

    #[test]
    fn outcome_parse_rejects_unknown() {
        assert_eq!(Outcome::parse("success"), Some(Outcome::Success));
        assert_eq!(Outcome::parse("cancelled"), None);
    }

    #[test]
    fn error_code_http_status_mapping() {
        assert_eq!(ErrorCode::ValidationError.http_status(), 400);
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
        assert_eq!(ErrorCode::TimeoutError.http_status(), 408);
        assert_eq!(ErrorCode::Conflict.http_status(), 409);
        assert_eq!(ErrorCode::InternalError.http_status(), 500);
    }

    #[test]
    fn error_envelope_serializes_code_as_screaming_snake() {
        let env = ErrorEnvelope {
            code: ErrorCode::ValidationError,
            message: "summary is required".to_string(),
            details: None,
        };
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"VALIDATION_ERROR\""));
    }
}
