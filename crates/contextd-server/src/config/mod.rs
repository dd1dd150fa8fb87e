// src/config/mod.rs
// Environment-based configuration — single source of truth for all env vars.
//
// Non-goal: CLI argument parsing and config-file discovery are out of scope; every
// recognized option is an env var, validated once at startup — unknown CONTEXTD_*
// keys are rejected, not silently ignored.

use std::collections::HashSet;

use tracing::{info, warn};

const RECOGNIZED_KEYS: &[&str] = &[
    "CONTEXTD_VECTOR_BACKEND_URL",
    "CONTEXTD_EMBEDDER",
    "OPENAI_API_KEY",
    "CONTEXTD_EMBEDDING_MODEL",
    "CONTEXTD_CHECKPOINT_MIN_SCORE",
    "CONTEXTD_REMEDIATION_MIN_SEMANTIC",
    "CONTEXTD_REMEDIATION_MIN_STRING",
    "CONTEXTD_REMEDIATION_MIN_HYBRID",
    "CONTEXTD_REMEDIATION_SEMANTIC_WEIGHT",
    "CONTEXTD_REMEDIATION_STRING_WEIGHT",
    "CONTEXTD_CONFIDENCE_ALPHA",
    "CONTEXTD_CONFIDENCE_BETA",
    "CONTEXTD_CONFIDENCE_ARCHIVE_FLOOR",
    "CONTEXTD_CONSOLIDATION_THRESHOLD",
    "CONTEXTD_CONSOLIDATION_MAX_CLUSTERS",
    "CONTEXTD_SESSION_TTL_SECONDS",
    "CONTEXTD_SESSION_REAP_INTERVAL_SECONDS",
    "CONTEXTD_MAX_INFLIGHT_PER_TOOL",
    "CONTEXTD_HTTP_ADDR",
    "CONTEXTD_LOG",
];

/// Remediation matcher thresholds and weights.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    pub semantic_weight: f32,
    pub string_weight: f32,
    pub min_semantic: f32,
    pub min_string: f32,
    pub min_hybrid: f32,
    pub type_fuzzy_distance: usize,
    pub stack_overlap_ratio: f32,
    pub type_boost: f32,
    pub stack_boost: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            string_weight: 0.3,
            min_semantic: 0.5,
            min_string: 0.3,
            min_hybrid: 0.6,
            // "ModuleNotFoundError" vs "ImportError" sits 13 edits apart; a fuzzy
            // threshold below that would never catch the Python import-error family.
            type_fuzzy_distance: 15,
            stack_overlap_ratio: 0.5,
            type_boost: 1.10,
            stack_boost: 1.15,
        }
    }
}

impl MatcherConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let cfg = Self {
            semantic_weight: read_f32("CONTEXTD_REMEDIATION_SEMANTIC_WEIGHT", defaults.semantic_weight),
            string_weight: read_f32("CONTEXTD_REMEDIATION_STRING_WEIGHT", defaults.string_weight),
            min_semantic: read_f32("CONTEXTD_REMEDIATION_MIN_SEMANTIC", defaults.min_semantic),
            min_string: read_f32("CONTEXTD_REMEDIATION_MIN_STRING", defaults.min_string),
            min_hybrid: read_f32("CONTEXTD_REMEDIATION_MIN_HYBRID", defaults.min_hybrid),
            ..defaults
        };
        let sum = cfg.semantic_weight + cfg.string_weight;
        if (sum - 1.0).abs() > 1e-3 {
            warn!(
                semantic = cfg.semantic_weight,
                string = cfg.string_weight,
                "matcher weights do not sum to 1.0, falling back to defaults"
            );
            return Self::default();
        }
        cfg
    }
}

/// Confidence-update coefficients for reasoning-memory feedback.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceConfig {
    pub alpha: f32,
    pub beta: f32,
    pub archive_floor: f32,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            beta: 0.2,
            archive_floor: 0.3,
        }
    }
}

impl ConfidenceConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            alpha: read_f32("CONTEXTD_CONFIDENCE_ALPHA", d.alpha),
            beta: read_f32("CONTEXTD_CONFIDENCE_BETA", d.beta),
            archive_floor: read_f32("CONTEXTD_CONFIDENCE_ARCHIVE_FLOOR", d.archive_floor),
        }
    }
}

/// Distillation (consolidation) defaults.
#[derive(Debug, Clone, Copy)]
pub struct ConsolidationConfig {
    pub similarity_threshold: f32,
    pub max_clusters_per_run: u32,
    pub sampling_cap: usize,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            max_clusters_per_run: 20,
            sampling_cap: 500,
        }
    }
}

impl ConsolidationConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            similarity_threshold: read_f32("CONTEXTD_CONSOLIDATION_THRESHOLD", d.similarity_threshold),
            max_clusters_per_run: read_u32("CONTEXTD_CONSOLIDATION_MAX_CLUSTERS", d.max_clusters_per_run),
            ..d
        }
    }
}

/// Session manager TTL/reap policy.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub ttl_seconds: u64,
    pub reap_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            reap_interval_seconds: 300,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            ttl_seconds: read_u64("CONTEXTD_SESSION_TTL_SECONDS", d.ttl_seconds),
            reap_interval_seconds: read_u64(
                "CONTEXTD_SESSION_REAP_INTERVAL_SECONDS",
                d.reap_interval_seconds,
            ),
        }
    }
}

/// Checkpoint search default.
pub fn checkpoint_min_score_default() -> f32 {
    read_f32("CONTEXTD_CHECKPOINT_MIN_SCORE", 0.7)
}

/// Global in-flight cap per tool.
pub fn max_inflight_per_tool() -> usize {
    read_u32("CONTEXTD_MAX_INFLIGHT_PER_TOOL", 64) as usize
}

/// Full environment configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub vector_backend_url: String,
    pub embedder: EmbedderChoice,
    pub openai_api_key: Option<String>,
    pub embedding_model: Option<String>,
    pub matcher: MatcherConfig,
    pub confidence: ConfidenceConfig,
    pub consolidation: ConsolidationConfig,
    pub session: SessionConfig,
    pub max_inflight_per_tool: usize,
    pub http_addr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderChoice {
    Hash,
    OpenAi,
}

impl EnvConfig {
    pub fn load() -> Self {
        warn_on_unrecognized_keys();

        let embedder = match std::env::var("CONTEXTD_EMBEDDER").ok().as_deref() {
            Some("openai") => EmbedderChoice::OpenAi,
            _ => EmbedderChoice::Hash,
        };

        let cfg = Self {
            vector_backend_url: std::env::var("CONTEXTD_VECTOR_BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:6334".to_string()),
            embedder,
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|s| !s.is_empty()),
            embedding_model: std::env::var("CONTEXTD_EMBEDDING_MODEL").ok(),
            matcher: MatcherConfig::from_env(),
            confidence: ConfidenceConfig::from_env(),
            consolidation: ConsolidationConfig::from_env(),
            session: SessionConfig::from_env(),
            max_inflight_per_tool: max_inflight_per_tool(),
            http_addr: std::env::var("CONTEXTD_HTTP_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8765".to_string()),
        };

        info!(
            backend = %cfg.vector_backend_url,
            embedder = ?cfg.embedder,
            "loaded environment configuration"
        );
        cfg
    }
}

fn warn_on_unrecognized_keys() {
    let recognized: HashSet<&str> = RECOGNIZED_KEYS.iter().copied().collect();
    for (key, _) in std::env::vars() {
        if key.starts_with("CONTEXTD_") && !recognized.contains(key.as_str()) {
            warn!(key = %key, "unrecognized CONTEXTD_* environment variable, ignoring");
        }
    }
}

fn read_f32(name: &str, default: f32) -> f32 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn read_u32(name: &str, default: u32) -> u32 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn read_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matcher_config_default_sums_to_one() {
        let cfg = MatcherConfig::default();
        assert!((cfg.semantic_weight + cfg.string_weight - 1.0).abs() < 1e-6);
    }

    #[test]
    fn confidence_config_defaults_match_spec() {
        let cfg = ConfidenceConfig::default();
        assert_eq!(cfg.alpha, 0.1);
        assert_eq!(cfg.beta, 0.2);
        assert_eq!(cfg.archive_floor, 0.3);
    }

    #[test]
    fn consolidation_config_default_threshold() {
        assert_eq!(ConsolidationConfig::default().similarity_threshold, 0.8);
    }
}
