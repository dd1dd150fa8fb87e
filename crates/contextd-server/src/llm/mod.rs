// src/llm/mod.rs
// Memory-consolidation LLM contract, grounded on the `LlmClient` trait shape in
// crates/mira-server/src/llm/provider.rs — a small async trait any provider can implement,
// plus a no-network heuristic default so distillation works offline and in tests.

use async_trait::async_trait;

/// Consolidated output for a cluster of similar reasoning-memory texts.
#[derive(Debug, Clone, PartialEq)]
pub struct Distillation {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait LlmDistiller: Send + Sync {
    async fn consolidate(&self, cluster_texts: &[String]) -> anyhow::Result<Distillation>;
}

/// No-network distiller: picks the longest member as the canonical content (most detail
/// survives), synthesizes a title from its first sentence, and unions source tags. Used
/// whenever no LLM provider is configured — consolidation must still work offline.
#[derive(Default)]
pub struct HeuristicDistiller;

#[async_trait]
impl LlmDistiller for HeuristicDistiller {
    async fn consolidate(&self, cluster_texts: &[String]) -> anyhow::Result<Distillation> {
        if cluster_texts.is_empty() {
            anyhow::bail!("cannot consolidate an empty cluster");
        }
        let canonical = cluster_texts
            .iter()
            .max_by_key(|t| t.len())
            .cloned()
            .unwrap_or_default();
        let title = canonical
            .split(['.', '\n'])
            .next()
            .unwrap_or(&canonical)
            .trim()
            .chars()
            .take(80)
            .collect::<String>();
        Ok(Distillation {
            title: if title.is_empty() { "Consolidated memory".to_string() } else { title },
            content: canonical,
            tags: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn heuristic_picks_longest_member_as_content() {
        let d = HeuristicDistiller::default();
        let result = d
            .consolidate(&["short".to_string(), "a much longer and more detailed memory entry".to_string()])
            .await
            .unwrap();
        assert_eq!(result.content, "a much longer and more detailed memory entry");
    }

    #[tokio::test]
    async fn heuristic_rejects_empty_cluster() {
        let d = HeuristicDistiller::default();
        assert!(d.consolidate(&[]).await.is_err());
    }

    #[tokio::test]
    async fn heuristic_title_is_first_sentence_truncated() {
        let d = HeuristicDistiller::default();
        let result = d
            .consolidate(&["Always validate input at the boundary. Details follow here.".to_string()])
            .await
            .unwrap();
        assert_eq!(result.title, "Always validate input at the boundary");
    }
}
