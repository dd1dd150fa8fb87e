// src/embeddings/mod.rs
// Embedding provider abstraction, grounded on crates/mira-server/src/embeddings/mod.rs's
// `EmbeddingClient` backend-enum pattern and llm/provider.rs's `LlmClient` trait shape.

pub mod hash;
pub mod openai;

use async_trait::async_trait;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dim(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Backend-specific embedder selection, mirroring the teacher's `EmbeddingClient` enum that
/// picks a provider by priority at construction time rather than at every call site.
pub enum EmbedderBackend {
    Hash(hash::HashEmbedder),
    OpenAi(openai::OpenAiEmbedder),
}

#[async_trait]
impl Embedder for EmbedderBackend {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        match self {
            Self::Hash(e) => e.embed(text).await,
            Self::OpenAi(e) => e.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        match self {
            Self::Hash(e) => e.embed_batch(texts).await,
            Self::OpenAi(e) => e.embed_batch(texts).await,
        }
    }

    fn dim(&self) -> usize {
        match self {
            Self::Hash(e) => e.dim(),
            Self::OpenAi(e) => e.dim(),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            Self::Hash(e) => e.model_name(),
            Self::OpenAi(e) => e.model_name(),
        }
    }
}

impl EmbedderBackend {
    pub fn from_config(cfg: &crate::config::EnvConfig) -> Self {
        match cfg.embedder {
            crate::config::EmbedderChoice::OpenAi if cfg.openai_api_key.is_some() => {
                Self::OpenAi(openai::OpenAiEmbedder::new(
                    cfg.openai_api_key.clone().unwrap(),
                    cfg.embedding_model.clone(),
                ))
            }
            _ => Self::Hash(hash::HashEmbedder::default()),
        }
    }
}
