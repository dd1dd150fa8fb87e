// src/embeddings/openai.rs
// OpenAI-compatible HTTP embedder, grounded on crates/mira-server/src/embeddings/openai.rs:
// same truncation/batch/retry constants, adapted to the dimension set this system names
// (384/768/1024/1536) instead of the teacher's 1536/3072 OpenAI-only table.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Embedder;

const MAX_TEXT_CHARS: usize = 8000;
const MAX_BATCH_SIZE: usize = 100;
const TIMEOUT_SECS: u64 = 30;
const RETRY_ATTEMPTS: usize = 2;
const API_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIM: usize = 1536;

pub struct OpenAiEmbedder {
    api_key: String,
    model: String,
    dim: usize,
    http: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let dim = dim_for_model(&model);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            model,
            dim,
            http,
        }
    }

    async fn call(&self, inputs: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct Request {
            input: Vec<String>,
            model: String,
        }
        #[derive(Deserialize)]
        struct EmbeddingItem {
            embedding: Vec<f32>,
            index: usize,
        }
        #[derive(Deserialize)]
        struct Response {
            data: Vec<EmbeddingItem>,
        }

        let mut last_err = None;
        for attempt in 0..=RETRY_ATTEMPTS {
            let resp = self
                .http
                .post(API_URL)
                .bearer_auth(&self.api_key)
                .json(&Request {
                    input: inputs.clone(),
                    model: self.model.clone(),
                })
                .send()
                .await;

            match resp {
                Ok(r) if r.status().is_success() => {
                    let mut parsed: Response = r.json().await?;
                    parsed.data.sort_by_key(|d| d.index);
                    return Ok(parsed.data.into_iter().map(|d| d.embedding).collect());
                }
                Ok(r) => {
                    last_err = Some(anyhow::anyhow!("openai embeddings returned {}", r.status()));
                }
                Err(e) => {
                    last_err = Some(anyhow::Error::from(e));
                }
            }
            if attempt < RETRY_ATTEMPTS {
                debug!(attempt, "retrying openai embeddings call");
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("openai embeddings call failed")))
    }
}

fn truncate(text: &str) -> &str {
    if text.len() > MAX_TEXT_CHARS {
        &text[..MAX_TEXT_CHARS]
    } else {
        text
    }
}

fn dim_for_model(model: &str) -> usize {
    match model {
        "text-embedding-3-small" => 1536,
        "text-embedding-3-large" => 3072,
        "text-embedding-ada-002" => 1536,
        _ => DEFAULT_DIM,
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let truncated = truncate(text).to_string();
        let mut results = self.call(vec![truncated]).await?;
        results
            .pop()
            .ok_or_else(|| anyhow::anyhow!("openai embeddings returned no vectors"))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH_SIZE) {
            let truncated: Vec<String> = chunk.iter().map(|t| truncate(t).to_string()).collect();
            all.extend(self.call(truncated).await?);
        }
        Ok(all)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_max_chars() {
        let long_text = "a".repeat(MAX_TEXT_CHARS + 500);
        assert_eq!(truncate(&long_text).len(), MAX_TEXT_CHARS);
    }

    #[test]
    fn dim_for_known_models() {
        assert_eq!(dim_for_model("text-embedding-3-small"), 1536);
        assert_eq!(dim_for_model("text-embedding-3-large"), 3072);
    }

    #[test]
    fn dim_for_unknown_model_falls_back() {
        assert_eq!(dim_for_model("some-future-model"), DEFAULT_DIM);
    }
}
