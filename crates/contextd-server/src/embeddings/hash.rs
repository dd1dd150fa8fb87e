// src/embeddings/hash.rs
// Deterministic local fallback embedder (CONTEXTD_EMBEDDER=hash, the default).
//
// Hashes overlapping word shingles into a fixed-dimension bag-of-features vector and
// L2-normalizes it, giving stable cosine similarity for tests and offline operation without
// a network round trip. Not semantically meaningful beyond lexical overlap.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::Embedder;

pub const DIM: usize = 384;

pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dim: DIM }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vector = vec![0f32; self.dim];
        let normalized = text.to_lowercase();
        let tokens: Vec<&str> = normalized.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(vector);
        }
        for window in tokens.windows(2.min(tokens.len()).max(1)) {
            let shingle = window.join(" ");
            let mut hasher = Sha256::new();
            hasher.update(shingle.as_bytes());
            let digest = hasher.finalize();
            let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
                % self.dim;
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "hash-shingle-v1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_is_deterministic() {
        let e = HashEmbedder::default();
        let a = e.embed("connection refused on port 5432").await.unwrap();
        let b = e.embed("connection refused on port 5432").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embed_produces_unit_vector() {
        let e = HashEmbedder::default();
        let v = e.embed("some error message here").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3 || norm == 0.0);
    }

    #[tokio::test]
    async fn empty_text_yields_zero_vector() {
        let e = HashEmbedder::default();
        let v = e.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn dim_matches_declared_constant() {
        let e = HashEmbedder::default();
        assert_eq!(e.dim(), DIM);
        assert_eq!(e.embed("x").await.unwrap().len(), DIM);
    }
}
