//! Deterministic feature-hashing embedder.
//!
//! Needs no model and no network: each lowercase alphanumeric token is hashed
//! with SHA-256 into one of `dimensions` buckets with a ±1 sign, and the
//! resulting bag-of-words vector is L2-normalized. Texts sharing vocabulary
//! end up close in L2 distance, which is enough for small curated corpora and
//! for tests.

use async_trait::async_trait;
use curator_core::error::ProviderError;
use curator_core::provider::Embedder;
use sha2::{Digest, Sha256};

pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed one text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];

        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed(
        &self,
        inputs: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        Ok(inputs.iter().map(|t| self.embed_text(t)).collect())
    }
}
