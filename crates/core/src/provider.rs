//! Capability traits over the model backends.
//!
//! The agent consumes two opaque capabilities:
//! - a [`Generator`] that turns a fully assembled prompt into text
//! - an [`Embedder`] that turns text into fixed-dimension vectors
//!
//! Implementations: OpenAI-compatible HTTP endpoints, local GGUF inference,
//! a deterministic hashing embedder, and scripted mocks in tests.

use async_trait::async_trait;

use crate::error::ProviderError;

/// Text generation capability.
///
/// The prompt is already formatted (role tags, open assistant marker);
/// implementations must not re-template it.
#[async_trait]
pub trait Generator: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai_compat", "local").
    fn name(&self) -> &str;

    /// Generate the continuation of `prompt`.
    async fn generate(&self, prompt: &str) -> std::result::Result<String, ProviderError>;

    /// Health check: is the backend reachable and loaded?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

/// Text embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, inputs: &[String])
    -> std::result::Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: format!("Embedder '{}' returned no vector", self.name()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        fn name(&self) -> &str {
            "length"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(inputs.iter().map(|s| vec![s.len() as f32]).collect())
        }
    }

    struct EmptyEmbedder;

    #[async_trait]
    impl Embedder for EmptyEmbedder {
        fn name(&self) -> &str {
            "empty"
        }

        async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn embed_one_returns_single_vector() {
        let v = LengthEmbedder.embed_one("abcd").await.unwrap();
        assert_eq!(v, vec![4.0]);
    }

    #[tokio::test]
    async fn embed_one_errors_when_backend_returns_nothing() {
        let err = EmptyEmbedder.embed_one("abcd").await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
