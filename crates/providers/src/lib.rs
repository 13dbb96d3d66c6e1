//! Generation and embedding backends for Curator.
//!
//! All backends implement the `curator_core::Generator` or
//! `curator_core::Embedder` traits. [`build_generator`] and [`build_embedder`]
//! select the backend named in configuration.

pub mod hashing;
#[cfg(feature = "local")]
pub mod local;
pub mod openai_compat;
pub mod queue;
pub mod text;

pub use hashing::HashingEmbedder;
#[cfg(feature = "local")]
pub use local::LocalGenerator;
pub use openai_compat::{OpenAiCompatEmbedder, OpenAiCompatGenerator};
pub use queue::QueuedGenerator;

use curator_config::AppConfig;
use curator_core::error::ProviderError;
use curator_core::provider::{Embedder, Generator};
use std::sync::Arc;
use tracing::info;

/// Build the process-wide generator behind a single-worker queue.
///
/// The local backend is loaded eagerly so a missing model fails startup.
pub async fn build_generator(config: &AppConfig) -> Result<Arc<dyn Generator>, ProviderError> {
    let gen_config = &config.generation;

    let backend: Arc<dyn Generator> = match gen_config.backend.as_str() {
        "openai_compat" => Arc::new(
            OpenAiCompatGenerator::new(
                &gen_config.base_url,
                &gen_config.model,
                gen_config.timeout_secs,
            )?
            .with_api_key(gen_config.api_key.clone())
            .with_sampling(gen_config.max_tokens, gen_config.temperature),
        ),
        "local" => build_local(config).await?,
        other => {
            return Err(ProviderError::NotConfigured(format!(
                "Unknown generation backend '{other}' (expected openai_compat or local)"
            )));
        }
    };

    info!(
        backend = backend.name(),
        model = %gen_config.model,
        queue_capacity = gen_config.queue_capacity,
        "Generation backend ready"
    );

    Ok(Arc::new(QueuedGenerator::new(
        backend,
        gen_config.queue_capacity,
    )))
}

#[cfg(feature = "local")]
async fn build_local(config: &AppConfig) -> Result<Arc<dyn Generator>, ProviderError> {
    let model = config.generation.model.clone();
    let (max_tokens, temperature) = (config.generation.max_tokens, config.generation.temperature);
    let generator = tokio::task::spawn_blocking(move || LocalGenerator::load(&model))
        .await
        .map_err(|e| ProviderError::NotConfigured(format!("Model loading task failed: {e}")))??;
    Ok(Arc::new(generator.with_sampling(max_tokens, temperature)))
}

#[cfg(not(feature = "local"))]
async fn build_local(_config: &AppConfig) -> Result<Arc<dyn Generator>, ProviderError> {
    Err(ProviderError::NotConfigured(
        "Local generation requires building with the `local` feature".into(),
    ))
}

/// Build the embedder used for indexing and queries.
pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>, ProviderError> {
    let emb_config = &config.embedding;

    match emb_config.backend.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedder::new(emb_config.dimensions))),
        "openai_compat" => {
            let base_url = emb_config
                .base_url
                .clone()
                .unwrap_or_else(|| config.generation.base_url.clone());
            Ok(Arc::new(
                OpenAiCompatEmbedder::new(
                    base_url,
                    &emb_config.model,
                    config.generation.timeout_secs,
                )?
                .with_api_key(config.generation.api_key.clone()),
            ))
        }
        other => Err(ProviderError::NotConfigured(format!(
            "Unknown embedding backend '{other}' (expected hashing or openai_compat)"
        ))),
    }
}
