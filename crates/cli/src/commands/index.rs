//! `curator index`: Build the document index and report what it holds.

use anyhow::Context;
use curator_config::AppConfig;
use curator_core::provider::Embedder;
use curator_index::DocumentIndex;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let embedder = curator_providers::build_embedder(&config)?;
    let dir = config.corpus.resolve_dir(&config.community_id);
    let index = DocumentIndex::build(embedder.clone(), &dir)
        .await
        .with_context(|| format!("Failed to index {}", dir.display()))?;

    println!("Corpus:     {}", dir.display());
    println!("Embedder:   {} ({} dims)", embedder.name(), index.dimension());
    println!("Documents:  {}", index.len());
    for doc in index.documents() {
        println!("   - {} ({} bytes)", doc.id, doc.text.len());
    }
    if index.is_empty() {
        println!("\nNo .md or .txt files found; answers will have empty context.");
    }
    Ok(())
}
