//! `curator ask`: One question through the full pipeline.

use curator_config::AppConfig;
use curator_core::message::{ChatMessage, ChatRequest};
use curator_gateway::AppContext;

pub async fn run(
    config: AppConfig,
    question: String,
    community: Option<String>,
) -> anyhow::Result<()> {
    let context = AppContext::from_config(config).await?;

    let mut request = ChatRequest::new(vec![ChatMessage::user(question)]);
    if let Some(community) = community {
        request = request.with_community(community);
    }

    let result = context.service.chat(&request).await;
    context.shutdown().await;

    let response = result?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
