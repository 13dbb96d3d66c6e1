//! `curator serve`: Start the HTTP API server.

use curator_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.server.port = port;
    }

    println!("Curator Gateway");
    println!("   Listening: {}:{}", config.server.host, config.server.port);
    if config.community_id.is_empty() {
        println!("   Community: (unscoped)");
    } else {
        println!("   Community: {}", config.community_id);
    }
    println!("   Backend:   {} ({})", config.generation.backend, config.generation.model);

    curator_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("Gateway failed: {e}"))
}
