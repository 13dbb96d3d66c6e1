//! `curator tools`: List tools from the configured provider.

use curator_config::AppConfig;
use curator_core::tool::ToolProvider;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let Some(client) = curator_tools::connect_from_config(&config.tools).await? else {
        println!("No tool provider configured (set tools.command or CURATOR_TOOL_COMMAND).");
        return Ok(());
    };

    let listed = client.list_tools().await;
    client.shutdown().await;
    let tools = listed?;

    println!("Provider: {}", client.name());
    if tools.is_empty() {
        println!("   (no tools offered)");
    }
    for tool in &tools {
        println!("   - {}: {}", tool.name, tool.description);
    }
    Ok(())
}
