//! Tool providers for Curator.
//!
//! The agent consumes tools through `curator_core::ToolProvider`. The
//! production provider is an MCP server started as a child process; the
//! in-process `curator_core::ToolRegistry` covers embedded tools and tests.

pub mod mcp;

pub use mcp::McpClient;

use curator_config::ToolsConfig;
use curator_core::error::ToolError;
use std::sync::Arc;
use tracing::{info, warn};

/// Start the configured tool provider, if any.
///
/// Returns `Ok(None)` when no command is configured, or when the provider
/// fails to start and `tools.optional` is set.
pub async fn connect_from_config(config: &ToolsConfig) -> Result<Option<Arc<McpClient>>, ToolError> {
    let Some(command) = config.command.as_deref().filter(|c| !c.trim().is_empty()) else {
        info!("No tool provider configured");
        return Ok(None);
    };

    match McpClient::spawn(command, &config.args).await {
        Ok(client) => Ok(Some(Arc::new(client))),
        Err(e) if config.optional => {
            warn!(command, error = %e, "Tool provider unavailable; continuing without tools");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
