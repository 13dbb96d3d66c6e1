//! Process-wide application context.
//!
//! Everything a request needs is built once at startup and shared through
//! `Arc<AppContext>`: the index handle, the queued generator, the tool
//! client and the ledger dispatcher, all wired into one [`ChatService`].

use curator_agent::{ChatService, PromptAssembler};
use curator_config::AppConfig;
use curator_core::error::{IndexError, ProviderError, ToolError};
use curator_index::IndexHandle;
use curator_ledger::{LedgerDispatcher, LedgerError};
use curator_security::RequestGate;
use curator_tools::McpClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A startup step failed; the process should not serve.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to load generation backend: {0}")]
    Generation(#[source] ProviderError),

    #[error("Failed to set up embedding backend: {0}")]
    Embedding(#[source] ProviderError),

    #[error("Failed to build document index: {0}")]
    Index(#[from] IndexError),

    #[error("Failed to start tool provider: {0}")]
    Tools(#[from] ToolError),

    #[error("Failed to set up ledger: {0}")]
    Ledger(#[from] LedgerError),
}

pub struct AppContext {
    pub config: AppConfig,
    pub service: ChatService,
    mcp: Option<Arc<McpClient>>,
}

impl AppContext {
    /// Build every subsystem from configuration.
    ///
    /// The corpus comes from `corpus.data_dir/community-{id}` when a
    /// community is configured, else `corpus.data_dir`.
    pub async fn from_config(config: AppConfig) -> Result<Self, StartupError> {
        let embedder =
            curator_providers::build_embedder(&config).map_err(StartupError::Embedding)?;
        let corpus_dir = config.corpus.resolve_dir(&config.community_id);
        let index = Arc::new(IndexHandle::open(embedder, corpus_dir).await?);

        let generator = curator_providers::build_generator(&config)
            .await
            .map_err(StartupError::Generation)?;

        let mcp = curator_tools::connect_from_config(&config.tools).await?;
        let ledger = Arc::new(LedgerDispatcher::from_config(&config.ledger)?);

        let mut service = ChatService::new(generator, index)
            .with_gate(RequestGate::from_config(&config))
            .with_assembler(PromptAssembler::new(config.generation.system_prompt.as_str()))
            .with_ledger(ledger)
            .with_top_k(config.corpus.top_k)
            .with_generation_timeout(Duration::from_secs(config.generation.timeout_secs))
            .with_tool_timeout(Duration::from_secs(config.tools.timeout_secs));
        if let Some(client) = &mcp {
            service = service.with_tools(client.clone());
        }

        let context = Self {
            config,
            service,
            mcp,
        };
        info!(
            community = %context.config.community_id,
            docs = context.docs_indexed(),
            tools = context.service.tool_provider_connected(),
            ledger = context.service.ledger().is_enabled(),
            "Application context ready"
        );
        Ok(context)
    }

    /// Assemble a context from an already-built service.
    pub fn new(config: AppConfig, service: ChatService) -> Self {
        Self {
            config,
            service,
            mcp: None,
        }
    }

    pub fn docs_indexed(&self) -> usize {
        self.service.index().snapshot().len()
    }

    pub fn tool_provider_connected(&self) -> bool {
        self.service.tool_provider_connected()
    }

    /// Drain queued ledger commits and stop the tool server.
    pub async fn shutdown(&self) {
        self.service.ledger().shutdown().await;
        if let Some(client) = &self.mcp {
            client.shutdown().await;
        }
        info!("Application context shut down");
    }
}
