//! Error types for the Curator domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for Curator operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generation / embedding backends ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool provider ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Document index ---
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Generation queue closed")]
    QueueClosed,
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool provider not connected: {0}")]
    NotConnected(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to read corpus at {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Embedding dimension mismatch for {id}: expected {expected}, got {found}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        found: usize,
    },

    #[error("Embedder returned {found} vectors for {expected} documents")]
    CountMismatch { expected: usize, found: usize },
}
