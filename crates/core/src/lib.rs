//! # Curator Core
//!
//! Domain types, capability traits, and error definitions for the Curator
//! retrieval-augmented curation agent. This crate has **no framework
//! dependencies**: it defines the model every other crate implements against.
//!
//! The three external capabilities the agent consumes are traits here:
//! - [`Generator`]: `generate(prompt) -> text`
//! - [`Embedder`]: `embed(text) -> vector`
//! - [`ToolProvider`]: list and call named, JSON-argument tools

pub mod error;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, IndexError, ProviderError, Result, ToolError};
pub use message::{ChatMessage, ChatRequest, Role};
pub use provider::{Embedder, Generator};
pub use session::SessionRecord;
pub use tool::{Tool, ToolArguments, ToolCall, ToolDescriptor, ToolOutput, ToolProvider, ToolRegistry};
