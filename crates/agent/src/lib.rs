//! The Curator agent.
//!
//! Turns a chat request into an answer:
//!
//! 1. **Gate** the request on its community scope
//! 2. **Retrieve** context from the document index
//! 3. **Assemble** a Phi-3 prompt with context, tool catalog and history
//! 4. **Generate**, and if the output is a tool token, call the tool once
//!    and generate again with the result
//! 5. **Fingerprint** query and answer and hand them to the ledger

pub mod loop_runner;
pub mod prompt;
pub mod service;
pub mod tool_call;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use loop_runner::{LoopOutcome, ToolExchange, ToolInvocationLoop};
pub use prompt::PromptAssembler;
pub use service::{ChatError, ChatResponse, ChatService, ChatTurn};
pub use tool_call::{ParsedTurn, parse_turn};
