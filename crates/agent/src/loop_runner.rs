//! The tool invocation loop.
//!
//! ```text
//! GENERATING ──no token / no provider──▶ DONE
//!     │
//!     └─token──▶ AWAITING_TOOL ──▶ EXECUTING_TOOL ──▶ RE_GENERATING ──▶ DONE
//! ```
//!
//! At most two generations and one tool call per run. There are no retries
//! and no cycles: the second generation's output is final even if it holds
//! another tool token.

use curator_core::error::{ProviderError, ToolError};
use curator_core::provider::Generator;
use curator_core::tool::{ToolCall, ToolProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::prompt::PromptAssembler;
use crate::tool_call::{ParsedTurn, parse_turn};

const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Generating,
    AwaitingTool,
    ExecutingTool,
    ReGenerating,
    Done,
}

impl LoopState {
    fn as_str(self) -> &'static str {
        match self {
            LoopState::Generating => "GENERATING",
            LoopState::AwaitingTool => "AWAITING_TOOL",
            LoopState::ExecutingTool => "EXECUTING_TOOL",
            LoopState::ReGenerating => "RE_GENERATING",
            LoopState::Done => "DONE",
        }
    }
}

fn transition(from: LoopState, to: LoopState) -> LoopState {
    debug!(from = from.as_str(), to = to.as_str(), "Loop transition");
    to
}

/// The single tool round trip of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExchange {
    pub call: ToolCall,
    /// Text fed back to the model in the tool turn
    pub output: String,
    /// Whether `output` describes a failure rather than a result
    pub is_error: bool,
}

/// Result of one run of the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Final answer, trimmed
    pub answer: String,
    /// Generation calls made (1 or 2)
    pub generations: u32,
    /// Tool provider calls made (0 or 1)
    pub tool_invocations: u32,
    pub tool: Option<ToolExchange>,
}

/// Drives generation and the optional single tool call for one request.
pub struct ToolInvocationLoop {
    generator: Arc<dyn Generator>,
    tools: Option<Arc<dyn ToolProvider>>,
    assembler: PromptAssembler,
    generation_timeout: Duration,
    tool_timeout: Duration,
}

impl ToolInvocationLoop {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            tools: None,
            assembler: PromptAssembler::default(),
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Attach a tool provider.
    pub fn with_tools(mut self, tools: Arc<dyn ToolProvider>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the assembler used to build the follow-up prompt.
    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    pub fn tools(&self) -> Option<&Arc<dyn ToolProvider>> {
        self.tools.as_ref()
    }

    /// The provider, if one is attached and still connected.
    pub fn connected_tools(&self) -> Option<&Arc<dyn ToolProvider>> {
        self.tools.as_ref().filter(|t| t.is_connected())
    }

    /// Run the loop on an assembled prompt.
    ///
    /// Only generation failures are errors. Tool failures of any kind become
    /// the text of the tool turn.
    pub async fn run(&self, prompt: &str) -> Result<LoopOutcome, ProviderError> {
        let mut state = LoopState::Generating;
        let first = self.generate(prompt).await?;

        let call = match parse_turn(&first) {
            ParsedTurn::PlainAnswer(text) => {
                transition(state, LoopState::Done);
                return Ok(LoopOutcome {
                    answer: text.trim().to_string(),
                    generations: 1,
                    tool_invocations: 0,
                    tool: None,
                });
            }
            ParsedTurn::ToolInvocation(call) => call,
        };

        let Some(tools) = self.connected_tools() else {
            debug!(tool = %call.name, "Tool token present but no provider connected");
            transition(state, LoopState::Done);
            return Ok(LoopOutcome {
                answer: first.trim().to_string(),
                generations: 1,
                tool_invocations: 0,
                tool: None,
            });
        };

        state = transition(state, LoopState::AwaitingTool);
        state = transition(state, LoopState::ExecutingTool);
        let (exchange, invoked) = self.execute(tools.as_ref(), call).await;

        state = transition(state, LoopState::ReGenerating);
        let follow_up = self.assembler.follow_up(prompt, &first, &exchange.output);
        let second = self.generate(&follow_up).await?;
        transition(state, LoopState::Done);

        Ok(LoopOutcome {
            answer: second.trim().to_string(),
            generations: 2,
            tool_invocations: u32::from(invoked),
            tool: Some(exchange),
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        match tokio::time::timeout(self.generation_timeout, self.generator.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    generator = %self.generator.name(),
                    timeout_secs = self.generation_timeout.as_secs(),
                    "Generation timed out"
                );
                Err(ProviderError::Timeout(self.generation_timeout.as_secs()))
            }
        }
    }

    /// Run one tool call. The flag reports whether the provider was called.
    async fn execute(&self, tools: &dyn ToolProvider, call: ToolCall) -> (ToolExchange, bool) {
        let arguments = match call.parse_arguments() {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Unparseable tool arguments");
                let output = format!("Error: {e}");
                return (
                    ToolExchange {
                        call,
                        output,
                        is_error: true,
                    },
                    false,
                );
            }
        };

        let result =
            match tokio::time::timeout(self.tool_timeout, tools.call_tool(&call.name, arguments))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: self.tool_timeout.as_secs(),
                }),
            };

        let (output, is_error) = match result {
            Ok(output) => {
                info!(tool = %call.name, is_error = output.is_error, "Tool call completed");
                (output.content, output.is_error)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                (format!("Error: {e}"), true)
            }
        };

        (
            ToolExchange {
                call,
                output,
                is_error,
            },
            true,
        )
    }
}
