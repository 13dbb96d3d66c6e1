//! Prompt assembly in the Phi-3 instruct format.
//!
//! Layout:
//!
//! ```text
//! <|system|>
//! {system instruction}
//! <context>
//! {retrieved documents}
//! </context>
//! Available tools:            ┐ only when at least
//! - {name}: {description}     │ one tool is offered
//! {invocation syntax}         ┘
//! <|end|>
//! <|{role}|>
//! {content}<|end|>             one per history message, in order
//! <|assistant|>
//! ```
//!
//! The prompt always ends with an open assistant turn.

use curator_core::message::ChatMessage;
use curator_core::tool::ToolDescriptor;

pub const END: &str = "<|end|>";
pub const OPEN_ASSISTANT: &str = "<|assistant|>\n";
pub const CONTEXT_OPEN: &str = "<context>";
pub const CONTEXT_CLOSE: &str = "</context>";

/// Instruction appended to the tool catalog.
pub const TOOL_SYNTAX_INSTRUCTION: &str = "To call a tool, reply with exactly one token of the form \
[TOOL:<name>|<json-object>] and nothing else.";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful curation assistant. Use the Context to answer.";

/// Builds generation prompts from context, tools, and history.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    system_instruction: String,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_INSTRUCTION)
    }
}

impl PromptAssembler {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// The first-round prompt.
    ///
    /// `context` is inserted verbatim between the context delimiters; role
    /// strings are rendered as given, including ones outside the known set.
    pub fn assemble(
        &self,
        context: &str,
        tools: &[ToolDescriptor],
        messages: &[ChatMessage],
    ) -> String {
        let mut prompt = String::with_capacity(
            self.system_instruction.len()
                + context.len()
                + messages.iter().map(|m| m.content.len() + 16).sum::<usize>()
                + 128,
        );

        prompt.push_str("<|system|>\n");
        prompt.push_str(&self.system_instruction);
        prompt.push('\n');
        prompt.push_str(CONTEXT_OPEN);
        prompt.push('\n');
        prompt.push_str(context);
        prompt.push('\n');
        prompt.push_str(CONTEXT_CLOSE);

        if !tools.is_empty() {
            prompt.push('\n');
            prompt.push_str(&render_tool_catalog(tools));
        }
        prompt.push_str(END);
        prompt.push('\n');

        for message in messages {
            push_turn(&mut prompt, message.role.as_str(), &message.content);
        }

        prompt.push_str(OPEN_ASSISTANT);
        prompt
    }

    /// The second-round prompt: the first prompt, the first answer closed as
    /// an assistant turn, a tool turn carrying `tool_output`, and a fresh open
    /// assistant marker.
    pub fn follow_up(&self, prompt: &str, first_answer: &str, tool_output: &str) -> String {
        let mut next = String::with_capacity(prompt.len() + first_answer.len() + tool_output.len() + 32);
        next.push_str(prompt);
        next.push_str(first_answer.trim());
        next.push_str(END);
        next.push('\n');
        push_turn(&mut next, "tool", tool_output);
        next.push_str(OPEN_ASSISTANT);
        next
    }
}

fn push_turn(prompt: &mut String, role: &str, content: &str) {
    prompt.push_str("<|");
    prompt.push_str(role);
    prompt.push_str("|>\n");
    prompt.push_str(content);
    prompt.push_str(END);
    prompt.push('\n');
}

/// `name: description` lines followed by the invocation syntax.
pub fn render_tool_catalog(tools: &[ToolDescriptor]) -> String {
    let mut block = String::from("Available tools:\n");
    for tool in tools {
        block.push_str("- ");
        block.push_str(&tool.name);
        block.push_str(": ");
        block.push_str(&tool.description);
        block.push('\n');
    }
    block.push_str(TOOL_SYNTAX_INSTRUCTION);
    block
}
