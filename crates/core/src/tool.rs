//! Tool provider abstraction.
//!
//! A tool provider exposes named tools that take a JSON object of arguments
//! and return textual content. The agent only consumes this contract; the
//! provider's implementation (an MCP server process, an in-process registry)
//! is opaque to it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ToolError;

/// JSON object arguments for a tool call.
pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

/// A tool as advertised by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// The tool name used in invocation tokens
    pub name: String,

    /// What the tool does (shown to the model in the tool catalog)
    #[serde(default)]
    pub description: String,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A tool call extracted from generated text, arguments still unparsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke
    pub name: String,

    /// Raw JSON object literal as it appeared in the generated text
    pub args_json: String,
}

impl ToolCall {
    /// Decode the argument literal into a JSON object.
    pub fn parse_arguments(&self) -> std::result::Result<ToolArguments, ToolError> {
        match serde_json::from_str::<serde_json::Value>(&self.args_json) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(other) => Err(ToolError::InvalidArguments(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(ToolError::InvalidArguments(e.to_string())),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Textual result of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text content returned by the tool
    pub content: String,

    /// Whether the provider flagged the result as an error
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// The tool provider contract consumed by the tool invocation loop.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "mcp:web-search").
    fn name(&self) -> &str;

    /// The tools currently offered.
    async fn list_tools(&self) -> std::result::Result<Vec<ToolDescriptor>, ToolError>;

    /// Invoke a tool by name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> std::result::Result<ToolOutput, ToolError>;

    /// Whether the underlying session is still usable.
    fn is_connected(&self) -> bool {
        true
    }
}

/// An in-process tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: ToolArguments) -> std::result::Result<String, ToolError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.name(), self.description())
    }
}

/// A registry of in-process tools, usable wherever a [`ToolProvider`] is.
///
/// Tools are kept in name order so the catalog rendered into prompts is stable.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProvider for ToolRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    async fn list_tools(&self) -> std::result::Result<Vec<ToolDescriptor>, ToolError> {
        Ok(self.tools.values().map(|t| t.descriptor()).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> std::result::Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments).await.map(ToolOutput::text)
    }
}
