//! Scripted capabilities for agent tests.

use async_trait::async_trait;
use curator_core::error::{ProviderError, ToolError};
use curator_core::provider::{Embedder, Generator};
use curator_core::tool::{ToolArguments, ToolDescriptor, ToolOutput, ToolProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A generator that returns a sequence of scripted outputs and records
/// every prompt it sees.
///
/// Once the script runs out every call fails with a 500 `ApiError`.
pub struct ScriptedGenerator {
    script: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedGenerator {
    pub fn new<I, S>(script: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::slow(script, Duration::ZERO)
    }

    /// Like `new`, but every call first sleeps for `delay`.
    pub fn slow<I, S>(script: I, delay: Duration) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut script: Vec<String> = script.into_iter().map(Into::into).collect();
        script.reverse();
        Arc::new(Self {
            script: Mutex::new(script),
            prompts: Mutex::new(Vec::new()),
            delay,
        })
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            })
    }
}

/// A tool provider with one canned result, recording every call.
pub struct ScriptedTools {
    tools: Vec<ToolDescriptor>,
    result: Result<ToolOutput, ToolError>,
    calls: Mutex<Vec<(String, ToolArguments)>>,
    connected: AtomicBool,
    delay: Duration,
}

impl ScriptedTools {
    fn build(result: Result<ToolOutput, ToolError>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            tools: vec![ToolDescriptor::new("search", "Search the web for current information")],
            result,
            calls: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            delay,
        })
    }

    pub fn replying(output: ToolOutput) -> Arc<Self> {
        Self::build(Ok(output), Duration::ZERO)
    }

    pub fn failing(error: ToolError) -> Arc<Self> {
        Self::build(Err(error), Duration::ZERO)
    }

    /// Replies with `output` after sleeping for `delay`.
    pub fn slow(output: ToolOutput, delay: Duration) -> Arc<Self> {
        Self::build(Ok(output), delay)
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(String, ToolArguments)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolProvider for ScriptedTools {
    fn name(&self) -> &str {
        "scripted-tools"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: ToolArguments) -> Result<ToolOutput, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Two-dimensional embedding: text length and vowel count.
pub struct CountingEmbedder;

#[async_trait]
impl Embedder for CountingEmbedder {
    fn name(&self) -> &str {
        "counting"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(inputs
            .iter()
            .map(|s| {
                let vowels = s.chars().filter(|c| "aeiouAEIOU".contains(*c)).count();
                vec![s.len() as f32, vowels as f32]
            })
            .collect())
    }
}
