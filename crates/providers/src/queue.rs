//! Single-worker generation queue.
//!
//! The generation backend is a process-wide resource that handles one prompt at
//! a time (local inference holds the whole model; remote backends are sized for
//! one stream). [`QueuedGenerator`] makes that ceiling explicit: callers enqueue
//! `(prompt, reply)` jobs and a single worker task drains them in FIFO order.
//!
//! Throughput is therefore one generation at a time; a request waits for every
//! job queued ahead of it. A caller that stops waiting (generation timeout,
//! dropped connection) cancels its job: the worker drops the in-flight
//! `generate` future and moves on. Backends that run on a blocking thread
//! (local inference) still finish that thread's work before it is released.

use async_trait::async_trait;
use curator_core::error::ProviderError;
use curator_core::provider::Generator;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

struct Job {
    prompt: String,
    reply: oneshot::Sender<Result<String, ProviderError>>,
}

/// A [`Generator`] that serializes all calls through one worker task.
///
/// Must be constructed inside a tokio runtime.
pub struct QueuedGenerator {
    name: String,
    tx: mpsc::Sender<Job>,
}

impl QueuedGenerator {
    pub fn new(inner: Arc<dyn Generator>, capacity: usize) -> Self {
        let name = format!("queued:{}", inner.name());
        let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(mut job) = rx.recv().await {
                if job.reply.is_closed() {
                    trace!("Dropping abandoned generation job");
                    continue;
                }
                let result = tokio::select! {
                    result = inner.generate(&job.prompt) => result,
                    _ = job.reply.closed() => {
                        debug!("Caller went away; generation cancelled");
                        continue;
                    }
                };
                let _ = job.reply.send(result);
            }
            debug!("Generation queue closed");
        });

        Self { name, tx }
    }
}

#[async_trait]
impl Generator for QueuedGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job {
                prompt: prompt.to_string(),
                reply,
            })
            .await
            .map_err(|_| ProviderError::QueueClosed)?;
        rx.await.map_err(|_| ProviderError::QueueClosed)?
    }
}
