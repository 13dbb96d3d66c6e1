//! Local inference backend: runs a GGUF model in-process.
//!
//! Uses [Candle](https://github.com/huggingface/candle) to run quantized
//! instruct models with no network access after the first download.
//!
//! The prompt arrives fully rendered in the model's instruct format and is fed
//! to the tokenizer verbatim; no chat template is applied here.
//!
//! Supported presets:
//! - **phi3** (Phi-3-mini-4k-instruct, Q4 ~2.2 GB): the format the prompt
//!   assembler renders
//! - **tinyllama** (1.1B, Q4_K_M ~670 MB): for constrained hosts
//! - **qwen:0.5b**: smallest practical option
//!
//! Any other value is treated as a path to a `.gguf` file with a
//! `tokenizer.json` next to it.

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama as qlm;
use candle_transformers::models::quantized_phi3 as qphi3;
use curator_core::error::ProviderError;
use curator_core::provider::Generator;
use hf_hub::api::sync::Api;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::text::clean_completion;

// ── Model presets ──────────────────────────────────────────────────────

struct ModelPreset {
    repo: &'static str,
    gguf_file: &'static str,
    tokenizer_repo: &'static str,
}

fn resolve_preset(alias: &str) -> Option<ModelPreset> {
    match alias.to_lowercase().as_str() {
        "phi3" | "phi-3" | "phi3-mini" => Some(ModelPreset {
            repo: "microsoft/Phi-3-mini-4k-instruct-gguf",
            gguf_file: "Phi-3-mini-4k-instruct-q4.gguf",
            tokenizer_repo: "microsoft/Phi-3-mini-4k-instruct",
        }),
        "tinyllama" | "tiny-llama" | "tinyllama-1.1b" => Some(ModelPreset {
            repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
            gguf_file: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
            tokenizer_repo: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
        }),
        "qwen:0.5b" | "qwen-0.5b" | "qwen2-0.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2-0.5B-Instruct-GGUF",
            gguf_file: "qwen2-0_5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2-0.5B-Instruct",
        }),
        _ => None,
    }
}

const STOP_TOKENS: &[&str] = &["<|end|>", "<|endoftext|>", "</s>", "<|im_end|>", "<|eot_id|>"];

// ── Local generator ────────────────────────────────────────────────────

/// A [`Generator`] running a GGUF model on the CPU via Candle.
///
/// The model is behind a Mutex because inference mutates the KV cache and is
/// CPU-bound; wrap it in a `QueuedGenerator` to make the single-flight
/// ceiling explicit to callers.
pub struct LocalGenerator {
    inner: Arc<Mutex<Option<LocalModelState>>>,
    model_name: String,
    max_tokens: u32,
    temperature: f32,
}

enum Weights {
    Llama(qlm::ModelWeights),
    Phi3(qphi3::ModelWeights),
}

impl Weights {
    fn forward(&mut self, input: &Tensor, index_pos: usize) -> candle_core::Result<Tensor> {
        match self {
            Weights::Llama(m) => m.forward(input, index_pos),
            Weights::Phi3(m) => m.forward(input, index_pos),
        }
    }
}

struct LocalModelState {
    model: Weights,
    tokenizer: Tokenizer,
    device: Device,
    stop_ids: Vec<u32>,
}

impl LocalGenerator {
    /// Create a lazily loaded generator; the model loads on first request.
    pub fn new(model_name: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            model_name: model_name.to_string(),
            max_tokens: 512,
            temperature: 0.1,
        }
    }

    /// Eagerly load the model (downloads if needed, then loads into memory).
    ///
    /// Blocks; call from `spawn_blocking` or before the runtime starts.
    pub fn load(model_name: &str) -> Result<Self, ProviderError> {
        let state = LocalModelState::load(model_name)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(state))),
            ..Self::new(model_name)
        })
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }
}

impl LocalModelState {
    fn load(model_name: &str) -> Result<Self, ProviderError> {
        let path = Path::new(model_name);
        if path.exists() && model_name.ends_with(".gguf") {
            let tokenizer_path = path.with_file_name("tokenizer.json");
            return Self::load_files(path, &tokenizer_path);
        }

        let preset = resolve_preset(model_name).ok_or_else(|| {
            ProviderError::ModelNotFound(format!(
                "Unknown local model '{model_name}'. Available presets: phi3, tinyllama, \
                 qwen:0.5b. Or provide a path to a .gguf file."
            ))
        })?;

        info!(
            model = model_name,
            repo = preset.repo,
            file = preset.gguf_file,
            "Downloading/loading local model"
        );

        let api = Api::new().map_err(|e| {
            ProviderError::Network(format!("Failed to initialize HuggingFace Hub API: {e}"))
        })?;

        let model_path = api
            .model(preset.repo.to_string())
            .get(preset.gguf_file)
            .map_err(|e| {
                ProviderError::Network(format!(
                    "Failed to download model '{}' from '{}': {e}",
                    preset.gguf_file, preset.repo
                ))
            })?;

        let tokenizer_path = api
            .model(preset.tokenizer_repo.to_string())
            .get("tokenizer.json")
            .map_err(|e| {
                ProviderError::Network(format!(
                    "Failed to download tokenizer from '{}': {e}",
                    preset.tokenizer_repo
                ))
            })?;

        Self::load_files(&model_path, &tokenizer_path)
    }

    fn load_files(model_path: &Path, tokenizer_path: &Path) -> Result<Self, ProviderError> {
        let device = Device::Cpu;
        info!(path = %model_path.display(), "Loading GGUF model");

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to load tokenizer: {e}")))?;

        let mut file = std::fs::File::open(model_path)
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to open model file: {e}")))?;

        let gguf = gguf_file::Content::read(&mut file)
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to parse GGUF file: {e}")))?;

        let architecture = gguf
            .metadata
            .get("general.architecture")
            .and_then(|v| v.to_string().ok())
            .cloned()
            .unwrap_or_else(|| "llama".to_string());

        let model = match architecture.as_str() {
            "phi3" => qphi3::ModelWeights::from_gguf(false, gguf, &mut file, &device)
                .map(Weights::Phi3),
            _ => qlm::ModelWeights::from_gguf(gguf, &mut file, &device).map(Weights::Llama),
        }
        .map_err(|e| ProviderError::NotConfigured(format!("Failed to load model weights: {e}")))?;

        let stop_ids: Vec<u32> = STOP_TOKENS
            .iter()
            .filter_map(|t| tokenizer.token_to_id(t))
            .collect();

        info!(architecture = %architecture, stop_tokens = stop_ids.len(), "Local model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            stop_ids,
        })
    }

    /// Run inference: tokenize → sample until a stop token → decode.
    fn generate(
        &mut self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        // The prompt carries its own special tokens.
        let encoding = self
            .tokenizer
            .encode(prompt, false)
            .map_err(|e| ProviderError::ApiError {
                status_code: 500,
                message: format!("Tokenization failed: {e}"),
            })?;

        let prompt_tokens = encoding.get_ids();
        debug!(
            prompt_tokens = prompt_tokens.len(),
            max_tokens,
            temperature,
            "Starting local generation"
        );

        let mut logits_processor = if temperature <= 0.0 {
            LogitsProcessor::new(42, None, None)
        } else {
            LogitsProcessor::new(42, Some(temperature as f64), None)
        };

        let mut generated: Vec<u32> = Vec::new();
        let mut input = Tensor::new(prompt_tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(map_candle_err)?;
        // Starting at position 0 resets the KV cache.
        let mut index_pos = 0usize;

        for _ in 0..max_tokens {
            let seq_len = input.dim(1).map_err(map_candle_err)?;
            let logits = self
                .model
                .forward(&input, index_pos)
                .and_then(|l| l.squeeze(0))
                .map_err(map_candle_err)?;
            index_pos += seq_len;

            let next = logits_processor.sample(&logits).map_err(map_candle_err)?;
            if self.stop_ids.contains(&next) {
                break;
            }
            generated.push(next);

            input = Tensor::new(&[next][..], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(map_candle_err)?;
        }

        let output = self
            .tokenizer
            .decode(&generated, false)
            .map_err(|e| ProviderError::ApiError {
                status_code: 500,
                message: format!("Detokenization failed: {e}"),
            })?;

        debug!(completion_tokens = generated.len(), "Generation complete");
        Ok(output)
    }
}

fn map_candle_err(e: candle_core::Error) -> ProviderError {
    ProviderError::ApiError {
        status_code: 500,
        message: format!("Candle inference error: {e}"),
    }
}

#[async_trait]
impl Generator for LocalGenerator {
    fn name(&self) -> &str {
        "local"
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        {
            let mut state = self.inner.lock().await;
            if state.is_none() {
                info!(model = %self.model_name, "Loading local model on first request");
                let name = self.model_name.clone();
                let loaded = tokio::task::spawn_blocking(move || LocalModelState::load(&name))
                    .await
                    .map_err(|e| ProviderError::ApiError {
                        status_code: 500,
                        message: format!("Model loading task failed: {e}"),
                    })??;
                *state = Some(loaded);
            }
        }

        let inner = self.inner.clone();
        let prompt = prompt.to_string();
        let (max_tokens, temperature) = (self.max_tokens, self.temperature);

        let output = tokio::task::spawn_blocking(move || {
            let mut guard = inner.blocking_lock();
            match guard.as_mut() {
                Some(state) => state.generate(&prompt, max_tokens, temperature),
                None => Err(ProviderError::NotConfigured("Local model not loaded".into())),
            }
        })
        .await
        .map_err(|e| ProviderError::ApiError {
            status_code: 500,
            message: format!("Inference task panicked: {e}"),
        })??;

        Ok(clean_completion(&output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_preset_aliases() {
        assert!(resolve_preset("phi3").is_some());
        assert!(resolve_preset("Phi-3").is_some());
        assert!(resolve_preset("tinyllama").is_some());
        assert!(resolve_preset("qwen:0.5b").is_some());
        assert!(resolve_preset("nonexistent").is_none());
    }

    #[test]
    fn phi3_preset_points_at_instruct_gguf() {
        let preset = resolve_preset("phi3").unwrap();
        assert!(preset.repo.contains("Phi-3-mini-4k-instruct"));
        assert!(preset.gguf_file.ends_with(".gguf"));
    }

    #[test]
    fn unknown_model_errors_without_download() {
        let err = LocalModelState::load("definitely-not-a-model").err().unwrap();
        assert!(matches!(err, ProviderError::ModelNotFound(_)));
    }
}
