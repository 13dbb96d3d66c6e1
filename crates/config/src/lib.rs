//! Configuration loading, validation, and management for Curator.
//!
//! Loads configuration from `~/.curator/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.
//!
//! The environment names for the deployment-level knobs (`PORT`, `DATA_DIR`,
//! `COMMUNITY_ID`, `CURATION_CONTRACT_ID`, `SHADE_AGENT_API_URL`) match the
//! container manifests the agent is deployed with.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Community this deployment is exclusively bound to. Empty = unscoped.
    #[serde(default)]
    pub community_id: String,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Document corpus configuration
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Generation backend configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Tool provider configuration
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Interaction ledger configuration
    #[serde(default)]
    pub ledger: LedgerConfig,
}

fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("community_id", &self.community_id)
            .field("server", &self.server)
            .field("corpus", &self.corpus)
            .field("generation", &self.generation)
            .field("embedding", &self.embedding)
            .field("tools", &self.tools)
            .field("ledger", &self.ledger)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Base directory; community corpora live in `community-<id>/` below it
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Documents retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_top_k() -> usize {
    3
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            top_k: default_top_k(),
        }
    }
}

impl CorpusConfig {
    /// The directory holding the corpus for the given community.
    pub fn resolve_dir(&self, community_id: &str) -> PathBuf {
        let community_id = community_id.trim();
        if community_id.is_empty() {
            self.data_dir.clone()
        } else {
            self.data_dir.join(format!("community-{community_id}"))
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// "openai_compat" or "local"
    #[serde(default = "default_generation_backend")]
    pub backend: String,

    #[serde(default = "default_generation_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name (remote) or preset alias / GGUF path (local)
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on a single generation call
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Pending prompts the single generation worker will hold
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_generation_backend() -> String {
    "openai_compat".into()
}
fn default_generation_url() -> String {
    "http://localhost:8000/v1".into()
}
fn default_model() -> String {
    "phi3".into()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.1
}
fn default_generation_timeout() -> u64 {
    120
}
fn default_queue_capacity() -> usize {
    64
}
fn default_system_prompt() -> String {
    "You are a helpful curation assistant. Use the Context to answer.".into()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: default_generation_backend(),
            base_url: default_generation_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout(),
            queue_capacity: default_queue_capacity(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "hashing" or "openai_compat"
    #[serde(default = "default_embedding_backend")]
    pub backend: String,

    /// Defaults to the generation base URL when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector width for the hashing embedder
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_backend() -> String {
    "hashing".into()
}
fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".into()
}
fn default_dimensions() -> usize {
    384
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_embedding_backend(),
            base_url: None,
            model: default_embedding_model(),
            dimensions: default_dimensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Command that starts an MCP server on stdio. None = no tool provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Upper bound on a single tool call
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// Keep serving without tools if the provider cannot be started
    #[serde(default = "default_true")]
    pub optional: bool,
}

fn default_tool_timeout() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: vec![],
            timeout_secs: default_tool_timeout(),
            optional: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Agent API endpoint that relays function calls to the chain
    #[serde(default = "default_ledger_url")]
    pub api_url: String,

    /// Target contract. Empty = ledger disabled.
    #[serde(default)]
    pub contract_id: String,

    #[serde(default = "default_ledger_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay before the first retry; doubles per attempt
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default = "default_ledger_queue")]
    pub queue_capacity: usize,
}

fn default_ledger_url() -> String {
    "http://localhost:3140/api/agent".into()
}
fn default_ledger_timeout() -> u64 {
    5
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    500
}
fn default_ledger_queue() -> usize {
    256
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            api_url: default_ledger_url(),
            contract_id: String::new(),
            timeout_secs: default_ledger_timeout(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            queue_capacity: default_ledger_queue(),
        }
    }
}

impl LedgerConfig {
    /// Whether a ledger target is configured at all.
    pub fn is_enabled(&self) -> bool {
        !self.contract_id.trim().is_empty()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.curator/config.toml)
    /// and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from an explicit path and apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides (highest priority).
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            match port.trim().parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT"),
            }
        }
        if let Some(community) = lookup("COMMUNITY_ID") {
            self.community_id = community.trim().to_string();
        }
        if let Some(dir) = lookup("DATA_DIR") {
            self.corpus.data_dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup("CURATOR_GENERATION_BACKEND") {
            self.generation.backend = backend;
        }
        if let Some(url) = lookup("CURATOR_GENERATION_URL") {
            self.generation.base_url = url;
        }
        if let Some(key) = lookup("CURATOR_API_KEY") {
            self.generation.api_key = Some(key);
        }
        if let Some(model) = lookup("CURATOR_MODEL") {
            self.generation.model = model;
        }
        if let Some(backend) = lookup("CURATOR_EMBEDDING_BACKEND") {
            self.embedding.backend = backend;
        }
        if let Some(command) = lookup("CURATOR_TOOL_COMMAND") {
            let mut parts = command.split_whitespace().map(String::from);
            if let Some(program) = parts.next() {
                self.tools.command = Some(program);
                self.tools.args = parts.collect();
            }
        }
        if let Some(url) = lookup("SHADE_AGENT_API_URL") {
            self.ledger.api_url = url;
        }
        if let Some(contract) = lookup("CURATION_CONTRACT_ID") {
            self.ledger.contract_id = contract.trim().to_string();
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".curator")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.corpus.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "corpus.top_k must be at least 1".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be at least 1".into(),
            ));
        }
        if self.ledger.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "ledger.max_attempts must be at least 1".into(),
            ));
        }
        if self.generation.queue_capacity == 0 || self.ledger.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "queue capacities must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Render the effective config as TOML, secrets redacted.
    pub fn to_redacted_toml(&self) -> String {
        let mut copy = self.clone();
        if copy.generation.api_key.is_some() {
            copy.generation.api_key = Some("[REDACTED]".into());
        }
        toml::to_string_pretty(&copy).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            community_id: String::new(),
            server: ServerConfig::default(),
            corpus: CorpusConfig::default(),
            generation: GenerationConfig::default(),
            embedding: EmbeddingConfig::default(),
            tools: ToolsConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.corpus.top_k, 3);
        assert!(!config.ledger.is_enabled());
        assert!(config.tools.command.is_none());
        assert!(config.tools.optional);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.generation.model, config.generation.model);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.generation.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = AppConfig::default();
        config.ledger.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
community_id = "dao-7"

[corpus]
data_dir = "/srv/corpus"

[tools]
command = "python"
args = ["search_server.py"]
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.community_id, "dao-7");
        assert_eq!(config.corpus.data_dir, PathBuf::from("/srv/corpus"));
        assert_eq!(config.corpus.top_k, 3);
        assert_eq!(config.tools.command.as_deref(), Some("python"));
        assert_eq!(config.tools.args, vec!["search_server.py"]);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_deployment_knobs() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("PORT", "8080"),
            ("COMMUNITY_ID", " dao-1 "),
            ("DATA_DIR", "/data"),
            ("CURATION_CONTRACT_ID", "curation.testnet"),
            ("SHADE_AGENT_API_URL", "http://sidecar:3140/api/agent"),
            ("CURATOR_TOOL_COMMAND", "python search_server.py"),
        ]));

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.community_id, "dao-1");
        assert_eq!(config.corpus.data_dir, PathBuf::from("/data"));
        assert!(config.ledger.is_enabled());
        assert_eq!(config.ledger.api_url, "http://sidecar:3140/api/agent");
        assert_eq!(config.tools.command.as_deref(), Some("python"));
        assert_eq!(config.tools.args, vec!["search_server.py"]);
    }

    #[test]
    fn invalid_port_env_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("PORT", "not-a-port")]));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn corpus_dir_is_community_scoped() {
        let corpus = CorpusConfig {
            data_dir: PathBuf::from("data"),
            top_k: 3,
        };
        assert_eq!(corpus.resolve_dir(""), PathBuf::from("data"));
        assert_eq!(corpus.resolve_dir("42"), PathBuf::from("data/community-42"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.generation.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!config.to_redacted_toml().contains("sk-secret"));
    }
}
