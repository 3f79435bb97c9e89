use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FolioError, Result};

/// Top-level configuration for Folio.
///
/// Loaded from `~/.folio/config.toml` by default. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolioConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl FolioConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FolioConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject settings that would make retrieval or chunking meaningless.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.k == 0 {
            return Err(FolioError::Config("retrieval.k must be at least 1".into()));
        }
        if r.fetch_k < r.k {
            return Err(FolioError::Config(format!(
                "retrieval.fetch_k ({}) must be >= retrieval.k ({})",
                r.fetch_k, r.k
            )));
        }
        if !(0.0..=1.0).contains(&r.lambda_mult) {
            return Err(FolioError::Config(
                "retrieval.lambda_mult must be within [0, 1]".into(),
            ));
        }
        if r.chunk_size == 0 || r.chunk_overlap >= r.chunk_size {
            return Err(FolioError::Config(format!(
                "retrieval.chunk_overlap ({}) must be smaller than chunk_size ({})",
                r.chunk_overlap, r.chunk_size
            )));
        }
        Ok(())
    }

    /// The data directory with a leading `~` expanded to the home directory.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.general.data_dir)
    }
}

/// Expand `~/` to the current user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the session database, index artifacts and uploads.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP server port.
    pub port: u16,
    /// Origins allowed by the CORS layer.
    pub allowed_origins: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.folio/data".to_string(),
            log_level: "info".to_string(),
            port: 8000,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Document chunking and semantic retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of fragments returned per document question.
    pub k: usize,
    /// Candidate pool size for diversity (MMR) search.
    pub fetch_k: usize,
    /// Relevance/diversity balance: 1.0 is pure relevance, 0.0 pure diversity.
    pub lambda_mult: f64,
    /// Maximum characters of each fragment placed into a prompt.
    pub fragment_char_limit: usize,
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub chunk_overlap: usize,
    /// Embedding model name.
    pub embedding_model: String,
    /// Embedding dimension.
    pub embedding_dim: usize,
    /// Directory containing `model.onnx` and `tokenizer.json`. The mock
    /// embedder is used when unset.
    pub model_dir: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 6,
            fetch_k: 8,
            lambda_mult: 0.5,
            fragment_char_limit: 400,
            chunk_size: 1000,
            chunk_overlap: 200,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_dim: 384,
            model_dir: None,
        }
    }
}

/// Session persistence and retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Sessions idle longer than this are removed by the sweep.
    pub max_age_days: u32,
    /// Hours between sweep cycles.
    pub sweep_interval_hours: u32,
    /// Upload size limit in megabytes.
    pub max_upload_mb: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_age_days: 7,
            sweep_interval_hours: 24,
            max_upload_mb: 20,
        }
    }
}

/// Completion backend and conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Model name passed to the completion backend.
    pub model: String,
    /// Base URL of the Ollama-compatible backend.
    pub endpoint: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Number of recent messages scanned for personal facts.
    pub history_window: usize,
    /// Number of recent messages prefixed to general questions.
    pub general_context_turns: usize,
    /// Completion request timeout.
    pub request_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "llama3".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            temperature: 0.7,
            history_window: 100,
            general_context_turns: 6,
            request_timeout_secs: 120,
        }
    }
}
