//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use pdfqa_core::chunk::ChunkStrategy;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which LLM backend generates the Q&A pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Claude,
    Ollama,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Root directory for stored PDFs and extraction dumps.
    pub storage_dir: PathBuf,
    pub chunk_strategy: ChunkStrategy,
    pub chunk_max_tokens: usize,
    pub chunk_overlap: usize,
    /// Below this many extracted characters the document is treated as scanned.
    pub min_text_threshold: usize,
    pub worker_count: usize,
    pub llm_backend: LlmBackend,
    pub anthropic_api_key: Option<String>,
    pub claude_model: String,
    pub ollama_endpoint: String,
    pub ollama_model: String,
    /// OCR service endpoint; extraction of scanned documents fails without it.
    pub ocr_endpoint: Option<String>,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://storage/pdfqa.db?mode=rwc".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let storage_dir = std::env::var("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("storage"));

        // --- Load Pipeline Settings ---
        let chunk_strategy = parse_var("CHUNK_STRATEGY", ChunkStrategy::Semantic)?;
        let chunk_max_tokens = parse_var("CHUNK_MAX_TOKENS", 1000usize)?;
        let chunk_overlap = parse_var("CHUNK_OVERLAP", 100usize)?;
        let min_text_threshold = parse_var("MIN_TEXT_THRESHOLD", 100usize)?;
        let worker_count = parse_var("WORKER_COUNT", 2usize)?;
        if worker_count == 0 {
            return Err(ConfigError::InvalidValue(
                "WORKER_COUNT".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // --- Load LLM and OCR Backend Settings ---
        let llm_backend = match std::env::var("LLM_BACKEND")
            .unwrap_or_else(|_| "claude".to_string())
            .to_lowercase()
            .as_str()
        {
            "claude" => LlmBackend::Claude,
            "ollama" => LlmBackend::Ollama,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_BACKEND".to_string(),
                    format!("'{}' is not a supported backend", other),
                ))
            }
        };

        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        let claude_model = std::env::var("CLAUDE_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
        let ollama_endpoint = std::env::var("OLLAMA_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:11434/api/generate".to_string());
        let ollama_model =
            std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama2:13b".to_string());
        let ocr_endpoint = std::env::var("OCR_ENDPOINT").ok();

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            storage_dir,
            chunk_strategy,
            chunk_max_tokens,
            chunk_overlap,
            min_text_threshold,
            worker_count,
            llm_backend,
            anthropic_api_key,
            claude_model,
            ollama_endpoint,
            ollama_model,
            ocr_endpoint,
        })
    }

    /// Directory where uploaded PDFs are kept.
    pub fn pdf_dir(&self) -> PathBuf {
        self.storage_dir.join("pdfs")
    }

    /// Directory where extraction dumps are written for audit.
    pub fn results_dir(&self) -> PathBuf {
        self.storage_dir.join("results")
    }
}
