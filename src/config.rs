use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Chunking parameters form a non-advancing window.
    #[error("CHUNK_OVERLAP ({overlap}) must be smaller than CHUNK_MAX_LENGTH ({max_length})")]
    DegenerateChunking {
        /// Configured overlap in characters.
        overlap: usize,
        /// Configured maximum chunk length in characters.
        max_length: usize,
    },
}

/// Runtime configuration for the ragchat server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores chunk embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for document chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Base URL of the Ollama runtime used for embeddings.
    pub ollama_url: String,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the OpenAI-compatible chat completion endpoint.
    pub llm_api_url: String,
    /// Bearer token for the chat completion provider.
    pub llm_api_key: String,
    /// Chat model identifier used for answer generation.
    pub llm_model: String,
    /// Maximum characters per chunk.
    pub chunk_max_length: usize,
    /// Character overlap carried between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of nearest chunks retrieved per question.
    pub search_top_k: usize,
    /// Directory where uploaded PDF files are persisted.
    pub upload_dir: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let chunk_max_length = load_env_parsed("CHUNK_MAX_LENGTH", 1000)?;
        let chunk_overlap = load_env_parsed("CHUNK_OVERLAP", 100)?;
        validate_chunking(chunk_max_length, chunk_overlap)?;

        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| "pdf_docs".to_string()),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            llm_api_url: load_env_optional("LLM_API_URL")
                .unwrap_or_else(|| "https://api.groq.com/openai/v1".to_string()),
            llm_api_key: load_env("LLM_API_KEY")?,
            llm_model: load_env_optional("LLM_MODEL")
                .unwrap_or_else(|| "llama-3.1-8b-instant".to_string()),
            chunk_max_length,
            chunk_overlap,
            search_top_k: validate_top_k(load_env_parsed("SEARCH_TOP_K", 3)?)?,
            upload_dir: load_env_optional("UPLOAD_DIR")
                .unwrap_or_else(|| "data/uploads".to_string()),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

/// Reject chunking parameters whose sliding window would never advance.
pub(crate) fn validate_chunking(max_length: usize, overlap: usize) -> Result<(), ConfigError> {
    if max_length == 0 {
        return Err(ConfigError::InvalidValue("CHUNK_MAX_LENGTH".to_string()));
    }
    if overlap >= max_length {
        return Err(ConfigError::DegenerateChunking {
            overlap,
            max_length,
        });
    }
    Ok(())
}

/// Reject a retrieval depth of zero, which would make every answer the fallback.
pub(crate) fn validate_top_k(top_k: usize) -> Result<usize, ConfigError> {
    if top_k == 0 {
        return Err(ConfigError::InvalidValue("SEARCH_TOP_K".to_string()));
    }
    Ok(top_k)
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_parsed(key: &str, default: usize) -> Result<usize, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        llm_model = %config.llm_model,
        chunk_max_length = config.chunk_max_length,
        chunk_overlap = config.chunk_overlap,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlap_equal_to_max_length() {
        let error = validate_chunking(100, 100).expect_err("window never advances");
        assert!(matches!(
            error,
            ConfigError::DegenerateChunking {
                overlap: 100,
                max_length: 100
            }
        ));
    }

    #[test]
    fn rejects_overlap_larger_than_max_length() {
        assert!(validate_chunking(100, 250).is_err());
    }

    #[test]
    fn rejects_zero_max_length() {
        assert!(matches!(
            validate_chunking(0, 0),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn accepts_advancing_window() {
        validate_chunking(1000, 100).expect("valid chunking parameters");
    }

    #[test]
    fn rejects_zero_top_k() {
        assert!(matches!(
            validate_top_k(0),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn accepts_positive_top_k() {
        assert_eq!(validate_top_k(3).expect("valid retrieval depth"), 3);
    }
}
