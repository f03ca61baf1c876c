use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

use crate::extract::DEFAULT_MIN_UNIT_CHARS;
use crate::ingestion::IngestionSettings;
use crate::llm_providers::LlmProviderType;

use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub ingestion: IngestionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Generative-model service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub provider: LlmProviderType,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Ingestion pipeline tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    pub min_unit_chars: usize,
    pub max_concurrent_units: usize,
    pub unit_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            server: ServerConfig::from_env()?,
            ingestion: IngestionConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_summary();

        Ok(config)
    }

    fn log_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            llm_provider = ?self.llm.provider,
            llm_model = ?self.llm.model,
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            max_concurrent_units = self.ingestion.max_concurrent_units,
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    pub fn validate(&self) -> Result<()> {
        if !self.database.url.contains("sqlite:") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:'"));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.ingestion.max_concurrent_units == 0 {
            return Err(anyhow!("INGEST_MAX_CONCURRENT_UNITS must be at least 1"));
        }

        if self.llm.api_key.is_empty() || self.llm.api_key == "your-api-key" {
            warn!("LLM API key appears to be placeholder or empty - generation may not work");
        }

        log_validation!(success, "configuration", "Configuration validation completed");
        Ok(())
    }
}

impl From<&IngestionConfig> for IngestionSettings {
    fn from(config: &IngestionConfig) -> Self {
        IngestionSettings {
            min_unit_chars: config.min_unit_chars,
            max_concurrent_units: config.max_concurrent_units,
            unit_timeout_secs: config.unit_timeout_secs,
        }
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:study_system.db".to_string());
        Ok(DatabaseConfig { url })
    }
}

impl LlmConfig {
    fn from_env() -> Result<Self> {
        let api_key = env::var("LLM_API_KEY").unwrap_or_else(|_| "your-api-key".to_string());
        let base_url = env::var("LLM_BASE_URL").ok();

        let provider_str = env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" | "google" => LlmProviderType::Gemini,
            "openai" | "chatgpt" | "gpt" => LlmProviderType::OpenAi,
            _ => {
                info!("Unknown LLM provider '{}', defaulting to OpenAI", provider_str);
                LlmProviderType::OpenAi
            }
        };

        let model = env::var("LLM_MODEL").ok();

        Ok(LlmConfig {
            api_key,
            base_url,
            provider,
            model,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        let port = port_str
            .parse::<u16>()
            .map_err(|_| anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str))?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl IngestionConfig {
    fn from_env() -> Result<Self> {
        let min_unit_chars = env::var("INGEST_MIN_UNIT_CHARS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MIN_UNIT_CHARS);

        let max_concurrent_units = env::var("INGEST_MAX_CONCURRENT_UNITS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);

        let unit_timeout_secs = env::var("INGEST_UNIT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        Ok(IngestionConfig {
            min_unit_chars,
            max_concurrent_units,
            unit_timeout_secs,
        })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level =
            env::var("RUST_LOG").unwrap_or_else(|_| "info,study_system=debug".to_string());
        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            log_directory,
        })
    }
}

/// Mask sensitive data in configuration for safe logging.
fn mask_sensitive_data(data: &str) -> String {
    if data.len() <= 8 {
        "*".repeat(data.len())
    } else {
        format!("{}***{}", &data[..4], &data[data.len() - 4..])
    }
}
