use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shopseed_generate::{GenerateOptions, OpenAiConfig, RetryPolicy};
use shopseed_media::{CompletionMode, DEFAULT_PROMPT_NODE};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {message}")]
    InvalidEnv { key: &'static str, message: String },
}

/// Server configuration: built-in defaults, then the TOML file, then the
/// environment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub generation: GenerationConfig,
    pub images: ImagesConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl HttpConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub migrate_on_start: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/shopseed".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 10,
            migrate_on_start: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub stream: bool,
    pub timeout_secs: u64,
    pub max_tokens: MaxTokens,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let openai = OpenAiConfig::default();
        Self {
            base_url: openai.base_url,
            api_key: openai.api_key,
            model: openai.model,
            stream: openai.stream,
            timeout_secs: openai.timeout.as_secs(),
            max_tokens: MaxTokens::default(),
        }
    }
}

impl LlmConfig {
    pub fn openai(&self) -> OpenAiConfig {
        OpenAiConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            stream: self.stream,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Output size bound per entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaxTokens {
    pub products: u32,
    pub users: u32,
    pub addresses: u32,
    pub reviews: u32,
}

impl Default for MaxTokens {
    fn default() -> Self {
        Self {
            products: 10_000,
            users: 10_000,
            addresses: 3_000,
            reviews: 3_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    pub inter_batch_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub products: EntityDefaults,
    pub users: EntityDefaults,
    /// Addresses generated per user without one.
    pub addresses_per_user: usize,
    pub address_chunk: usize,
    /// Products offered to each user for review.
    pub reviews_per_user: usize,
    pub review_pause_ms: u64,
    pub setup_products: usize,
    pub setup_users: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            inter_batch_delay_ms: 8_000,
            retry_attempts: 5,
            retry_base_delay_ms: 5_000,
            products: EntityDefaults {
                total: 100,
                chunk: 20,
            },
            users: EntityDefaults {
                total: 50,
                chunk: 10,
            },
            addresses_per_user: 2,
            address_chunk: 10,
            reviews_per_user: 5,
            review_pause_ms: 2_000,
            setup_products: 100,
            setup_users: 20,
        }
    }
}

impl GenerationConfig {
    pub fn options(&self, max_tokens: u32) -> GenerateOptions {
        GenerateOptions {
            inter_batch_delay: Duration::from_millis(self.inter_batch_delay_ms),
            retry: RetryPolicy {
                max_attempts: self.retry_attempts,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
            },
            max_tokens: Some(max_tokens),
        }
    }

    pub fn review_pause(&self) -> Duration {
        Duration::from_millis(self.review_pause_ms)
    }
}

/// Default total and chunk size for one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDefaults {
    pub total: usize,
    pub chunk: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub base_url: String,
    pub token: String,
    pub mode: CompletionMode,
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    /// Base URL the job service uses to reach the callback endpoints.
    pub public_url: String,
    pub user_workflow: Option<String>,
    pub product_workflow: Option<String>,
    pub prompt_node: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            mode: CompletionMode::Polling,
            poll_attempts: 60,
            poll_interval_ms: 5_000,
            public_url: "http://localhost:3000".to_string(),
            user_workflow: None,
            product_workflow: None,
            prompt_node: DEFAULT_PROMPT_NODE.to_string(),
        }
    }
}

impl ImagesConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "shopseed-images".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load defaults, overlay `path` when given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Overlay environment variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|value| !value.is_empty()) {
                *target = value;
            }
        };
        set(&mut self.database.url, "DATABASE_URL");
        set(&mut self.llm.api_key, "OPENAI_API_KEY");
        set(&mut self.llm.base_url, "OPENAI_BASE_URL");
        set(&mut self.images.base_url, "IMAGE_API_BASE_URL");
        set(&mut self.images.token, "IMAGE_API_TOKEN");
        set(&mut self.images.public_url, "SERVER_PUBLIC_URL");
        set(&mut self.storage.bucket, "S3_BUCKET_NAME");
        set(&mut self.storage.region, "AWS_REGION");

        if let Some(port) = lookup("PORT").filter(|value| !value.is_empty()) {
            self.http.port = port.parse().map_err(|err| ConfigError::InvalidEnv {
                key: "PORT",
                message: format!("{err}"),
            })?;
        }
        Ok(())
    }
}
