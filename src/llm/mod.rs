pub mod extract;
pub mod generator;
pub mod models;
pub mod providers;

use crate::config::LlmConfig;
use crate::schema::SchemaText;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

pub use extract::GenerationError;
pub use models::{ErrorContext, GeneratedQuery, Prompt};

/// Failure of the completion call itself (network, auth, quota, malformed reply).
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            ServiceError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            ServiceError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for ServiceError {}

/// Everything a generator call can fail with. Neither kind is retried.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorError {
    Service(ServiceError),
    Generation(GenerationError),
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::Service(err) => err.fmt(f),
            GeneratorError::Generation(err) => err.fmt(f),
        }
    }
}

impl Error for GeneratorError {}

impl From<ServiceError> for GeneratorError {
    fn from(err: ServiceError) -> Self {
        GeneratorError::Service(err)
    }
}

impl From<GenerationError> for GeneratorError {
    fn from(err: GenerationError) -> Self {
        GeneratorError::Generation(err)
    }
}

/// Prompt in, text out. The only place a model vendor is visible.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(
        &self,
        question: &str,
        schema: &SchemaText,
        prior_error: Option<&ErrorContext>,
    ) -> Result<GeneratedQuery, GeneratorError>;
}

pub struct LlmManager {
    provider: Box<dyn CompletionService + Send + Sync>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self, ServiceError> {
        let provider: Box<dyn CompletionService + Send + Sync> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config, api_key)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(ServiceError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { provider })
    }
}

#[async_trait]
impl CompletionService for LlmManager {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ServiceError> {
        self.provider.complete(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend: &str) -> LlmConfig {
        LlmConfig {
            backend: backend.to_string(),
            model: "gpt-4-turbo".to_string(),
            api_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key_file: "OPEN_API_KEY.txt".to_string(),
            timeout_secs: 5,
            temperature: 0.1,
        }
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = LlmManager::new(&config("carrier-pigeon"), None).err().unwrap();
        assert_eq!(
            err,
            ServiceError::ConfigError("Unsupported LLM backend: carrier-pigeon".to_string())
        );
    }

    #[test]
    fn remote_backend_needs_a_key() {
        let err = LlmManager::new(&config("remote"), None).err().unwrap();
        assert!(matches!(err, ServiceError::ConfigError(_)));
        assert!(LlmManager::new(&config("remote"), Some("sk-test".to_string())).is_ok());
    }

    #[test]
    fn ollama_backend_needs_no_key() {
        assert!(LlmManager::new(&config("ollama"), None).is_ok());
    }
}
