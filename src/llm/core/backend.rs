//! Backend trait for chat model adapters

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::{
    arguments::ApiArgs,
    config::GenerationConfig,
    error::BackendError,
    types::{BackendStream, Message},
};
use crate::llm::openai::OpenAiCompatibleClient;

/// Minimal capability every chat model adapter must provide
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send a message history to the model
    ///
    /// Always returns a stream of text chunks. When `stream` is false the
    /// stream holds exactly one chunk with the whole completion; adapters for
    /// backends without native streaming must do the same when `stream` is true.
    ///
    /// # Arguments
    /// * `messages` - Ordered, role-tagged history
    /// * `stream` - Whether incremental delivery is requested
    /// * `api` - Backend call options, passed through untouched
    async fn send(
        &self,
        messages: Vec<Message>,
        stream: bool,
        api: &ApiArgs,
    ) -> Result<BackendStream, BackendError>;
}

#[async_trait]
impl<B: ChatBackend + ?Sized> ChatBackend for Box<B> {
    async fn send(
        &self,
        messages: Vec<Message>,
        stream: bool,
        api: &ApiArgs,
    ) -> Result<BackendStream, BackendError> {
        (**self).send(messages, stream, api).await
    }
}

/// Hosted chat-completion services reachable through an OpenAI-compatible API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Cerebras,
    Groq,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAi, Provider::Cerebras, Provider::Groq];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Cerebras => "cerebras",
            Provider::Groq => "groq",
        }
    }

    /// Model used when none is specified
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Cerebras => "llama-3.3-70b",
            Provider::Groq => "llama-3.3-70b-versatile",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Cerebras => "https://api.cerebras.ai/v1",
            Provider::Groq => "https://api.groq.com/openai/v1",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Cerebras => "CEREBRAS_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| {
                BackendError::InvalidRequest(format!(
                    "Unsupported provider: {s}. Supported providers are: openai, cerebras, groq"
                ))
            })
    }
}

/// Connection settings for an OpenAI-compatible backend
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Defaults applied beneath per-query API arguments
    pub generation: GenerationConfig,
}

impl BackendSettings {
    /// Settings with the provider's default model and endpoint
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            api_key: api_key.into(),
            base_url: provider.base_url().to_string(),
            connect_timeout: Duration::from_secs(5),
            generation: GenerationConfig::default(),
        }
    }

    /// Read the API key from the provider's environment variable
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationError` when the variable is unset or empty.
    pub fn from_env(provider: Provider) -> Result<Self, BackendError> {
        let var = provider.api_key_var();
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(provider, key)),
            _ => Err(BackendError::AuthenticationError(format!(
                "{var} is not set"
            ))),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }
}

/// Create a chat backend for a provider
///
/// # Arguments
///
/// * `provider` - Which hosted service to talk to
/// * `model` - Model identifier; the provider default when `None`
///
/// # Example
///
/// ```rust,no_run
/// use llm_wrappers::llm::{create_backend, Provider};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = create_backend(Provider::Groq, None)?;
/// # Ok(())
/// # }
/// ```
pub fn create_backend(
    provider: Provider,
    model: Option<String>,
) -> Result<Box<dyn ChatBackend>, BackendError> {
    let mut settings = BackendSettings::from_env(provider)?;
    if let Some(model) = model {
        settings = settings.with_model(model);
    }
    Ok(Box::new(OpenAiCompatibleClient::new(settings)?))
}
