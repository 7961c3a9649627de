//! LLM integration for helper-bot.
//!
//! Supports:
//! - **OpenAI**: completions and embeddings via rig-core
//! - **Anthropic**: completions via rig-core (no embeddings API)
//!
//! Uses the rig-core crate for HTTP transport and the `RigAdapter` /
//! `RigEmbedder` wrappers to bridge rig's model traits to our own.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::{RigAdapter, RigEmbedder};

use std::sync::Arc;

use rig::client::{CompletionClient, EmbeddingsClient};
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

impl std::str::FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown backend '{other}' (expected openai or anthropic)")),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Configuration for creating an embedding provider (OpenAI only).
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
}

impl LlmBackend {
    /// Provider label used in logs and errors.
    pub fn provider_name(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }
}

/// Create an LLM provider from configuration.
///
/// rig clients accept any key at construction; a bad key only fails on
/// the first request.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::{anthropic, openai};

    let provider = config.backend.provider_name();
    let key = config.api_key.expose_secret();
    let llm: Arc<dyn LlmProvider> = match config.backend {
        LlmBackend::Anthropic => {
            let client: rig::client::Client<anthropic::client::AnthropicExt> =
                anthropic::Client::new(key).map_err(client_error(provider, false))?;
            Arc::new(RigAdapter::new(client.completion_model(&config.model), &config.model))
        }
        LlmBackend::OpenAi => {
            let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
                openai::Client::new(key).map_err(client_error(provider, false))?;
            Arc::new(RigAdapter::new(client.completion_model(&config.model), &config.model))
        }
    };

    tracing::info!(provider, model = %config.model, "LLM provider ready");
    Ok(llm)
}

/// Create an OpenAI embedding provider.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, LlmError> {
    use rig::providers::openai;

    let provider = LlmBackend::OpenAi.provider_name();
    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(client_error(provider, true))?;

    tracing::info!(provider, model = %config.model, "Embedding provider ready");
    Ok(Arc::new(RigEmbedder::new(
        client.embedding_model(&config.model),
        &config.model,
    )))
}

/// Maps a client construction failure onto the matching `LlmError`.
fn client_error<E: std::fmt::Display>(
    provider: &'static str,
    embeddings: bool,
) -> impl FnOnce(E) -> LlmError {
    move |e| {
        let provider = provider.to_string();
        let reason = format!("could not build {provider} client: {e}");
        if embeddings {
            LlmError::EmbeddingFailed { provider, reason }
        } else {
            LlmError::RequestFailed { provider, reason }
        }
    }
}
