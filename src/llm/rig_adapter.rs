//! Bridges rig-core models to our `LlmProvider` / `EmbeddingProvider` traits.

use async_trait::async_trait;
use rig::agent::AgentBuilder;
use rig::completion::{CompletionModel, Prompt};
use rig::embeddings::EmbeddingModel;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, EmbeddingProvider, LlmProvider};

/// Wraps a rig `CompletionModel`.
///
/// A throwaway rig agent is built per request so the system prompt and
/// sampling settings can vary between calls on the same model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Clone + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut builder = AgentBuilder::new(self.model.clone());
        if let Some(preamble) = request.system_prompt() {
            builder = builder.preamble(&preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        let agent = builder.build();

        let prompt = request.conversation_prompt();
        tracing::debug!(model = %self.model_name, chars = prompt.len(), "LLM completion");

        let content = agent
            .prompt(prompt.as_str())
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.model_name.clone(),
                reason: e.to_string(),
            })?;

        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "empty completion".to_string(),
            });
        }

        Ok(CompletionResponse { content })
    }
}

/// Wraps a rig `EmbeddingModel`, batching requests to the model's limit.
pub struct RigEmbedder<E> {
    model: E,
    model_name: String,
}

impl<E: EmbeddingModel> RigEmbedder<E> {
    pub fn new(model: E, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<E> EmbeddingProvider for RigEmbedder<E>
where
    E: EmbeddingModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>, LlmError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(E::MAX_DOCUMENTS.max(1)) {
            let embeddings = self
                .model
                .embed_texts(batch.to_vec())
                .await
                .map_err(|e| LlmError::EmbeddingFailed {
                    provider: self.model_name.clone(),
                    reason: e.to_string(),
                })?;
            if embeddings.len() != batch.len() {
                return Err(LlmError::InvalidResponse {
                    provider: self.model_name.clone(),
                    reason: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embeddings.len()
                    ),
                });
            }
            vectors.extend(embeddings.into_iter().map(|e| e.vec));
        }
        Ok(vectors)
    }
}
