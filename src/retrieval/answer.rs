//! "Stuff documents" answering: every context chunk goes into one prompt.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{AnswerGenerator, Document};
use crate::error::RetrievalError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::prompts::WEB_ANSWER;

/// Answers must stick to the retrieved context.
const ANSWER_TEMPERATURE: f32 = 0.0;

pub struct StuffDocumentsAnswerer {
    llm: Arc<dyn LlmProvider>,
}

impl StuffDocumentsAnswerer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AnswerGenerator for StuffDocumentsAnswerer {
    async fn answer(&self, question: &str, context: &[Document]) -> Result<String, RetrievalError> {
        let joined = context
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = WEB_ANSWER
            .render(&[("context", joined.as_str()), ("input", question)])
            .map_err(|e| RetrievalError::Generation {
                reason: e.to_string(),
            })?;

        debug!(
            model = self.llm.model_name(),
            chunks = context.len(),
            "Generating answer"
        );
        let response = self
            .llm
            .complete(
                CompletionRequest::new(vec![ChatMessage::user(prompt)])
                    .with_temperature(ANSWER_TEMPERATURE),
            )
            .await
            .map_err(|e| RetrievalError::Generation {
                reason: e.to_string(),
            })?;
        Ok(response.content.trim().to_string())
    }
}
