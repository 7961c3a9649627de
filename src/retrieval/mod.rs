//! Collaborators behind the Web Q&A dialog: page loading, splitting,
//! embedding into an in-memory index, and answer generation.

mod answer;
mod index;
mod loader;
mod splitter;

pub use answer::StuffDocumentsAnswerer;
pub use index::{ProviderEmbedder, VectorIndex};
pub use loader::{WebPageLoader, html_to_text};
pub use splitter::RecursiveCharacterSplitter;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A piece of text with string metadata (`source`, `title`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Fetches a URL and turns it into documents.
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<Vec<Document>, RetrievalError>;
}

/// Splits documents into smaller, ordered, non-empty chunks.
pub trait TextSplitter: Send + Sync {
    fn split_documents(&self, documents: &[Document]) -> Vec<Document>;
}

/// Embeds chunks into a searchable index and embeds queries against it.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_documents(&self, chunks: Vec<Document>) -> Result<VectorIndex, RetrievalError>;

    async fn embed_query(&self, query: &str) -> Result<Vec<f64>, RetrievalError>;
}

/// Produces an answer to a question from context chunks.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer(&self, question: &str, context: &[Document]) -> Result<String, RetrievalError>;
}
