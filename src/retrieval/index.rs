//! In-memory vector index. Ranking uses rig's `VectorDistance`.

use std::sync::Arc;

use async_trait::async_trait;
use rig::embeddings::Embedding;
use rig::embeddings::distance::VectorDistance;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Document, Embedder};
use crate::error::RetrievalError;
use crate::llm::EmbeddingProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    document: Document,
    embedding: Embedding,
}

/// Chunks paired with their rig embeddings. Serializable so it can live in
/// a dialog frame between turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Pair each chunk with its embedding. Counts must match.
    pub fn build(
        documents: Vec<Document>,
        embeddings: Vec<Vec<f64>>,
    ) -> Result<Self, RetrievalError> {
        if documents.len() != embeddings.len() {
            return Err(RetrievalError::Embedding {
                reason: format!(
                    "{} chunks but {} embeddings",
                    documents.len(),
                    embeddings.len()
                ),
            });
        }
        let entries = documents
            .into_iter()
            .zip(embeddings)
            .map(|(document, vec)| IndexEntry {
                embedding: Embedding {
                    document: document.text.clone(),
                    vec,
                },
                document,
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` chunks most similar to `query` by cosine similarity, best
    /// first. Equal scores keep insertion order, so the same query always
    /// yields the same chunks. Zero vectors score 0.
    pub fn top_matches(&self, query: &[f64], k: usize) -> Vec<&Document> {
        let query = Embedding {
            document: String::new(),
            vec: query.to_vec(),
        };
        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let score = query.cosine_similarity(&e.embedding, false);
                (i, if score.is_nan() { 0.0 } else { score })
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored
            .into_iter()
            .take(k)
            .map(|(i, _)| &self.entries[i].document)
            .collect()
    }
}

/// `Embedder` backed by an `EmbeddingProvider`.
pub struct ProviderEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    async fn embed_documents(&self, chunks: Vec<Document>) -> Result<VectorIndex, RetrievalError> {
        if chunks.is_empty() {
            return Ok(VectorIndex::default());
        }
        let texts = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .provider
            .embed(texts)
            .await
            .map_err(|e| RetrievalError::Embedding {
                reason: e.to_string(),
            })?;
        debug!(
            model = self.provider.model_name(),
            chunks = chunks.len(),
            "Embedded chunks"
        );
        VectorIndex::build(chunks, embeddings)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f64>, RetrievalError> {
        let mut embeddings = self
            .provider
            .embed(vec![query.to_string()])
            .await
            .map_err(|e| RetrievalError::Embedding {
                reason: e.to_string(),
            })?;
        embeddings.pop().ok_or_else(|| RetrievalError::Embedding {
            reason: "no embedding returned for query".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;

    fn index() -> VectorIndex {
        VectorIndex::build(
            vec![
                Document::new("north"),
                Document::new("east"),
                Document::new("also east"),
                Document::new("south"),
            ],
            vec![
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![2.0, 0.0],
                vec![0.0, -1.0],
            ],
        )
        .unwrap()
    }

    fn texts<'a>(docs: &[&'a Document]) -> Vec<&'a str> {
        docs.iter().map(|d| d.text.as_str()).collect()
    }

    #[test]
    fn zero_vectors_rank_below_matches() {
        let index = VectorIndex::build(
            vec![Document::new("blank"), Document::new("east")],
            vec![vec![0.0, 0.0], vec![1.0, 0.0]],
        )
        .unwrap();
        assert_eq!(texts(&index.top_matches(&[1.0, 0.0], 2)), vec!["east", "blank"]);
    }

    #[test]
    fn top_matches_ranks_and_breaks_ties_by_insertion() {
        let index = index();
        let top = index.top_matches(&[1.0, 0.1], 3);
        assert_eq!(texts(&top), vec!["east", "also east", "north"]);
    }

    #[test]
    fn top_matches_is_deterministic() {
        let index = index();
        let first = texts(&index.top_matches(&[0.5, 0.5], 2));
        let second = texts(&index.top_matches(&[0.5, 0.5], 2));
        assert_eq!(first, second);
    }

    #[test]
    fn k_larger_than_index_returns_all() {
        assert_eq!(index().top_matches(&[1.0, 0.0], 10).len(), 4);
        assert!(VectorIndex::default().top_matches(&[1.0], 3).is_empty());
    }

    #[test]
    fn build_rejects_count_mismatch() {
        let err = VectorIndex::build(vec![Document::new("a")], vec![]).unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding { .. }));
    }

    #[test]
    fn index_survives_json_round_trip() {
        let index = index();
        let json = serde_json::to_value(&index).unwrap();
        let back: VectorIndex = serde_json::from_value(json).unwrap();
        assert_eq!(back.len(), index.len());
        assert_eq!(
            texts(&back.top_matches(&[1.0, 0.1], 3)),
            texts(&index.top_matches(&[1.0, 0.1], 3))
        );
    }

    /// Embeds text as `[len, 1]`, or fails when asked to.
    struct LengthEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }

        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>, LlmError> {
            if self.fail {
                return Err(LlmError::EmbeddingFailed {
                    provider: "length".into(),
                    reason: "quota".into(),
                });
            }
            Ok(texts.iter().map(|t| vec![t.len() as f64, 1.0]).collect())
        }
    }

    #[tokio::test]
    async fn provider_embedder_builds_index() {
        let embedder = ProviderEmbedder::new(Arc::new(LengthEmbedder { fail: false }));
        let index = embedder
            .embed_documents(vec![Document::new("a"), Document::new("abcdef")])
            .await
            .unwrap();
        assert_eq!(index.len(), 2);

        let query = embedder.embed_query("abcdefg").await.unwrap();
        assert_eq!(query, vec![7.0, 1.0]);
        assert_eq!(texts(&index.top_matches(&query, 1)), vec!["abcdef"]);
    }

    #[tokio::test]
    async fn provider_failure_maps_to_embedding_error() {
        let embedder = ProviderEmbedder::new(Arc::new(LengthEmbedder { fail: true }));
        let err = embedder
            .embed_documents(vec![Document::new("a")])
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding { .. }));
    }
}
