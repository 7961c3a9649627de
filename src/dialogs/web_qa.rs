//! Website helper: load a page, index it, answer one question about it.
//!
//! Intermediate state (documents, chunks, the index) lives in the frame's
//! values, so a conversation can be persisted between the "ready" prompt and
//! the question.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::dialogs::context::StepContext;
use crate::dialogs::waterfall::{Dialog, StepResult};
use crate::error::{Error, RetrievalError};
use crate::retrieval::{AnswerGenerator, Document, Embedder, PageLoader, TextSplitter, VectorIndex};

pub const WEB_QA: &str = "web_qa";

const DOCUMENTS: &str = "documents";
const CHUNKS: &str = "chunks";
const INDEX: &str = "index";

const DEFAULT_TOP_K: usize = 4;

pub struct WebQaDialog {
    loader: Arc<dyn PageLoader>,
    splitter: Arc<dyn TextSplitter>,
    embedder: Arc<dyn Embedder>,
    answerer: Arc<dyn AnswerGenerator>,
    top_k: usize,
}

impl WebQaDialog {
    pub fn new(
        loader: Arc<dyn PageLoader>,
        splitter: Arc<dyn TextSplitter>,
        embedder: Arc<dyn Embedder>,
        answerer: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            loader,
            splitter,
            embedder,
            answerer,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Number of chunks handed to the answerer. Clamped to at least 1.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Tell the user what failed and end the dialog.
    async fn abandon(
        &self,
        ctx: &mut StepContext<'_>,
        message: &str,
        err: RetrievalError,
    ) -> Result<StepResult, Error> {
        warn!(conversation = ctx.turn.conversation(), step = ctx.index, error = %err, "Web Q&A step failed");
        ctx.send(format!("{message} {err}")).await?;
        Ok(StepResult::end())
    }

    async fn answer(&self, index: &VectorIndex, question: &str) -> Result<String, RetrievalError> {
        let query = self.embedder.embed_query(question).await?;
        let context: Vec<Document> = index
            .top_matches(&query, self.top_k)
            .into_iter()
            .cloned()
            .collect();
        self.answerer.answer(question, &context).await
    }
}

#[async_trait]
impl Dialog for WebQaDialog {
    fn id(&self) -> &'static str {
        WEB_QA
    }

    fn step_count(&self) -> usize {
        6
    }

    async fn run_step(&self, index: usize, ctx: &mut StepContext<'_>) -> Result<StepResult, Error> {
        match index {
            0 => Ok(StepResult::text_prompt("Please enter a valid url")),
            1 => {
                let url = ctx.text()?.to_string();
                info!(conversation = ctx.turn.conversation(), url = %url, "Loading page for Q&A");
                ctx.send("Loading webpage, give me some time.....").await?;
                match self.loader.load(&url).await {
                    Ok(documents) => {
                        ctx.set_value(DOCUMENTS, &documents)?;
                        Ok(StepResult::Next(None))
                    }
                    Err(e) => self.abandon(ctx, "Sorry, I couldn't load that webpage.", e).await,
                }
            }
            2 => {
                let documents: Vec<Document> = ctx.take_value(DOCUMENTS)?;
                let chunks = self.splitter.split_documents(&documents);
                if chunks.is_empty() {
                    let url = documents
                        .first()
                        .and_then(|d| d.metadata.get("source").cloned())
                        .unwrap_or_default();
                    return self
                        .abandon(
                            ctx,
                            "Sorry, I couldn't load that webpage.",
                            RetrievalError::EmptyContent { url },
                        )
                        .await;
                }
                ctx.send(format!("Page loaded and split into {} chunks.", chunks.len()))
                    .await?;
                ctx.set_value(CHUNKS, &chunks)?;
                Ok(StepResult::Next(None))
            }
            3 => {
                let chunks: Vec<Document> = ctx.take_value(CHUNKS)?;
                match self.embedder.embed_documents(chunks).await {
                    Ok(index) => {
                        ctx.send(format!("Search index built over {} chunks.", index.len()))
                            .await?;
                        ctx.set_value(INDEX, &index)?;
                        Ok(StepResult::Next(None))
                    }
                    Err(e) => self.abandon(ctx, "Sorry, I couldn't index that webpage.", e).await,
                }
            }
            4 => Ok(StepResult::text_prompt("Ready, type your question")),
            _ => {
                let question = ctx.text()?.to_string();
                let index: VectorIndex = ctx.take_value(INDEX)?;
                match self.answer(&index, &question).await {
                    Ok(answer) => {
                        ctx.send(answer).await?;
                        Ok(StepResult::end())
                    }
                    Err(e) => self.abandon(ctx, "Sorry, I couldn't answer that question.", e).await,
                }
            }
        }
    }
}
