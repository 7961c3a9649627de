//! Recursive character splitter.
//!
//! Tries coarse separators first (paragraphs, lines, words) and only falls
//! back to finer ones for pieces that are still too long, then merges the
//! pieces back up to `chunk_size` characters with `chunk_overlap` characters
//! carried over between neighbouring chunks.

use tracing::debug;

use super::{Document, TextSplitter};

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveCharacterSplitter {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

impl RecursiveCharacterSplitter {
    /// Overlap is clamped below the chunk size; a zero chunk size becomes 1.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split a single text into ordered, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).map(String::as_str).unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut short = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                short.push(piece);
                continue;
            }
            if !short.is_empty() {
                chunks.extend(self.merge(&short, separator));
                short.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }
        if !short.is_empty() {
            chunks.extend(self.merge(&short, separator));
        }
        chunks
    }

    /// Greedily pack pieces into chunks, keeping a tail of at most
    /// `chunk_overlap` characters from the previous chunk.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joined = |window: &Vec<&str>| if window.is_empty() { 0 } else { sep_len };

            if total + len + joined(&window) > self.chunk_size {
                if let Some(chunk) = join_trimmed(&window, separator) {
                    chunks.push(chunk);
                }
                while !window.is_empty()
                    && (total > self.chunk_overlap
                        || total + len + joined(&window) > self.chunk_size)
                {
                    let dropped = char_len(window[0]) + if window.len() > 1 { sep_len } else { 0 };
                    total = total.saturating_sub(dropped);
                    window.remove(0);
                }
            }

            total += len + joined(&window);
            window.push(piece);
        }

        if let Some(chunk) = join_trimmed(&window, separator) {
            chunks.push(chunk);
        }
        chunks
    }
}

impl TextSplitter for RecursiveCharacterSplitter {
    fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        let mut out = Vec::new();
        for document in documents {
            for text in self.split_text(&document.text) {
                out.push(Document {
                    text,
                    metadata: document.metadata.clone(),
                });
            }
        }
        debug!(
            documents = documents.len(),
            chunks = out.len(),
            chunk_size = self.chunk_size,
            "Split documents"
        );
        out
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_trimmed(window: &[&str], separator: &str) -> Option<String> {
    let joined = window.join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
