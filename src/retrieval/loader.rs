//! Web page loader: fetches a URL and reduces its HTML to readable text.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use tracing::{debug, info};

use super::{Document, PageLoader};
use crate::error::RetrievalError;

static INVISIBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>|<noscript\b[^>]*>.*?</noscript>|<head\b[^>]*>.*?</head>|<!--.*?-->",
    )
    .unwrap()
});

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title>").unwrap());

static BLOCK_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</?(p|div|br|li|ul|ol|h[1-6]|tr|table|section|article|header|footer|nav|main|aside|blockquote|pre|hr)\b[^>]*>",
    )
    .unwrap()
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Loads one page per URL into a single document with `source` and, when
/// present, `title` metadata.
pub struct WebPageLoader {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebPageLoader {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    fn page_error(url: &str, reason: impl ToString) -> RetrievalError {
        RetrievalError::PageLoad {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl PageLoader for WebPageLoader {
    async fn load(&self, url: &str) -> Result<Vec<Document>, RetrievalError> {
        let parsed = Url::parse(url.trim()).map_err(|e| Self::page_error(url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Self::page_error(url, "only http and https URLs are supported"));
        }

        info!(url = %parsed, "Fetching page");
        let response = self
            .client
            .get(parsed.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::page_error(url, e))?
            .error_for_status()
            .map_err(|e| Self::page_error(url, e))?;
        let html = response.text().await.map_err(|e| Self::page_error(url, e))?;

        let text = html_to_text(&html);
        if text.is_empty() {
            return Err(RetrievalError::EmptyContent {
                url: url.to_string(),
            });
        }
        debug!(url = %parsed, bytes = html.len(), chars = text.chars().count(), "Page converted to text");

        let mut document = Document::new(text).with_metadata("source", parsed.as_str());
        if let Some(title) = page_title(&html) {
            document = document.with_metadata("title", title);
        }
        Ok(vec![document])
    }
}

/// Text of the `<title>` element, if any.
pub fn page_title(html: &str) -> Option<String> {
    let raw = TITLE.captures(html)?.get(1)?.as_str();
    let title = collapse_spaces(&decode_entities(raw));
    (!title.is_empty()).then_some(title)
}

/// Reduce HTML to text. Block-level elements become line breaks, invisible
/// elements are dropped, entities for common characters are decoded.
pub fn html_to_text(html: &str) -> String {
    let visible = INVISIBLE.replace_all(html, " ");
    let broken = BLOCK_BOUNDARY.replace_all(&visible, "\n");
    let stripped = TAG.replace_all(&broken, "");
    let decoded = decode_entities(&stripped);

    decoded
        .lines()
        .map(collapse_spaces)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_spaces(line: &str) -> String {
    SPACES.replace_all(line, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
