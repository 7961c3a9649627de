//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{EmbeddingConfig, LlmBackend, LlmConfig};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DB_PATH: &str = "./data/helper-bot.db";

/// Retrieval tuning for the Web Q&A dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub fetch_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Telegram long-poll channel settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub allowed_users: Vec<String>,
}

/// Bot configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub llm: LlmConfig,
    /// Present only when Web Q&A is enabled.
    pub embedding: Option<EmbeddingConfig>,
    pub retrieval: RetrievalConfig,
    pub db_path: PathBuf,
    pub transcripts: bool,
    pub ws_port: Option<u16>,
    pub telegram: Option<TelegramConfig>,
    pub log_dir: Option<PathBuf>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend: LlmBackend = parse_or(&get, "HELPER_BOT_BACKEND", LlmBackend::OpenAi)?;
        let (key_var, default_model) = match backend {
            LlmBackend::OpenAi => ("OPENAI_API_KEY", DEFAULT_OPENAI_MODEL),
            LlmBackend::Anthropic => ("ANTHROPIC_API_KEY", DEFAULT_ANTHROPIC_MODEL),
        };
        let api_key = get(key_var).ok_or_else(|| ConfigError::MissingRequired {
            key: key_var.to_string(),
            hint: format!("Set it to use the {backend:?} backend."),
        })?;
        let llm = LlmConfig {
            backend,
            api_key: SecretString::from(api_key),
            model: get("HELPER_BOT_MODEL").unwrap_or_else(|| default_model.to_string()),
        };

        let web_qa = parse_bool(&get, "HELPER_BOT_WEB_QA", false)?;
        let embedding = if web_qa {
            let key = get("OPENAI_API_KEY").ok_or_else(|| ConfigError::MissingRequired {
                key: "OPENAI_API_KEY".to_string(),
                hint: "Web Q&A uses OpenAI embeddings.".to_string(),
            })?;
            Some(EmbeddingConfig {
                api_key: SecretString::from(key),
                model: get("HELPER_BOT_EMBEDDING_MODEL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            })
        } else {
            None
        };

        let defaults = RetrievalConfig::default();
        let retrieval = RetrievalConfig {
            chunk_size: parse_or(&get, "HELPER_BOT_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_or(&get, "HELPER_BOT_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: parse_or(&get, "HELPER_BOT_TOP_K", defaults.top_k)?,
            fetch_timeout: Duration::from_secs(parse_or(
                &get,
                "HELPER_BOT_FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )?),
        };
        if retrieval.chunk_size == 0 || retrieval.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "HELPER_BOT_CHUNK_SIZE/HELPER_BOT_TOP_K".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let telegram = get("TELEGRAM_BOT_TOKEN").map(|bot_token| TelegramConfig {
            bot_token,
            allowed_users: get("TELEGRAM_ALLOWED_USERS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        });

        Ok(Self {
            llm,
            embedding,
            retrieval,
            db_path: get("HELPER_BOT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            transcripts: parse_bool(&get, "HELPER_BOT_TRANSCRIPTS", true)?,
            ws_port: get("HELPER_BOT_WS_PORT")
                .map(|v| parse_value("HELPER_BOT_WS_PORT", &v))
                .transpose()?,
            telegram,
            log_dir: get("HELPER_BOT_LOG_DIR").map(PathBuf::from),
        })
    }

    pub fn web_qa_enabled(&self) -> bool {
        self.embedding.is_some()
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_bool(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}
