//! Error types for helper-bot.

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Dialog error: {0}")]
    Dialog(#[from] DialogError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("No channel registered under {name}")]
    UnknownChannel { name: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Embedding request to {provider} failed: {reason}")]
    EmbeddingFailed { provider: String, reason: String },
}

/// Dialog engine errors. All of these are programming or state errors;
/// an unmatched choice is not an error and is re-prompted instead.
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    #[error("Dialog {id} is not registered")]
    UnknownDialog { id: String },

    #[error("Dialog {dialog} was begun with malformed options: {reason}")]
    MalformedOptions { dialog: String, reason: String },

    #[error("Duplicate choice value: {value}")]
    DuplicateChoice { value: String },

    #[error("Step {step} of {dialog} expected {expected} input")]
    UnexpectedInput {
        dialog: String,
        step: usize,
        expected: &'static str,
    },

    #[error("Dialog {dialog} is not waiting for input")]
    NotWaiting { dialog: String },

    #[error("Frame state {key} of {dialog} is unusable: {reason}")]
    State {
        dialog: String,
        key: String,
        reason: String,
    },
}

/// Errors from the retrieval collaborators used by the Web Q&A dialog.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Failed to load {url}: {reason}")]
    PageLoad { url: String, reason: String },

    #[error("Page {url} has no readable text")]
    EmptyContent { url: String },

    #[error("Embedding failed: {reason}")]
    Embedding { reason: String },

    #[error("Answer generation failed: {reason}")]
    Generation { reason: String },
}

/// Prompt template rendering errors.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Template {template} is missing a value for {{{variable}}}")]
    MissingVariable { template: String, variable: String },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
