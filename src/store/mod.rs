//! Persistence layer: libSQL-backed storage for dialog state and transcripts.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{ConversationMessage, Database};
