//! Helper Bot: menu-driven assistant with an email composer and a
//! website Q&A helper, built on a persisted waterfall dialog engine.

pub mod bot;
pub mod channels;
pub mod commands;
pub mod config;
pub mod dialogs;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod retrieval;
pub mod store;
