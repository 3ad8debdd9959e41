//! Error types for chefspeak-core

use crate::chat::ChatError;
use thiserror::Error;

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by configuration, profile storage and the chat client
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Chat completion error: {0}")]
    Chat(#[from] ChatError),

    #[error("Profile store error: {0}")]
    ProfileStore(#[from] sled::Error),

    #[error("Profile record is not valid JSON: {0}")]
    ProfileRecord(#[from] serde_json::Error),

    #[error("No chat API key configured (set chat.api_key, CHEFSPEAK_CHAT__API_KEY or OPENAI_API_KEY)")]
    MissingApiKey,
}
