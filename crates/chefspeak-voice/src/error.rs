//! Error types for the ChefSpeak voice layer

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors raised by recognizers, synthesizers and TTS backends
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Recognizer error: {0}")]
    Recognizer(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
