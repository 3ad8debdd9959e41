//! chefspeak-core: recipe step extraction, chat-completion client, user profiles and configuration.
//!
//! Everything here is free of speech I/O; the turn-taking state machine lives in `chefspeak-voice`.

pub mod chat;
pub mod config;
mod error;
pub mod language;
pub mod profile;
pub mod prompts;
pub mod recipe;
pub mod steps;

pub use chat::{ChatCompletion, ChatError, ChatMessage, OpenAiChat};
pub use config::{AssistantConfig, ChatSettings, ProfileSettings, SpeechSettings, TtsBackendKind, TtsSettings};
pub use error::{CoreError, CoreResult};
pub use language::Language;
pub use profile::{resolve_language, ProfileStore, SledProfileStore, UserProfile};
pub use recipe::{RecipeClient, RecipeSource};
pub use steps::{parse_steps, StepFormat};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
