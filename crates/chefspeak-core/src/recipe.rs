//! Dish query → model reply.

use async_trait::async_trait;
use tracing::info;

use crate::chat::{ChatCompletion, ChatError};
use crate::config::ChatSettings;
use crate::language::Language;
use crate::prompts::{self, DEFAULT_MAX_STEPS};

/// Produces the raw reply text for a spoken dish query.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    async fn fetch_recipe(&self, query: &str, language: Language) -> Result<String, ChatError>;
}

/// Recipe source backed by any chat completion endpoint.
pub struct RecipeClient<C> {
    chat: C,
    temperature: f32,
    max_steps: usize,
}

impl<C: ChatCompletion> RecipeClient<C> {
    pub fn new(chat: C) -> Self {
        Self {
            chat,
            temperature: 0.7,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn from_settings(chat: C, settings: &ChatSettings) -> Self {
        Self {
            chat,
            temperature: settings.temperature,
            max_steps: settings.max_steps,
        }
    }
}

#[async_trait]
impl<C: ChatCompletion> RecipeSource for RecipeClient<C> {
    async fn fetch_recipe(&self, query: &str, language: Language) -> Result<String, ChatError> {
        info!(query, %language, "requesting recipe steps");
        let messages = prompts::recipe_messages(query, language, self.max_steps);
        self.chat.complete(&messages, self.temperature).await
    }
}
