//! Prompt text sent to the chat model for a dish query.

use crate::chat::ChatMessage;
use crate::language::Language;

/// Default upper bound on the number of steps requested.
pub const DEFAULT_MAX_STEPS: usize = 15;

pub fn system_prompt(language: Language) -> String {
    format!(
        "You are a multilingual professional chef assistant. Always give clear, numbered steps \
         in the user's preferred language: {}.",
        language
    )
}

pub fn recipe_request(dish: &str, language: Language, max_steps: usize) -> String {
    format!(
        "Give me a numbered list of clear step-by-step instructions only (no ingredients) for \"{}\". \
         Use one list with Step 1, Step 2, ... format. Max {} steps. Respond only in {}.",
        dish.trim(),
        max_steps.max(1),
        language
    )
}

/// System + user messages for one recipe request.
pub fn recipe_messages(dish: &str, language: Language, max_steps: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(language)),
        ChatMessage::user(recipe_request(dish, language, max_steps)),
    ]
}
