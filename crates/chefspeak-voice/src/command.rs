//! Utterance classification: navigation command or new dish query.

use once_cell::sync::Lazy;
use regex::Regex;

static NEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnext\b").expect("next pattern"));
static PREVIOUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(previous|back)\b").expect("previous pattern"));
static REPEAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\brepeat\b").expect("repeat pattern"));

/// What a recognized utterance asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    Repeat,
    /// Anything else: a dish to look up (lower-cased, trimmed).
    Query(String),
}

/// Classify an utterance. Keywords are tried in priority order
/// next → previous/back → repeat. Blank input yields `None`.
pub fn classify(utterance: &str) -> Option<Command> {
    let text = utterance.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }
    let command = if NEXT.is_match(&text) {
        Command::Next
    } else if PREVIOUS.is_match(&text) {
        Command::Previous
    } else if REPEAT.is_match(&text) {
        Command::Repeat
    } else {
        Command::Query(text)
    };
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_map_to_navigation() {
        assert_eq!(classify("Next"), Some(Command::Next));
        assert_eq!(classify("go back please"), Some(Command::Previous));
        assert_eq!(classify("previous step"), Some(Command::Previous));
        assert_eq!(classify("can you repeat that"), Some(Command::Repeat));
    }

    #[test]
    fn next_wins_over_later_keywords() {
        assert_eq!(classify("repeat the next one"), Some(Command::Next));
        assert_eq!(classify("back, no, repeat"), Some(Command::Previous));
    }

    #[test]
    fn other_text_is_a_query() {
        assert_eq!(
            classify("  Paneer Butter Masala "),
            Some(Command::Query("paneer butter masala".to_string()))
        );
        assert_eq!(classify("backed potatoes"), Some(Command::Query("backed potatoes".to_string())));
        assert_eq!(classify("   "), None);
    }
}
