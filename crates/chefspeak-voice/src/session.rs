//! Per-session state: the loaded steps and where the cook is in them.
//!
//! Mutated only by [`crate::controller::TurnController`]; everything outside gets
//! read-only accessors.

use chefspeak_core::Language;
use chrono::{DateTime, Utc};

/// Last utterance heard, kept for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub heard_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    steps: Vec<String>,
    current_index: usize,
    listening: bool,
    speaking: bool,
    transcript: Option<Transcript>,
    language: Language,
}

impl Session {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            ..Self::default()
        }
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn has_steps(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Index of the current step; 0 before any steps exist.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_step(&self) -> Option<&str> {
        self.steps.get(self.current_index).map(String::as_str)
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn transcript(&self) -> Option<&Transcript> {
        self.transcript.as_ref()
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Replace the step list wholesale and rewind to the first step.
    /// An empty list leaves the current steps untouched and returns `false`.
    pub(crate) fn replace_steps(&mut self, steps: Vec<String>) -> bool {
        if steps.is_empty() {
            return false;
        }
        self.steps = steps;
        self.current_index = 0;
        true
    }

    /// Move to the next step. Returns `false` (index unchanged) at the last step.
    pub(crate) fn advance(&mut self) -> bool {
        if self.current_index + 1 < self.steps.len() {
            self.current_index += 1;
            true
        } else {
            false
        }
    }

    /// Move to the previous step, clamped at the first.
    pub(crate) fn retreat(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
    }

    /// Jump to `index` if it names a step.
    pub(crate) fn select(&mut self, index: usize) -> bool {
        if index < self.steps.len() {
            self.current_index = index;
            true
        } else {
            false
        }
    }

    pub(crate) fn set_listening(&mut self, listening: bool) {
        self.listening = listening;
    }

    pub(crate) fn set_speaking(&mut self, speaking: bool) {
        self.speaking = speaking;
    }

    pub(crate) fn record_transcript(&mut self, text: &str) {
        self.transcript = Some(Transcript {
            text: text.to_string(),
            heard_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(n: usize) -> Session {
        let mut session = Session::new(Language::English);
        session.replace_steps((1..=n).map(|i| format!("Step {}: do {}.", i, i)).collect());
        session
    }

    #[test]
    fn empty_replacement_keeps_previous_steps() {
        let mut session = loaded(3);
        session.advance();
        assert!(!session.replace_steps(Vec::new()));
        assert_eq!(session.steps().len(), 3);
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn replacement_rewinds_to_first_step() {
        let mut session = loaded(3);
        session.advance();
        session.advance();
        assert!(session.replace_steps(vec!["Step 1: new.".to_string()]));
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.current_step(), Some("Step 1: new."));
    }

    #[test]
    fn index_stays_in_bounds() {
        let mut session = loaded(2);
        for _ in 0..5 {
            session.advance();
        }
        assert_eq!(session.current_index(), 1);
        for _ in 0..5 {
            session.retreat();
        }
        assert_eq!(session.current_index(), 0);
        assert!(!session.select(2));
        assert!(session.select(1));
    }

    #[test]
    fn fresh_session_has_no_current_step() {
        let session = Session::new(Language::Hindi);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.current_step(), None);
        assert_eq!(session.language(), Language::Hindi);
    }
}
