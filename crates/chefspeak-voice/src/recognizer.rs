//! **Speech recognition**: the listening half of a turn.
//!
//! A recognizer is started for one utterance at a time and reports back through a
//! `RecognitionEvent` channel: `Started`, then either `Result` or `Error`, then `Ended`.
//! Every event carries the session id it was started with, so callbacks that
//! arrive after an abort can be told apart from the next session's.
//! Implement `SpeechRecognizer` for a platform recognizer; `LineRecognizer` takes typed lines.

use crate::error::{VoiceError, VoiceResult};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

/// Identifies one recognition session.
pub type RecognitionId = u64;

/// Settings for one recognition session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    /// BCP-47 language tag (e.g. `en-IN`).
    pub language: String,
    /// Always false: only final results are delivered.
    pub interim_results: bool,
    pub max_alternatives: u32,
}

impl RecognitionConfig {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            interim_results: false,
            max_alternatives: 1,
        }
    }
}

/// Error codes a recognizer can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorCode {
    /// Session aborted on request. Expected; never shown to the user.
    Aborted,
    NoSpeech,
    AudioCapture,
    Network,
    NotAllowed,
    LanguageNotSupported,
    Other(String),
}

impl RecognitionErrorCode {
    /// Map a platform error string (`"no-speech"`, `"aborted"`, ...) to a code.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "aborted" => Self::Aborted,
            "no-speech" => Self::NoSpeech,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            "not-allowed" | "service-not-allowed" => Self::NotAllowed,
            "language-not-supported" => Self::LanguageNotSupported,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl fmt::Display for RecognitionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted => f.write_str("aborted"),
            Self::NoSpeech => f.write_str("no-speech"),
            Self::AudioCapture => f.write_str("audio-capture"),
            Self::Network => f.write_str("network"),
            Self::NotAllowed => f.write_str("not-allowed"),
            Self::LanguageNotSupported => f.write_str("language-not-supported"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Lifecycle callbacks of a recognition session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Started(RecognitionId),
    /// Final transcript of the utterance.
    Result(RecognitionId, String),
    Error(RecognitionId, RecognitionErrorCode),
    Ended(RecognitionId),
}

/// A speech recognizer. Results arrive on the event channel handed to the implementation.
pub trait SpeechRecognizer: Send {
    /// Begin listening for one utterance, tagging its events with `session`.
    /// Errors if a session is already running.
    fn start(&mut self, session: RecognitionId, config: &RecognitionConfig) -> VoiceResult<()>;

    /// Stop listening; a pending utterance is discarded.
    fn stop(&mut self);

    /// Abort listening. Reports `RecognitionErrorCode::Aborted`.
    fn abort(&mut self);
}

struct LineShared {
    armed: Mutex<Option<(RecognitionId, RecognitionConfig)>>,
    events: mpsc::UnboundedSender<RecognitionEvent>,
}

impl LineShared {
    fn disarm(&self) -> Option<RecognitionId> {
        self.armed
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
            .map(|(session, _)| session)
    }

    fn emit(&self, event: RecognitionEvent) {
        let _ = self.events.send(event);
    }
}

/// Recognizer fed with typed lines (terminal front end, tests).
///
/// A line only counts as speech while the recognizer is started; each started
/// session consumes exactly one line.
pub struct LineRecognizer {
    shared: Arc<LineShared>,
}

/// Producer side of a [`LineRecognizer`].
#[derive(Clone)]
pub struct LineFeed {
    shared: Arc<LineShared>,
}

impl LineRecognizer {
    pub fn new(events: mpsc::UnboundedSender<RecognitionEvent>) -> (Self, LineFeed) {
        let shared = Arc::new(LineShared {
            armed: Mutex::new(None),
            events,
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            LineFeed { shared },
        )
    }
}

impl SpeechRecognizer for LineRecognizer {
    fn start(&mut self, session: RecognitionId, config: &RecognitionConfig) -> VoiceResult<()> {
        let mut armed = self
            .shared
            .armed
            .lock()
            .map_err(|e| VoiceError::Recognizer(format!("recognizer lock poisoned: {}", e)))?;
        if armed.is_some() {
            return Err(VoiceError::Recognizer("recognition already started".to_string()));
        }
        *armed = Some((session, config.clone()));
        drop(armed);
        debug!(session, language = %config.language, "line recognizer listening");
        self.shared.emit(RecognitionEvent::Started(session));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(session) = self.shared.disarm() {
            self.shared.emit(RecognitionEvent::Ended(session));
        }
    }

    fn abort(&mut self) {
        if let Some(session) = self.shared.disarm() {
            self.shared
                .emit(RecognitionEvent::Error(session, RecognitionErrorCode::Aborted));
            self.shared.emit(RecognitionEvent::Ended(session));
        }
    }
}

impl LineFeed {
    /// Deliver a line as the final result. Returns `false` (line dropped) when not listening.
    pub fn deliver(&self, line: &str) -> bool {
        match self.shared.disarm() {
            Some(session) => {
                self.shared
                    .emit(RecognitionEvent::Result(session, line.trim().to_string()));
                self.shared.emit(RecognitionEvent::Ended(session));
                true
            }
            None => false,
        }
    }

    /// Report a recognition failure for the running session (e.g. microphone lost).
    pub fn fail(&self, code: RecognitionErrorCode) -> bool {
        match self.shared.disarm() {
            Some(session) => {
                self.shared.emit(RecognitionEvent::Error(session, code));
                self.shared.emit(RecognitionEvent::Ended(session));
                true
            }
            None => false,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.shared
            .armed
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<RecognitionEvent>) -> Vec<RecognitionEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn one_line_per_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut recognizer, feed) = LineRecognizer::new(tx);

        assert!(!feed.deliver("ignored"));
        recognizer.start(7, &RecognitionConfig::new("en-IN")).unwrap();
        assert!(feed.is_listening());
        assert!(feed.deliver("  Next "));
        assert!(!feed.deliver("second"));

        assert_eq!(
            drain(&mut rx),
            vec![
                RecognitionEvent::Started(7),
                RecognitionEvent::Result(7, "Next".to_string()),
                RecognitionEvent::Ended(7)
            ]
        );
    }

    #[test]
    fn double_start_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (mut recognizer, _feed) = LineRecognizer::new(tx);
        recognizer.start(1, &RecognitionConfig::new("en-US")).unwrap();
        assert!(recognizer.start(2, &RecognitionConfig::new("en-US")).is_err());
    }

    #[test]
    fn abort_reports_aborted_code() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut recognizer, feed) = LineRecognizer::new(tx);
        recognizer.abort();
        assert!(drain(&mut rx).is_empty());

        recognizer.start(3, &RecognitionConfig::new("en-US")).unwrap();
        recognizer.abort();
        assert!(!feed.is_listening());
        recognizer.start(4, &RecognitionConfig::new("en-US")).unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![
                RecognitionEvent::Started(3),
                RecognitionEvent::Error(3, RecognitionErrorCode::Aborted),
                RecognitionEvent::Ended(3),
                RecognitionEvent::Started(4)
            ]
        );
    }

    #[test]
    fn stop_ends_without_a_result() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut recognizer, feed) = LineRecognizer::new(tx);
        recognizer.start(1, &RecognitionConfig::new("ta-IN")).unwrap();
        recognizer.stop();
        assert!(!feed.deliver("too late"));
        assert_eq!(
            drain(&mut rx),
            vec![RecognitionEvent::Started(1), RecognitionEvent::Ended(1)]
        );
    }

    #[test]
    fn fail_reports_code_for_running_session_only() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut recognizer, feed) = LineRecognizer::new(tx);
        assert!(!feed.fail(RecognitionErrorCode::NoSpeech));
        recognizer.start(2, &RecognitionConfig::new("hi-IN")).unwrap();
        assert!(feed.fail(RecognitionErrorCode::NoSpeech));
        assert_eq!(
            drain(&mut rx),
            vec![
                RecognitionEvent::Started(2),
                RecognitionEvent::Error(2, RecognitionErrorCode::NoSpeech),
                RecognitionEvent::Ended(2)
            ]
        );
    }

    #[test]
    fn platform_codes_round_trip_through_display() {
        for code in ["aborted", "no-speech", "audio-capture", "network", "not-allowed"] {
            assert_eq!(RecognitionErrorCode::from_code(code).to_string(), code);
        }
        assert!(RecognitionErrorCode::from_code("aborted").is_abort());
        assert_eq!(
            RecognitionErrorCode::from_code("bad-grammar"),
            RecognitionErrorCode::Other("bad-grammar".to_string())
        );
    }
}
