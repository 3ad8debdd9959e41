//! # ChefSpeak Voice - hands-free step navigation
//!
//! Turn-taking for the recipe assistant: listen for a dish or a navigation command,
//! fetch and parse steps, speak the current step, then listen again.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     AssistantRuntime (one task)               │
//! │  ┌──────────────┐   Input    ┌────────────────┐   Effect      │
//! │  │ Recognizer   │──────────→ │ TurnController │──────────┐    │
//! │  │ Synthesizer  │            │   + Session    │          │    │
//! │  │ Timers/Chat  │←───────────┴────────────────┘ executes─┘    │
//! │  └──────────────┘                                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod command;
pub mod controller;
pub mod error;
pub mod recognizer;
pub mod runtime;
pub mod session;
pub mod synthesizer;
pub mod tts;

pub use command::{classify, Command};
pub use controller::{ControllerConfig, Effect, Input, Notice, RequestId, Ticket, TurnController, TurnState};
pub use error::{VoiceError, VoiceResult};
pub use recognizer::{
    LineFeed, LineRecognizer, RecognitionConfig, RecognitionErrorCode, RecognitionEvent, RecognitionId,
    SpeechRecognizer,
};
pub use runtime::{AssistantRuntime, UserCommand};
pub use session::{Session, Transcript};
pub use synthesizer::{ConsoleSynthesizer, SpeechSynthesizer, SynthesisEvent, Utterance};
pub use tts::{AudioSynthesizer, OpenAiTts, PlayerCommand, SpeakEndpointTts, TtsBackend};
