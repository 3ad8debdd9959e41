//! Speech-turn controller
//!
//! Pure state machine for the hands-free loop:
//!
//! ```text
//! Idle ─start→ Listening ─utterance→ Processing ─steps→ Speaking ─end→ AwaitingNextTurn ─delay→ Listening
//!                  │                                        ↑
//!                  └────────── next / back / repeat ────────┘
//! ```
//!
//! `handle` takes one input and returns the effects to execute, in order. The
//! controller never calls a collaborator itself; [`crate::runtime::AssistantRuntime`]
//! does, and feeds callbacks back as inputs.
//!
//! Speaking is two-phase. A speak request cancels whatever is playing, then
//! schedules a `SpeakDue` after the settle delay. Only the newest ticket turns into
//! a `Speak` effect, and the step text is read from the session at that moment.
//!
//! Recognition sessions are numbered the same way. Callbacks from a session
//! other than the current one (a late `Ended` after an abort) are dropped.

use crate::command::{classify, Command};
use crate::recognizer::{RecognitionConfig, RecognitionErrorCode, RecognitionId};
use crate::session::Session;
use crate::synthesizer::Utterance;
use chefspeak_core::{parse_steps, Language, SpeechSettings, StepFormat};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identifies one speak or restart request. Stale tickets are ignored.
pub type Ticket = u64;

/// Identifies one chat request.
pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Listening,
    /// Waiting for the model reply.
    Processing,
    Speaking,
    /// Speech finished; recognition restarts after the restart delay.
    AwaitingNextTurn,
}

/// Timing and voice settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub settle_delay: Duration,
    pub restart_delay: Duration,
    pub rate: f32,
    pub command_language: String,
    pub synthesis_language: Option<String>,
    pub step_format: StepFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(250),
            restart_delay: Duration::from_millis(400),
            rate: 1.0,
            command_language: "en-US".to_string(),
            synthesis_language: None,
            step_format: StepFormat::Auto,
        }
    }
}

impl From<&SpeechSettings> for ControllerConfig {
    fn from(settings: &SpeechSettings) -> Self {
        Self {
            settle_delay: settings.settle_delay(),
            restart_delay: settings.restart_delay(),
            rate: settings.rate,
            command_language: settings.command_language.clone(),
            synthesis_language: settings.synthesis_language.clone(),
            step_format: settings.step_format,
        }
    }
}

/// Everything the controller reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// User pressed the microphone.
    Start,
    /// User cancelled (e.g. left the page).
    Abort,
    /// User asked for a specific step (0-based).
    SpeakStep(usize),
    RecognitionStarted(RecognitionId),
    Recognized(RecognitionId, String),
    RecognitionFailed(RecognitionId, RecognitionErrorCode),
    RecognitionEnded(RecognitionId),
    ReplyReceived {
        request: RequestId,
        result: Result<String, String>,
    },
    SpeakDue(Ticket),
    SpeechStarted(Ticket),
    SpeechEnded(Ticket),
    SpeechFailed { ticket: Ticket, error: String },
    RestartDue(Ticket),
}

/// Work for the runtime, executed in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartRecognition {
        session: RecognitionId,
        config: RecognitionConfig,
    },
    AbortRecognition,
    FetchRecipe {
        request: RequestId,
        query: String,
        language: Language,
    },
    /// Cancel the current utterance and wait until it is gone.
    CancelSpeech,
    ScheduleSpeak { ticket: Ticket, delay: Duration },
    Speak(Utterance),
    ScheduleRestart { ticket: Ticket, delay: Duration },
    Notify(Notice),
}

/// User-facing status and error reports.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// No recognizer in this environment.
    CapabilityMissing,
    Listening { language: String },
    Heard(String),
    NothingHeard,
    RecognitionFailed(RecognitionErrorCode),
    FetchingRecipe(String),
    RecipeRequestFailed(String),
    /// The reply had no recognisable steps; earlier steps are kept.
    NoStepsExtracted { reply: String },
    StepsLoaded { count: usize },
    SpeakingStep { index: usize, total: usize, text: String },
    NothingToSpeak,
    SpeechFailed(String),
}

pub struct TurnController {
    config: ControllerConfig,
    session: Session,
    state: TurnState,
    recognition_available: bool,
    last_ticket: Ticket,
    last_request: RequestId,
    last_recognition: RecognitionId,
    /// Recognition session whose callbacks are still accepted.
    current_recognition: Option<RecognitionId>,
    /// Scheduled speak not yet handed to the synthesizer.
    pending_speak: Option<Ticket>,
    /// Utterance handed to the synthesizer and not yet ended.
    active_utterance: Option<Ticket>,
    pending_restart: Option<Ticket>,
    pending_request: Option<RequestId>,
}

impl TurnController {
    pub fn new(config: ControllerConfig, language: Language, recognition_available: bool) -> Self {
        Self {
            config,
            session: Session::new(language),
            state: TurnState::Idle,
            recognition_available,
            last_ticket: 0,
            last_request: 0,
            last_recognition: 0,
            current_recognition: None,
            pending_speak: None,
            active_utterance: None,
            pending_restart: None,
            pending_request: None,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Whether an utterance is playing or queued as far as the controller knows.
    pub fn speech_in_flight(&self) -> bool {
        self.pending_speak.is_some() || self.active_utterance.is_some()
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        debug!(state = ?self.state, ?input, "turn input");
        match input {
            Input::Start => self.on_start(),
            Input::Abort => self.on_abort(),
            Input::SpeakStep(index) => self.on_speak_step(index),
            Input::RecognitionStarted(id)
            | Input::Recognized(id, _)
            | Input::RecognitionFailed(id, _)
            | Input::RecognitionEnded(id)
                if self.current_recognition != Some(id) =>
            {
                debug!(session = id, "ignoring callback from a finished recognition session");
                Vec::new()
            }
            Input::RecognitionStarted(_) => {
                if self.state == TurnState::Listening {
                    self.session.set_listening(true);
                }
                Vec::new()
            }
            Input::Recognized(_, text) => self.on_recognized(&text),
            Input::RecognitionFailed(_, code) => self.on_recognition_failed(code),
            Input::RecognitionEnded(_) => {
                self.current_recognition = None;
                self.session.set_listening(false);
                if self.state == TurnState::Listening {
                    debug!("recognition ended without a result");
                    self.state = TurnState::Idle;
                }
                Vec::new()
            }
            Input::ReplyReceived { request, result } => self.on_reply(request, result),
            Input::SpeakDue(ticket) => self.on_speak_due(ticket),
            Input::SpeechStarted(ticket) => {
                if self.active_utterance == Some(ticket) {
                    self.session.set_speaking(true);
                }
                Vec::new()
            }
            Input::SpeechEnded(ticket) => {
                if self.active_utterance != Some(ticket) {
                    debug!(ticket, "ignoring end of superseded utterance");
                    return Vec::new();
                }
                self.active_utterance = None;
                self.session.set_speaking(false);
                self.schedule_restart()
            }
            Input::SpeechFailed { ticket, error } => {
                if self.active_utterance != Some(ticket) {
                    return Vec::new();
                }
                warn!(ticket, %error, "speech synthesis failed");
                self.active_utterance = None;
                self.session.set_speaking(false);
                let mut effects = vec![Effect::Notify(Notice::SpeechFailed(error))];
                effects.extend(self.schedule_restart());
                effects
            }
            Input::RestartDue(ticket) => {
                if self.pending_restart != Some(ticket) || self.state != TurnState::AwaitingNextTurn {
                    return Vec::new();
                }
                self.pending_restart = None;
                self.start_listening()
            }
        }
    }

    fn on_start(&mut self) -> Vec<Effect> {
        if !self.recognition_available {
            warn!("speech recognition is not supported here");
            return vec![Effect::Notify(Notice::CapabilityMissing)];
        }
        match self.state {
            TurnState::Listening => {
                debug!("already listening");
                Vec::new()
            }
            TurnState::Processing => {
                debug!("still waiting for the recipe; start ignored");
                Vec::new()
            }
            TurnState::Speaking | TurnState::AwaitingNextTurn => {
                let mut effects = self.silence();
                effects.extend(self.start_listening());
                effects
            }
            TurnState::Idle => self.start_listening(),
        }
    }

    fn on_abort(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.current_recognition.take().is_some() {
            effects.push(Effect::AbortRecognition);
            self.session.set_listening(false);
        }
        effects.extend(self.silence());
        if self.pending_request.take().is_some() {
            debug!("dropping in-flight recipe request");
        }
        self.state = TurnState::Idle;
        effects
    }

    fn on_speak_step(&mut self, index: usize) -> Vec<Effect> {
        if !self.session.select(index) {
            return vec![Effect::Notify(Notice::NothingToSpeak)];
        }
        self.pending_request = None;
        self.request_speak()
    }

    fn on_recognized(&mut self, text: &str) -> Vec<Effect> {
        self.current_recognition = None;
        if self.state != TurnState::Listening {
            debug!(state = ?self.state, "ignoring utterance outside of a listening turn");
            return Vec::new();
        }
        self.session.set_listening(false);
        self.session.record_transcript(text);

        let Some(command) = classify(text) else {
            self.state = TurnState::Idle;
            return vec![Effect::Notify(Notice::NothingHeard)];
        };
        let mut effects = vec![Effect::Notify(Notice::Heard(text.trim().to_string()))];

        match command {
            Command::Query(query) => {
                self.last_request += 1;
                let request = self.last_request;
                self.pending_request = Some(request);
                self.state = TurnState::Processing;
                info!(request, %query, "fetching recipe");
                effects.push(Effect::Notify(Notice::FetchingRecipe(query.clone())));
                effects.push(Effect::FetchRecipe {
                    request,
                    query,
                    language: self.session.language(),
                });
                return effects;
            }
            _ if !self.session.has_steps() => {
                self.state = TurnState::Idle;
                effects.push(Effect::Notify(Notice::NothingToSpeak));
                return effects;
            }
            Command::Next => {
                if !self.session.advance() {
                    info!(index = self.session.current_index(), "already at last step, repeating it");
                }
            }
            Command::Previous => self.session.retreat(),
            Command::Repeat => {}
        }
        effects.extend(self.request_speak());
        effects
    }

    fn on_recognition_failed(&mut self, code: RecognitionErrorCode) -> Vec<Effect> {
        self.current_recognition = None;
        self.session.set_listening(false);
        if self.state == TurnState::Listening {
            self.state = TurnState::Idle;
        }
        if code.is_abort() {
            debug!("recognition aborted");
            return Vec::new();
        }
        warn!(%code, "speech recognition error");
        vec![Effect::Notify(Notice::RecognitionFailed(code))]
    }

    fn on_reply(&mut self, request: RequestId, result: Result<String, String>) -> Vec<Effect> {
        if self.pending_request != Some(request) {
            debug!(request, "ignoring reply to a dropped request");
            return Vec::new();
        }
        self.pending_request = None;

        let reply = match result {
            Ok(reply) => reply,
            Err(error) => {
                warn!(request, %error, "recipe request failed");
                self.state = TurnState::Idle;
                return vec![Effect::Notify(Notice::RecipeRequestFailed(error))];
            }
        };

        let steps = parse_steps(&reply, self.config.step_format);
        let count = steps.len();
        if !self.session.replace_steps(steps) {
            warn!(request, "could not extract steps from reply");
            self.state = TurnState::Idle;
            return vec![Effect::Notify(Notice::NoStepsExtracted { reply })];
        }
        info!(request, count, "recipe steps loaded");
        let mut effects = vec![Effect::Notify(Notice::StepsLoaded { count })];
        effects.extend(self.request_speak());
        effects
    }

    fn on_speak_due(&mut self, ticket: Ticket) -> Vec<Effect> {
        if self.pending_speak != Some(ticket) {
            debug!(ticket, "ignoring superseded speak");
            return Vec::new();
        }
        self.pending_speak = None;

        let total = self.session.steps().len();
        let index = self.session.current_index();
        let Some(text) = self.session.current_step().map(str::to_string) else {
            self.state = TurnState::Idle;
            return vec![Effect::Notify(Notice::NothingToSpeak)];
        };

        self.active_utterance = Some(ticket);
        let language = self
            .config
            .synthesis_language
            .clone()
            .unwrap_or_else(|| self.session.language().tag().to_string());
        vec![
            Effect::Notify(Notice::SpeakingStep {
                index,
                total,
                text: text.clone(),
            }),
            Effect::Speak(Utterance {
                ticket,
                text,
                language,
                rate: self.config.rate,
            }),
        ]
    }

    /// Cancel anything playing, then schedule the current step after the settle delay.
    fn request_speak(&mut self) -> Vec<Effect> {
        if self.session.current_step().is_none() {
            self.state = TurnState::Idle;
            return vec![Effect::Notify(Notice::NothingToSpeak)];
        }
        let mut effects = Vec::new();
        if self.current_recognition.take().is_some() {
            effects.push(Effect::AbortRecognition);
            self.session.set_listening(false);
        }
        effects.extend(self.silence());

        let ticket = self.next_ticket();
        self.pending_speak = Some(ticket);
        self.state = TurnState::Speaking;
        effects.push(Effect::ScheduleSpeak {
            ticket,
            delay: self.config.settle_delay,
        });
        effects
    }

    /// Invalidate scheduled speech and restarts; cancel the active utterance.
    fn silence(&mut self) -> Vec<Effect> {
        self.pending_speak = None;
        self.pending_restart = None;
        self.session.set_speaking(false);
        match self.active_utterance.take() {
            Some(ticket) => {
                debug!(ticket, "cancelling active utterance");
                vec![Effect::CancelSpeech]
            }
            None => Vec::new(),
        }
    }

    fn schedule_restart(&mut self) -> Vec<Effect> {
        if !self.recognition_available {
            self.state = TurnState::Idle;
            return Vec::new();
        }
        let ticket = self.next_ticket();
        self.pending_restart = Some(ticket);
        self.state = TurnState::AwaitingNextTurn;
        vec![Effect::ScheduleRestart {
            ticket,
            delay: self.config.restart_delay,
        }]
    }

    fn start_listening(&mut self) -> Vec<Effect> {
        self.pending_restart = None;
        self.state = TurnState::Listening;
        self.session.set_listening(true);
        let language = if self.session.has_steps() {
            self.config.command_language.clone()
        } else {
            self.session.language().tag().to_string()
        };
        self.last_recognition += 1;
        let session = self.last_recognition;
        self.current_recognition = Some(session);
        vec![
            Effect::StartRecognition {
                session,
                config: RecognitionConfig::new(language.clone()),
            },
            Effect::Notify(Notice::Listening { language }),
        ]
    }

    fn next_ticket(&mut self) -> Ticket {
        self.last_ticket += 1;
        self.last_ticket
    }
}
