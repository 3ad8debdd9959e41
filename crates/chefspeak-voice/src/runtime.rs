//! **AssistantRuntime**: the single actor that drives the hands-free loop.
//!
//! Owns the [`TurnController`] and the collaborators. Every user command,
//! recognizer callback, synthesizer callback, timer and chat reply becomes an
//! [`Input`]; the resulting effects run in order before the next input is taken.

use crate::controller::{ControllerConfig, Effect, Input, Notice, TurnController};
use crate::error::VoiceResult;
use crate::recognizer::{RecognitionErrorCode, RecognitionEvent, SpeechRecognizer};
use crate::session::Session;
use crate::synthesizer::{SpeechSynthesizer, SynthesisEvent};
use chefspeak_core::{Language, RecipeSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Commands from the user interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Microphone button.
    Start,
    Abort,
    /// Speak step `n` (0-based).
    SpeakStep(usize),
    Quit,
}

impl From<RecognitionEvent> for Input {
    fn from(event: RecognitionEvent) -> Self {
        match event {
            RecognitionEvent::Started(session) => Input::RecognitionStarted(session),
            RecognitionEvent::Result(session, text) => Input::Recognized(session, text),
            RecognitionEvent::Error(session, code) => Input::RecognitionFailed(session, code),
            RecognitionEvent::Ended(session) => Input::RecognitionEnded(session),
        }
    }
}

impl From<SynthesisEvent> for Input {
    fn from(event: SynthesisEvent) -> Self {
        match event {
            SynthesisEvent::Started(ticket) => Input::SpeechStarted(ticket),
            SynthesisEvent::Ended(ticket) => Input::SpeechEnded(ticket),
            SynthesisEvent::Failed { ticket, error } => Input::SpeechFailed { ticket, error },
        }
    }
}

pub struct AssistantRuntime {
    controller: TurnController,
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    recipes: Arc<dyn RecipeSource>,
    notices: mpsc::UnboundedSender<Notice>,
    inputs_tx: mpsc::UnboundedSender<Input>,
    inputs_rx: mpsc::UnboundedReceiver<Input>,
    snapshot: watch::Sender<Session>,
}

impl AssistantRuntime {
    /// `recognizer` is `None` where speech recognition is unavailable; starting
    /// then reports [`Notice::CapabilityMissing`].
    pub fn new(
        config: ControllerConfig,
        language: Language,
        recognizer: Option<Box<dyn SpeechRecognizer>>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        recipes: Arc<dyn RecipeSource>,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        let controller = TurnController::new(config, language, recognizer.is_some());
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (snapshot, _) = watch::channel(controller.session().clone());
        Self {
            controller,
            recognizer,
            synthesizer,
            recipes,
            notices,
            inputs_tx,
            inputs_rx,
            snapshot,
        }
    }

    /// Session state after every handled input.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.snapshot.subscribe()
    }

    /// Run until `Quit` or the command channel closes. Returns the final session.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<UserCommand>,
        mut recognition: mpsc::UnboundedReceiver<RecognitionEvent>,
        mut synthesis: mpsc::UnboundedReceiver<SynthesisEvent>,
    ) -> VoiceResult<Session> {
        info!(language = %self.controller.session().language(), "assistant runtime started");
        loop {
            let input = tokio::select! {
                command = commands.recv() => match command {
                    Some(UserCommand::Start) => Input::Start,
                    Some(UserCommand::Abort) => Input::Abort,
                    Some(UserCommand::SpeakStep(index)) => Input::SpeakStep(index),
                    Some(UserCommand::Quit) | None => break,
                },
                Some(event) = recognition.recv() => event.into(),
                Some(event) = synthesis.recv() => event.into(),
                Some(input) = self.inputs_rx.recv() => input,
            };
            self.dispatch(input).await;
        }

        info!("assistant runtime shutting down");
        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.abort();
        }
        self.synthesizer.cancel().await;
        Ok(self.controller.into_session())
    }

    async fn dispatch(&mut self, input: Input) {
        let before = self.controller.state();
        let effects = self.controller.handle(input);
        let after = self.controller.state();
        if before != after {
            debug!(?before, ?after, "turn state changed");
        }
        for effect in effects {
            self.execute(effect).await;
        }
        self.snapshot.send_replace(self.controller.session().clone());
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StartRecognition { session, config } => {
                let result = match self.recognizer.as_mut() {
                    Some(recognizer) => recognizer.start(session, &config).map_err(|e| e.to_string()),
                    None => Err("no speech recognizer".to_string()),
                };
                if let Err(error) = result {
                    warn!(session, %error, "could not start recognition");
                    self.post(Input::RecognitionFailed(session, RecognitionErrorCode::Other(error)));
                }
            }
            Effect::AbortRecognition => {
                if let Some(recognizer) = self.recognizer.as_mut() {
                    recognizer.abort();
                }
            }
            Effect::FetchRecipe {
                request,
                query,
                language,
            } => {
                let recipes = Arc::clone(&self.recipes);
                let inputs = self.inputs_tx.clone();
                tokio::spawn(async move {
                    let result = recipes
                        .fetch_recipe(&query, language)
                        .await
                        .map_err(|e| e.to_string());
                    let _ = inputs.send(Input::ReplyReceived { request, result });
                });
            }
            Effect::CancelSpeech => self.synthesizer.cancel().await,
            Effect::ScheduleSpeak { ticket, delay } => self.after(delay, Input::SpeakDue(ticket)),
            Effect::Speak(utterance) => {
                let ticket = utterance.ticket;
                if let Err(e) = self.synthesizer.speak(utterance).await {
                    self.post(Input::SpeechFailed {
                        ticket,
                        error: e.to_string(),
                    });
                }
            }
            Effect::ScheduleRestart { ticket, delay } => self.after(delay, Input::RestartDue(ticket)),
            Effect::Notify(notice) => {
                debug!(?notice, "notice");
                let _ = self.notices.send(notice);
            }
        }
    }

    fn post(&self, input: Input) {
        let _ = self.inputs_tx.send(input);
    }

    fn after(&self, delay: Duration, input: Input) {
        let inputs = self.inputs_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inputs.send(input);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_events_map_to_inputs() {
        assert_eq!(
            Input::from(RecognitionEvent::Result(4, "next".to_string())),
            Input::Recognized(4, "next".to_string())
        );
        assert_eq!(
            Input::from(RecognitionEvent::Error(5, RecognitionErrorCode::Network)),
            Input::RecognitionFailed(5, RecognitionErrorCode::Network)
        );
        assert_eq!(Input::from(RecognitionEvent::Ended(5)), Input::RecognitionEnded(5));
        assert_eq!(Input::from(SynthesisEvent::Ended(3)), Input::SpeechEnded(3));
        assert_eq!(
            Input::from(SynthesisEvent::Failed {
                ticket: 2,
                error: "boom".to_string()
            }),
            Input::SpeechFailed {
                ticket: 2,
                error: "boom".to_string()
            }
        );
    }
}
