//! **TTS backends** and the audio synthesizer that plays their output.
//!
//! A `TtsBackend` turns text into audio bytes. `AudioSynthesizer` writes those
//! bytes to a temp file and plays it with an external player command; cancel
//! aborts the playback task, which kills the player.

use crate::controller::Ticket;
use crate::error::{VoiceError, VoiceResult};
use crate::synthesizer::{PlaybackSlot, SpeechSynthesizer, SynthesisEvent, Utterance};
use async_trait::async_trait;
use chefspeak_core::{ChatSettings, TtsSettings};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Backend that turns text into audio bytes (WAV/MP3).
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Synthesize `text` in `language` (BCP-47) at `rate` (1.0 is normal).
    /// An empty vec means nothing to play.
    async fn synthesize(&self, text: &str, language: &str, rate: f32) -> VoiceResult<Vec<u8>>;
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

async fn audio_bytes(res: reqwest::Response) -> VoiceResult<Vec<u8>> {
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(VoiceError::Tts(format!("TTS API error {}: {}", status, body)));
    }
    let bytes = res.bytes().await.map_err(|e| VoiceError::Tts(e.to_string()))?;
    Ok(bytes.to_vec())
}

#[derive(Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
    language: &'a str,
}

/// Local speak service: `POST {text, language}` returns audio bytes.
/// The service speaks at its own pace; the rate is not sent.
#[derive(Debug, Clone)]
pub struct SpeakEndpointTts {
    endpoint: String,
    client: reqwest::Client,
}

impl SpeakEndpointTts {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: http_client(Duration::from_secs(60)),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TtsBackend for SpeakEndpointTts {
    async fn synthesize(&self, text: &str, language: &str, _rate: f32) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let res = self
            .client
            .post(&self.endpoint)
            .json(&SpeakRequest { text, language })
            .send()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        audio_bytes(res).await
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
}

/// Range the audio API accepts for `speed`.
const MIN_SPEED: f32 = 0.25;
const MAX_SPEED: f32 = 4.0;

/// OpenAI-compatible audio API (`POST {base}/audio/speech`).
#[derive(Debug, Clone)]
pub struct OpenAiTts {
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
    client: reqwest::Client,
}

impl OpenAiTts {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: "tts-1".to_string(),
            voice: "nova".to_string(),
            client: http_client(Duration::from_secs(60)),
        }
    }

    /// Share the chat API base and key; model and voice come from the TTS settings.
    pub fn from_settings(chat: &ChatSettings, tts: &TtsSettings) -> VoiceResult<Self> {
        let api_key = chat.resolved_api_key().ok_or_else(|| {
            VoiceError::Config("OpenAI TTS requires chat.api_key or OPENAI_API_KEY".to_string())
        })?;
        Ok(Self::new(chat.api_base.clone(), api_key)
            .with_model(tts.openai_model.clone())
            .with_voice(tts.openai_voice.clone()))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }
}

#[async_trait]
impl TtsBackend for OpenAiTts {
    // The voice carries the language; the API has no language parameter.
    async fn synthesize(&self, text: &str, _language: &str, rate: f32) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &self.model,
                input: text,
                voice: &self.voice,
                speed: rate.clamp(MIN_SPEED, MAX_SPEED),
            })
            .send()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        audio_bytes(res).await
    }
}

/// External audio player: program plus leading arguments; the audio file path is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    program: String,
    args: Vec<String>,
}

impl PlayerCommand {
    /// Split a command line like `"ffplay -nodisp -autoexit"` on whitespace.
    pub fn parse(command: &str) -> VoiceResult<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| VoiceError::Config("player command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn command_for(&self, path: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(path).kill_on_drop(true);
        cmd
    }
}

/// Synthesizer backed by a [`TtsBackend`] and an external player.
pub struct AudioSynthesizer {
    backend: Arc<dyn TtsBackend>,
    player: PlayerCommand,
    events: mpsc::UnboundedSender<SynthesisEvent>,
    slot: PlaybackSlot,
}

impl AudioSynthesizer {
    pub fn new(
        backend: Arc<dyn TtsBackend>,
        player: PlayerCommand,
        events: mpsc::UnboundedSender<SynthesisEvent>,
    ) -> Self {
        Self {
            backend,
            player,
            events,
            slot: PlaybackSlot::default(),
        }
    }
}

async fn play(
    backend: Arc<dyn TtsBackend>,
    player: PlayerCommand,
    utterance: Utterance,
    started: Arc<AtomicBool>,
    events: &mpsc::UnboundedSender<SynthesisEvent>,
) -> VoiceResult<()> {
    let ticket: Ticket = utterance.ticket;
    let audio = backend
        .synthesize(&utterance.text, &utterance.language, utterance.rate)
        .await?;
    if audio.is_empty() {
        debug!(ticket, "TTS returned no audio");
        started.store(true, Ordering::SeqCst);
        let _ = events.send(SynthesisEvent::Started(ticket));
        return Ok(());
    }

    let file = tempfile::Builder::new()
        .prefix("chefspeak-")
        .suffix(".audio")
        .tempfile()?;
    tokio::fs::write(file.path(), &audio).await?;

    started.store(true, Ordering::SeqCst);
    let _ = events.send(SynthesisEvent::Started(ticket));
    let status = player.command_for(file.path()).status().await?;
    if !status.success() {
        return Err(VoiceError::Playback(format!(
            "{} exited with {}",
            player.program(),
            status
        )));
    }
    Ok(())
}

#[async_trait]
impl SpeechSynthesizer for AudioSynthesizer {
    async fn speak(&self, utterance: Utterance) -> VoiceResult<()> {
        let ticket = utterance.ticket;
        let backend = Arc::clone(&self.backend);
        let player = self.player.clone();
        let events = self.events.clone();
        self.slot.replace(ticket, move |started| async move {
            let event = match play(backend, player, utterance, started, &events).await {
                Ok(()) => SynthesisEvent::Ended(ticket),
                Err(e) => {
                    warn!(ticket, error = %e, "utterance failed");
                    SynthesisEvent::Failed {
                        ticket,
                        error: e.to_string(),
                    }
                }
            };
            let _ = events.send(event);
        });
        info!(ticket, "utterance queued for synthesis");
        Ok(())
    }

    async fn cancel(&self) {
        self.slot.cancel().await;
    }

    fn is_speaking(&self) -> bool {
        self.slot.is_speaking()
    }

    fn is_pending(&self) -> bool {
        self.slot.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SilentTts;

    #[async_trait]
    impl TtsBackend for SilentTts {
        async fn synthesize(&self, _text: &str, _language: &str, _rate: f32) -> VoiceResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    /// Records what it was asked to say; returns no audio.
    #[derive(Default)]
    struct RecordingTts {
        requests: std::sync::Mutex<Vec<(String, String, f32)>>,
    }

    #[async_trait]
    impl TtsBackend for RecordingTts {
        async fn synthesize(&self, text: &str, language: &str, rate: f32) -> VoiceResult<Vec<u8>> {
            self.requests
                .lock()
                .unwrap()
                .push((text.to_string(), language.to_string(), rate));
            Ok(Vec::new())
        }
    }

    struct BrokenTts;

    #[async_trait]
    impl TtsBackend for BrokenTts {
        async fn synthesize(&self, _text: &str, _language: &str, _rate: f32) -> VoiceResult<Vec<u8>> {
            Err(VoiceError::Tts("TTS API error 503".to_string()))
        }
    }

    fn utterance(ticket: Ticket) -> Utterance {
        Utterance {
            ticket,
            text: "Step 1: Soak the dal.".to_string(),
            language: "hi-IN".to_string(),
            rate: 1.0,
        }
    }

    #[test]
    fn player_command_splits_program_and_args() {
        let player = PlayerCommand::parse("ffplay -nodisp  -autoexit").unwrap();
        assert_eq!(player.program(), "ffplay");
        assert_eq!(player.args(), ["-nodisp", "-autoexit"]);
        assert!(matches!(PlayerCommand::parse("   "), Err(VoiceError::Config(_))));
    }

    #[tokio::test]
    async fn empty_audio_starts_and_ends() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let synth = AudioSynthesizer::new(Arc::new(SilentTts), PlayerCommand::parse("true").unwrap(), tx);
        synth.speak(utterance(4)).await.unwrap();
        assert_eq!(rx.recv().await, Some(SynthesisEvent::Started(4)));
        assert_eq!(rx.recv().await, Some(SynthesisEvent::Ended(4)));
    }

    #[tokio::test]
    async fn utterance_rate_reaches_the_backend() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let backend = Arc::new(RecordingTts::default());
        let synth = AudioSynthesizer::new(backend.clone(), PlayerCommand::parse("true").unwrap(), tx);
        let mut slow = utterance(5);
        slow.rate = 0.75;
        synth.speak(slow).await.unwrap();
        assert_eq!(rx.recv().await, Some(SynthesisEvent::Started(5)));
        assert_eq!(rx.recv().await, Some(SynthesisEvent::Ended(5)));
        assert_eq!(
            backend.requests.lock().unwrap().as_slice(),
            [("Step 1: Soak the dal.".to_string(), "hi-IN".to_string(), 0.75)]
        );
    }

    #[tokio::test]
    async fn backend_error_is_reported_as_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let synth = AudioSynthesizer::new(Arc::new(BrokenTts), PlayerCommand::parse("true").unwrap(), tx);
        synth.speak(utterance(9)).await.unwrap();
        match rx.recv().await {
            Some(SynthesisEvent::Failed { ticket, error }) => {
                assert_eq!(ticket, 9);
                assert!(error.contains("503"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn openai_tts_needs_a_key() {
        let chat = ChatSettings {
            api_base: "http://localhost:1".to_string(),
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_steps: 15,
            timeout_secs: 5,
        };
        let tts = TtsSettings {
            backend: chefspeak_core::TtsBackendKind::Openai,
            speak_endpoint: String::new(),
            openai_model: "tts-1-hd".to_string(),
            openai_voice: "alloy".to_string(),
            player_command: "ffplay".to_string(),
        };
        let client = OpenAiTts::from_settings(&chat, &tts).unwrap();
        assert_eq!(client.model, "tts-1-hd");
        assert_eq!(client.voice, "alloy");
    }
}
