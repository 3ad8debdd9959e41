//! **Speech synthesis**: the speaking half of a turn.
//!
//! A synthesizer plays at most one utterance. Lifecycle is reported on a
//! `SynthesisEvent` channel tagged with the utterance ticket, so late events of a
//! cancelled utterance can be told apart from the current one.

use crate::controller::Ticket;
use crate::error::VoiceResult;
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Text to speak with its voice settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub ticket: Ticket,
    pub text: String,
    /// BCP-47 language tag.
    pub language: String,
    /// Speaking rate; 1.0 is normal.
    pub rate: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisEvent {
    Started(Ticket),
    Ended(Ticket),
    Failed { ticket: Ticket, error: String },
}

/// A speech synthesizer with explicit cancel.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Queue an utterance. Lifecycle events follow on the event channel.
    async fn speak(&self, utterance: Utterance) -> VoiceResult<()>;

    /// Cancel the playing or queued utterance. Returns once it is gone.
    async fn cancel(&self);

    /// An utterance is audibly playing.
    fn is_speaking(&self) -> bool;

    /// An utterance was accepted but has not started playing yet.
    fn is_pending(&self) -> bool;
}

struct Playback {
    ticket: Ticket,
    started: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Holds the single in-flight playback task of a synthesizer.
#[derive(Default)]
pub(crate) struct PlaybackSlot {
    current: Mutex<Option<Playback>>,
}

impl PlaybackSlot {
    /// Spawn `task` as the current playback. `task` receives a flag it must set
    /// when audio actually starts. Any previous playback is aborted first.
    pub(crate) fn replace<F, Fut>(&self, ticket: Ticket, task: F)
    where
        F: FnOnce(Arc<AtomicBool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let started = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(task(Arc::clone(&started)));
        let previous = self.current.lock().ok().and_then(|mut guard| {
            guard.replace(Playback {
                ticket,
                started,
                handle,
            })
        });
        if let Some(previous) = previous {
            previous.handle.abort();
        }
    }

    pub(crate) async fn cancel(&self) {
        let current = self.current.lock().ok().and_then(|mut guard| guard.take());
        if let Some(playback) = current {
            if !playback.handle.is_finished() {
                debug!(ticket = playback.ticket, "cancelling utterance");
            }
            playback.handle.abort();
            let _ = playback.handle.await;
        }
    }

    fn with_live<R>(&self, f: impl FnOnce(&Playback) -> R) -> Option<R> {
        let guard = self.current.lock().ok()?;
        guard
            .as_ref()
            .filter(|p| !p.handle.is_finished())
            .map(f)
    }

    pub(crate) fn is_speaking(&self) -> bool {
        self.with_live(|p| p.started.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.with_live(|p| !p.started.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

/// Synthesizer for terminals: prints the step and holds the turn for roughly
/// as long as reading it aloud would take.
pub struct ConsoleSynthesizer {
    events: mpsc::UnboundedSender<SynthesisEvent>,
    words_per_minute: f32,
    slot: PlaybackSlot,
}

impl ConsoleSynthesizer {
    pub fn new(events: mpsc::UnboundedSender<SynthesisEvent>) -> Self {
        Self {
            events,
            words_per_minute: 165.0,
            slot: PlaybackSlot::default(),
        }
    }

    pub fn with_words_per_minute(mut self, wpm: f32) -> Self {
        self.words_per_minute = wpm.max(1.0);
        self
    }

    /// Simulated playback time for `text` at `rate`.
    pub fn duration_for(&self, text: &str, rate: f32) -> Duration {
        let words = text.split_whitespace().count().max(1) as f32;
        let millis = (words * 60_000.0 / (self.words_per_minute * rate.clamp(0.1, 10.0))).round();
        Duration::from_millis(millis as u64).max(Duration::from_millis(300))
    }
}

#[async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    async fn speak(&self, utterance: Utterance) -> VoiceResult<()> {
        let duration = self.duration_for(&utterance.text, utterance.rate);
        let events = self.events.clone();
        let ticket = utterance.ticket;
        self.slot.replace(ticket, move |started| async move {
            started.store(true, Ordering::SeqCst);
            let _ = events.send(SynthesisEvent::Started(ticket));
            println!("🔊 {}", utterance.text);
            tokio::time::sleep(duration).await;
            let _ = events.send(SynthesisEvent::Ended(ticket));
        });
        info!(ticket, ?duration, "console utterance queued");
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

    fn utterance(ticket: Ticket, text: &str) -> Utterance {
        Utterance {
            ticket,
            text: text.to_string(),
            language: "en-US".to_string(),
            rate: 1.0,
        }
    }

    #[test]
    fn duration_scales_with_words_and_rate() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let synth = ConsoleSynthesizer::new(tx).with_words_per_minute(60.0);
        assert_eq!(synth.duration_for("one two three", 1.0), Duration::from_secs(3));
        assert_eq!(synth.duration_for("one two three", 3.0), Duration::from_secs(1));
        assert_eq!(synth.duration_for("", 1.0), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn utterance_reports_start_then_end() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let synth = ConsoleSynthesizer::new(tx);
        synth.speak(utterance(1, "Preheat the oven.")).await.unwrap();

        assert_eq!(rx.recv().await, Some(SynthesisEvent::Started(1)));
        assert!(synth.is_speaking());
        assert_eq!(rx.recv().await, Some(SynthesisEvent::Ended(1)));
        tokio::task::yield_now().await;
        assert!(!synth.is_speaking());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_silences_the_current_utterance() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let synth = ConsoleSynthesizer::new(tx);
        synth.speak(utterance(1, "A long step about kneading dough.")).await.unwrap();
        assert_eq!(rx.recv().await, Some(SynthesisEvent::Started(1)));

        synth.cancel().await;
        assert!(!synth.is_speaking());
        assert!(!synth.is_pending());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err(), "cancelled utterance must not report an end");
    }
}
