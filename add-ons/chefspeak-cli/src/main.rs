//! ChefSpeak terminal front end
//!
//! Typed lines stand in for the microphone: `:start` arms the recognizer and the
//! next plain line is what the cook "said". Steps are spoken through the configured
//! TTS backend.

mod control;

use chefspeak_core::{
    resolve_language, AssistantConfig, Language, OpenAiChat, ProfileStore, RecipeClient, SledProfileStore,
    TtsBackendKind,
};
use chefspeak_voice::{
    AssistantRuntime, AudioSynthesizer, ConsoleSynthesizer, ControllerConfig, LineRecognizer, OpenAiTts,
    PlayerCommand, SpeakEndpointTts, SpeechRecognizer, SpeechSynthesizer, SynthesisEvent, TtsBackend,
    UserCommand,
};
use clap::Parser;
use control::{parse_line, render, render_steps, Line, HELP};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "chefspeak", version, about = "Hands-free recipe steps, read aloud")]
struct Args {
    /// Config file (TOML). Defaults to config/chefspeak.toml.
    #[arg(long, env = "CHEFSPEAK_CONFIG")]
    config: Option<PathBuf>,

    /// User whose preferred language is looked up (and saved with --language).
    #[arg(long, env = "CHEFSPEAK_USER")]
    user: Option<String>,

    /// English, Hindi, Telugu or Tamil.
    #[arg(long)]
    language: Option<Language>,

    /// console, speak-endpoint or openai.
    #[arg(long)]
    tts: Option<TtsBackendKind>,
}

fn build_synthesizer(
    config: &AssistantConfig,
    events: mpsc::UnboundedSender<SynthesisEvent>,
) -> Result<Arc<dyn SpeechSynthesizer>, Box<dyn std::error::Error>> {
    let backend: Arc<dyn TtsBackend> = match config.tts.backend {
        TtsBackendKind::Console => return Ok(Arc::new(ConsoleSynthesizer::new(events))),
        TtsBackendKind::SpeakEndpoint => Arc::new(SpeakEndpointTts::new(config.tts.speak_endpoint.clone())),
        TtsBackendKind::Openai => Arc::new(OpenAiTts::from_settings(&config.chat, &config.tts)?),
    };
    let player = PlayerCommand::parse(&config.tts.player_command)?;
    Ok(Arc::new(AudioSynthesizer::new(backend, player, events)))
}

fn preferred_language(config: &AssistantConfig, args: &Args) -> Language {
    let fallback = config.profile.default_language;
    let store = match SledProfileStore::open(&config.profile.store_path) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(error = %e, path = %config.profile.store_path, "profile store unavailable");
            return args.language.unwrap_or(fallback);
        }
    };
    match (args.language, args.user.as_deref()) {
        (Some(language), Some(user)) => {
            if let Err(e) = store.set_preferred_language(user, language) {
                tracing::warn!(error = %e, user, "could not save preferred language");
            }
            language
        }
        (Some(language), None) => language,
        (None, user) => resolve_language(&store, user, fallback),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[chefspeak] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => AssistantConfig::load_from(path)?,
        None => AssistantConfig::load()?,
    };
    if let Some(backend) = args.tts {
        config.tts.backend = backend;
    }

    let language = preferred_language(&config, &args);
    let chat = OpenAiChat::from_settings(&config.chat)?;
    let recipes = Arc::new(RecipeClient::from_settings(chat, &config.chat));

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (recognition_tx, recognition_rx) = mpsc::unbounded_channel();
    let (synthesis_tx, synthesis_rx) = mpsc::unbounded_channel();
    let (notices_tx, mut notices_rx) = mpsc::unbounded_channel();

    let (recognizer, feed) = LineRecognizer::new(recognition_tx);
    let recognizer: Box<dyn SpeechRecognizer> = Box::new(recognizer);
    let synthesizer = build_synthesizer(&config, synthesis_tx)?;

    let runtime = AssistantRuntime::new(
        ControllerConfig::from(&config.speech),
        language,
        Some(recognizer),
        synthesizer,
        recipes,
        notices_tx,
    );
    let snapshot = runtime.subscribe();
    let runtime = tokio::spawn(runtime.run(commands_rx, recognition_rx, synthesis_rx));

    tokio::spawn(async move {
        while let Some(notice) = notices_rx.recv().await {
            println!("{}", render(&notice));
        }
    });

    tracing::info!(
        language = %language,
        tts = %config.tts.backend,
        model = %config.chat.model,
        "ChefSpeak started"
    );
    println!("ChefSpeak ({}), recipes in {}. Type :help for commands.", chefspeak_core::version(), language);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down");
                break;
            }
        };
        match parse_line(&line) {
            Line::Command(UserCommand::Quit) => break,
            Line::Command(command) => {
                if commands_tx.send(command).is_err() {
                    break;
                }
            }
            Line::ShowSteps => println!("{}", render_steps(&snapshot.borrow())),
            Line::Help => println!("{}", HELP),
            Line::Speech(text) => {
                if !feed.deliver(&text) {
                    println!("not listening; type :start first.");
                }
            }
            Line::Empty => {}
            Line::Invalid(message) => println!("{}", message),
        }
    }

    let _ = commands_tx.send(UserCommand::Quit);
    let session = runtime.await??;
    tracing::info!(
        steps = session.steps().len(),
        current = session.current_index(),
        "ChefSpeak stopped"
    );
    Ok(())
}
