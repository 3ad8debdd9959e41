//! Assistant configuration.
//!
//! Precedence: environment (`CHEFSPEAK_SECTION__KEY`) > TOML file (`CHEFSPEAK_CONFIG` path,
//! else `config/chefspeak.toml`) > built-in defaults.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | chat.api_base | https://api.openai.com/v1 | OpenAI-compatible base URL |
//! | chat.api_key | (none) | Bearer token; falls back to `OPENAI_API_KEY` |
//! | chat.model | gpt-4o | Chat model |
//! | chat.temperature | 0.7 | Sampling temperature |
//! | chat.max_steps | 15 | Upper bound asked of the model |
//! | speech.settle_delay_ms | 250 | Pause between cancelling speech and the next speak |
//! | speech.restart_delay_ms | 400 | Pause between end of speech and restarting recognition |
//! | speech.command_language | en-US | Recognition language once steps are loaded |
//! | tts.backend | console | `console`, `speak_endpoint` or `openai` |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::chat::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::error::CoreResult;
use crate::language::Language;
use crate::prompts::DEFAULT_MAX_STEPS;
use crate::steps::StepFormat;

const DEFAULT_CONFIG_PATH: &str = "config/chefspeak.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_steps: usize,
    pub timeout_secs: u64,
}

impl ChatSettings {
    /// Configured key, else `OPENAI_API_KEY`. Blank values count as unset.
    pub fn resolved_api_key(&self) -> Option<String> {
        fn usable(key: &str) -> Option<String> {
            let key = key.trim();
            (!key.is_empty()).then(|| key.to_string())
        }

        self.api_key
            .as_deref()
            .and_then(usable)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok().as_deref().and_then(usable))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    pub settle_delay_ms: u64,
    pub restart_delay_ms: u64,
    pub rate: f32,
    /// Recognition language for navigation commands once steps exist.
    pub command_language: String,
    /// Fixed synthesis language; when unset the preferred language's tag is used.
    #[serde(default)]
    pub synthesis_language: Option<String>,
    pub step_format: StepFormat,
}

impl SpeechSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Which text-to-speech path the front end wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsBackendKind {
    /// Print the step and simulate playback time.
    #[default]
    Console,
    /// POST `{text, language}` to a local speak service and play the returned audio.
    SpeakEndpoint,
    /// OpenAI `/audio/speech` and play the returned audio.
    Openai,
}

impl FromStr for TtsBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "console" => Ok(Self::Console),
            "speak_endpoint" => Ok(Self::SpeakEndpoint),
            "openai" => Ok(Self::Openai),
            other => Err(format!("unknown TTS backend: {}", other)),
        }
    }
}

impl fmt::Display for TtsBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Console => "console",
            Self::SpeakEndpoint => "speak_endpoint",
            Self::Openai => "openai",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsSettings {
    pub backend: TtsBackendKind,
    pub speak_endpoint: String,
    pub openai_model: String,
    pub openai_voice: String,
    /// Player invoked with the audio file path appended as last argument.
    pub player_command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSettings {
    pub store_path: String,
    pub default_language: Language,
}

/// Full assistant configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub chat: ChatSettings,
    pub speech: SpeechSettings,
    pub tts: TtsSettings,
    pub profile: ProfileSettings,
}

impl AssistantConfig {
    /// Load from the configured file path and environment.
    pub fn load() -> CoreResult<Self> {
        let path = std::env::var("CHEFSPEAK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load with an explicit file path. A missing file is not an error.
    pub fn load_from(path: &Path) -> CoreResult<Self> {
        let builder = config::Config::builder()
            .set_default("chat.api_base", DEFAULT_API_BASE)?
            .set_default("chat.model", DEFAULT_MODEL)?
            .set_default("chat.temperature", 0.7_f64)?
            .set_default("chat.max_steps", DEFAULT_MAX_STEPS as i64)?
            .set_default("chat.timeout_secs", 60_i64)?
            .set_default("speech.settle_delay_ms", 250_i64)?
            .set_default("speech.restart_delay_ms", 400_i64)?
            .set_default("speech.rate", 1.0_f64)?
            .set_default("speech.command_language", "en-US")?
            .set_default("speech.step_format", "auto")?
            .set_default("tts.backend", "console")?
            .set_default("tts.speak_endpoint", "http://localhost:3001/api/speak")?
            .set_default("tts.openai_model", "tts-1")?
            .set_default("tts.openai_voice", "nova")?
            .set_default("tts.player_command", "ffplay -nodisp -autoexit -loglevel quiet")?
            .set_default("profile.store_path", "./data/profiles")?
            .set_default("profile.default_language", "English")?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("CHEFSPEAK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(built.try_deserialize()?)
    }
}
