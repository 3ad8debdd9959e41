//! Terminal input: control lines and typed "speech".

use chefspeak_voice::{Notice, Session, UserCommand};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Command(UserCommand),
    ShowSteps,
    Help,
    /// Anything that is not a control line is spoken to the recognizer.
    Speech(String),
    Empty,
    Invalid(String),
}

pub const HELP: &str = "\
:start      press the microphone
:abort      stop listening and speaking
:say N      speak step N (1-based)
:steps      list the loaded steps
:quit       exit
anything else is heard as speech while listening";

pub fn parse_line(line: &str) -> Line {
    let line = line.trim();
    if line.is_empty() {
        return Line::Empty;
    }
    let Some(control) = line.strip_prefix(':') else {
        return Line::Speech(line.to_string());
    };
    let mut parts = control.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("start"), None, _) => Line::Command(UserCommand::Start),
        (Some("abort"), None, _) => Line::Command(UserCommand::Abort),
        (Some("quit") | Some("q"), None, _) => Line::Command(UserCommand::Quit),
        (Some("steps"), None, _) => Line::ShowSteps,
        (Some("help"), None, _) => Line::Help,
        (Some("say"), Some(n), None) => match n.parse::<usize>() {
            Ok(n) if n >= 1 => Line::Command(UserCommand::SpeakStep(n - 1)),
            _ => Line::Invalid(format!("step numbers start at 1, got '{}'", n)),
        },
        _ => Line::Invalid(format!("unknown command ':{}' (try :help)", control)),
    }
}

/// Terminal rendering of a notice.
pub fn render(notice: &Notice) -> String {
    match notice {
        Notice::CapabilityMissing => "Speech recognition is not supported here.".to_string(),
        Notice::Listening { language } => format!("🎙  listening ({})...", language),
        Notice::Heard(text) => format!("heard: \"{}\"", text),
        Notice::NothingHeard => "didn't catch that.".to_string(),
        Notice::RecognitionFailed(code) => format!("speech recognition error: {}", code),
        Notice::FetchingRecipe(query) => format!("looking up \"{}\"...", query),
        Notice::RecipeRequestFailed(error) => format!("could not fetch the recipe: {}", error),
        Notice::NoStepsExtracted { reply } => {
            format!("no steps found in the reply; keeping the current recipe.\n{}", reply)
        }
        Notice::StepsLoaded { count } => format!("{} steps loaded.", count),
        Notice::SpeakingStep { index, total, .. } => format!("step {}/{}", index + 1, total),
        Notice::NothingToSpeak => "no recipe loaded yet; say a dish name first.".to_string(),
        Notice::SpeechFailed(error) => format!("could not speak the step: {}", error),
    }
}

pub fn render_steps(session: &Session) -> String {
    if !session.has_steps() {
        return "no steps loaded.".to_string();
    }
    session
        .steps()
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let marker = if i == session.current_index() { '>' } else { ' ' };
            format!("{} {:>2}. {}", marker, i + 1, step)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_lines() {
        assert_eq!(parse_line(":start"), Line::Command(UserCommand::Start));
        assert_eq!(parse_line("  :say 3 "), Line::Command(UserCommand::SpeakStep(2)));
        assert_eq!(parse_line(":steps"), Line::ShowSteps);
        assert_eq!(parse_line(":q"), Line::Command(UserCommand::Quit));
        assert!(matches!(parse_line(":say 0"), Line::Invalid(_)));
        assert!(matches!(parse_line(":say two"), Line::Invalid(_)));
        assert!(matches!(parse_line(":dance"), Line::Invalid(_)));
    }

    #[test]
    fn other_lines_are_speech() {
        assert_eq!(parse_line("  Next please "), Line::Speech("Next please".to_string()));
        assert_eq!(parse_line("   "), Line::Empty);
    }

    #[test]
    fn speaking_notice_is_one_based() {
        let notice = Notice::SpeakingStep {
            index: 0,
            total: 4,
            text: "Step 1: Rinse the rice.".to_string(),
        };
        assert_eq!(render(&notice), "step 1/4");
    }
}
