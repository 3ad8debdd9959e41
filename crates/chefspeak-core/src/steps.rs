//! Instruction step extraction from a free-text model reply.
//!
//! Two marker styles are recognised: `Step N: text` lines (kept as written, minus
//! markdown emphasis) and plain numbered lines `N. text` / `N) text` (marker
//! stripped). The result may be empty; callers decide how to surface that.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One line of a labelled reply. Leading list, quote and heading decoration and
/// emphasis around the label are tolerated: `**Step 1:** Preheat`, `### Step 2. Mix`.
static LABELLED_STEP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[ \t>#*_-]*(step[ \t]*\d+)[ \t]*[*_]*[ \t]*([:.])[*_ \t]*(.*?)[*_ \t]*$")
        .expect("labelled step pattern")
});

static NUMBERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)[.)]\s*(.*)$").expect("numbered line pattern"));

/// Which step-marker convention to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepFormat {
    /// `Step 1: ...` segments, retained verbatim.
    Labelled,
    /// `1. ...` or `1) ...` lines, marker stripped.
    Numbered,
    /// Labelled first, numbered when no labelled step is found.
    #[default]
    Auto,
}

impl FromStr for StepFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "labelled" | "labeled" => Ok(Self::Labelled),
            "numbered" => Ok(Self::Numbered),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown step format: {}", other)),
        }
    }
}

/// Extract the ordered instruction steps from `text`.
pub fn parse_steps(text: &str, format: StepFormat) -> Vec<String> {
    match format {
        StepFormat::Labelled => labelled_steps(text),
        StepFormat::Numbered => numbered_steps(text),
        StepFormat::Auto => {
            let labelled = labelled_steps(text);
            if labelled.is_empty() {
                numbered_steps(text)
            } else {
                labelled
            }
        }
    }
}

fn labelled_steps(text: &str) -> Vec<String> {
    let mut steps = Vec::new();
    let mut lines = text.lines().map(str::trim).peekable();
    while let Some(line) = lines.next() {
        let Some(caps) = LABELLED_STEP.captures(line) else {
            continue;
        };
        let mut body = caps[3].to_string();
        // A label alone on its line takes the next line of prose as its text.
        if body.is_empty() {
            while lines.peek().is_some_and(|next| next.is_empty()) {
                lines.next();
            }
            if let Some(next) = lines.next_if(|next| !LABELLED_STEP.is_match(next)) {
                body = next.trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace()).to_string();
            }
        }
        if !body.is_empty() {
            steps.push(format!("{}{} {}", &caps[1], &caps[2], body));
        }
    }
    steps
}

fn numbered_steps(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| NUMBERED_LINE.captures(line))
        .filter_map(|caps| caps.get(2).map(|body| body.as_str().trim().to_string()))
        .filter(|body| !body.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_steps_are_kept_verbatim_in_order() {
        let reply = "Step 1: Preheat oven.\nStep 2: Mix batter.";
        assert_eq!(
            parse_steps(reply, StepFormat::Labelled),
            vec!["Step 1: Preheat oven.", "Step 2: Mix batter."]
        );
        assert_eq!(parse_steps(reply, StepFormat::Auto), parse_steps(reply, StepFormat::Labelled));
    }

    #[test]
    fn labelled_steps_ignore_surrounding_prose() {
        let reply = "Sure! Here is how to make dal.\n\nstep 1. Rinse the lentils.\r\nSTEP 2: Boil with turmeric.\nEnjoy your meal!";
        assert_eq!(
            parse_steps(reply, StepFormat::Labelled),
            vec!["step 1. Rinse the lentils.", "STEP 2: Boil with turmeric."]
        );
    }

    #[test]
    fn markdown_emphasis_around_labels_is_dropped() {
        let reply = "Here you go:\n\n**Step 1:** Preheat oven.\n**Step 2:** Mix batter.\n### Step 3. Bake 30 minutes.\n- __Step 4__: Cool.";
        assert_eq!(
            parse_steps(reply, StepFormat::Auto),
            vec![
                "Step 1: Preheat oven.",
                "Step 2: Mix batter.",
                "Step 3. Bake 30 minutes.",
                "Step 4: Cool."
            ]
        );
    }

    #[test]
    fn label_on_its_own_line_takes_the_next_line() {
        let reply = "Step 1:\nPreheat oven.\nStep 2:\n\nMix batter.";
        assert_eq!(
            parse_steps(reply, StepFormat::Auto),
            vec!["Step 1: Preheat oven.", "Step 2: Mix batter."]
        );
    }

    #[test]
    fn consecutive_labels_never_merge() {
        let reply = "Step 1:\nStep 2: Mix batter.\nStep 3:";
        assert_eq!(parse_steps(reply, StepFormat::Labelled), vec!["Step 2: Mix batter."]);
    }

    #[test]
    fn numbered_lines_have_markers_stripped() {
        let reply = "Ingredients are optional.\n  1. Heat the pan.\n2) Add oil\n\n3.Fry onions until golden.\n10. Serve.";
        assert_eq!(
            parse_steps(reply, StepFormat::Numbered),
            vec!["Heat the pan.", "Add oil", "Fry onions until golden.", "Serve."]
        );
    }

    #[test]
    fn numbered_marker_without_text_is_skipped() {
        assert_eq!(parse_steps("1.\n2. Stir.", StepFormat::Numbered), vec!["Stir."]);
    }

    #[test]
    fn auto_falls_back_to_numbered_lines() {
        let reply = "1. Boil water.\n2. Add pasta.";
        assert_eq!(parse_steps(reply, StepFormat::Auto), vec!["Boil water.", "Add pasta."]);
    }

    #[test]
    fn reply_without_markers_yields_nothing() {
        let reply = "I'm sorry, I can only help with recipes.";
        assert!(parse_steps(reply, StepFormat::Auto).is_empty());
        assert!(parse_steps("", StepFormat::Labelled).is_empty());
    }

    #[test]
    fn step_format_parses_from_config_strings() {
        assert_eq!("Labeled".parse::<StepFormat>().unwrap(), StepFormat::Labelled);
        assert_eq!(" numbered ".parse::<StepFormat>().unwrap(), StepFormat::Numbered);
        assert!("bullets".parse::<StepFormat>().is_err());
    }
}
