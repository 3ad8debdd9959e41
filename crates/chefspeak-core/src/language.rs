//! Supported assistant languages and their BCP-47 tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language a user prefers for recipe replies and dish queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Hindi,
    Telugu,
    Tamil,
}

impl Language {
    pub const ALL: [Language; 4] = [Self::English, Self::Hindi, Self::Telugu, Self::Tamil];

    /// Display name, also the form stored in user profiles.
    pub fn name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Telugu => "Telugu",
            Self::Tamil => "Tamil",
        }
    }

    /// Recognition/synthesis language tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::English => "en-IN",
            Self::Hindi => "hi-IN",
            Self::Telugu => "te-IN",
            Self::Tamil => "ta-IN",
        }
    }

    /// Case-insensitive lookup by name; unknown names resolve to English.
    pub fn from_name_or_default(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported language: {}", s))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
