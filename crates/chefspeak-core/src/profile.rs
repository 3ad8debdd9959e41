//! User profiles: the stored language preference, keyed by user id.
//! Sled-backed; one JSON record per user under `user/<id>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::CoreResult;
use crate::language::Language;

const USER_PREFIX: &str = "user/";

/// Stored profile record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Language name as entered by the user (e.g. "Hindi").
    pub language: String,
    pub updated_at: DateTime<Utc>,
}

/// Lookup of a signed-in user's preferences.
pub trait ProfileStore: Send + Sync {
    /// Preferred language, or `None` when the user has no profile.
    fn preferred_language(&self, user_id: &str) -> CoreResult<Option<Language>>;

    fn set_preferred_language(&self, user_id: &str, language: Language) -> CoreResult<()>;
}

pub struct SledProfileStore {
    db: sled::Db,
}

impl SledProfileStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let db = sled::open(path.as_ref())?;
        Ok(Self { db })
    }

    /// In-memory store that is discarded on drop.
    pub fn temporary() -> CoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn key(user_id: &str) -> String {
        format!("{}{}", USER_PREFIX, user_id.trim())
    }

    pub fn profile(&self, user_id: &str) -> CoreResult<Option<UserProfile>> {
        match self.db.get(Self::key(user_id).as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl ProfileStore for SledProfileStore {
    fn preferred_language(&self, user_id: &str) -> CoreResult<Option<Language>> {
        Ok(self
            .profile(user_id)?
            .map(|p| Language::from_name_or_default(&p.language)))
    }

    fn set_preferred_language(&self, user_id: &str, language: Language) -> CoreResult<()> {
        let record = UserProfile {
            language: language.name().to_string(),
            updated_at: Utc::now(),
        };
        self.db
            .insert(Self::key(user_id).as_bytes(), serde_json::to_vec(&record)?)?;
        self.db.flush()?;
        Ok(())
    }
}

/// Language for this session: the user's stored preference, else `fallback`.
/// Lookup failures are logged, not propagated.
pub fn resolve_language(store: &dyn ProfileStore, user_id: Option<&str>, fallback: Language) -> Language {
    let Some(user_id) = user_id.filter(|id| !id.trim().is_empty()) else {
        return fallback;
    };
    match store.preferred_language(user_id) {
        Ok(Some(language)) => language,
        Ok(None) => fallback,
        Err(e) => {
            warn!(user_id, error = %e, "failed to fetch language preference");
            fallback
        }
    }
}
