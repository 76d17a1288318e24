use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::ClientError;

/// A snapshot of the planner UI: form preferences, itinerary and chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSession {
    pub id: String,
    pub name: String,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub preferences: Value,
    #[serde(default)]
    pub itinerary: Value,
    #[serde(default)]
    pub chat: Vec<Value>,
}

impl SavedSession {
    pub fn new(name: &str, preferences: Value, itinerary: Value, chat: Vec<Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            saved_at: Utc::now(),
            preferences,
            itinerary,
            chat,
        }
    }
}

/// Saved sessions in a single JSON file, newest first.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn list(&self) -> Result<Vec<SavedSession>, ClientError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, sessions: &[SavedSession]) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(sessions)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Inserts the session, replacing any saved one with the same id.
    pub fn save(&self, session: SavedSession) -> Result<(), ClientError> {
        let mut sessions = self.list()?;
        sessions.retain(|s| s.id != session.id);
        sessions.push(session);
        sessions.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        self.write(&sessions)
    }

    pub fn load(&self, id: &str) -> Result<Option<SavedSession>, ClientError> {
        Ok(self.list()?.into_iter().find(|s| s.id == id))
    }

    /// Returns whether a session was removed.
    pub fn delete(&self, id: &str) -> Result<bool, ClientError> {
        let mut sessions = self.list()?;
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        if sessions.len() == before {
            return Ok(false);
        }
        self.write(&sessions)?;
        Ok(true)
    }
}
