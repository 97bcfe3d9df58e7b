//! Remembered login: display name and session token in a small JSON file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ignite_shared::{SessionId, UserName};

use crate::error::ClientError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedSession {
    pub user_name: Option<UserName>,
    pub session_id: SessionId,
}

pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// `session.json` next to the default database.
    pub fn default_path() -> Result<PathBuf, ClientError> {
        let dirs = ProjectDirs::from("chat", "ignite", "ignite")
            .ok_or_else(|| ClientError::Session("no application data directory".into()))?;
        Ok(dirs.data_dir().join("session.json"))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<SavedSession>, ClientError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ClientError::Session(e.to_string())),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| ClientError::Session(e.to_string()))
    }

    /// Load the saved session, or start a new one with a fresh token.
    pub fn load_or_create(&self) -> Result<SavedSession, ClientError> {
        if let Some(saved) = self.load()? {
            return Ok(saved);
        }
        let saved = SavedSession {
            user_name: None,
            session_id: SessionId::generate(),
        };
        self.save(&saved)?;
        debug!(session = %saved.session_id, "created new session");
        Ok(saved)
    }

    pub fn save(&self, session: &SavedSession) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ClientError::Session(e.to_string()))?;
        }
        let raw =
            serde_json::to_string_pretty(session).map_err(|e| ClientError::Session(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| ClientError::Session(e.to_string()))
    }

    /// Forget the name and the token. Missing file is fine.
    pub fn clear(&self) -> Result<(), ClientError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::Session(e.to_string())),
        }
    }
}
