use serde::Serialize;
use thiserror::Error;

use ignite_shared::{RoomId, ValidationError};
use ignite_store::StoreError;

/// Failure reported by the storage collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Record not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Network / storage failure. Retrying later may succeed.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::Forbidden { .. } => Self::Forbidden(err.to_string()),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("Not in a room")]
    NotInRoom,

    #[error("Session file error: {0}")]
    Session(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// User-initiated operations whose failures are shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    LoadRooms,
    CreateRoom,
    JoinRoom,
    LoadMessages,
    SendMessage,
}

impl UserAction {
    fn failure_text(&self) -> &'static str {
        match self {
            Self::LoadRooms => "Failed to load chat rooms.",
            Self::CreateRoom => "Failed to create room. Please try again.",
            Self::JoinRoom => "Failed to join room. Please try again.",
            Self::LoadMessages => "Failed to load messages.",
            Self::SendMessage => "Failed to send message. Please try again.",
        }
    }
}

/// A transient, user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
}

impl ClientError {
    /// Validation failures explain themselves; everything else gets the
    /// generic "try again" text for the action.
    pub fn notice(&self, action: UserAction) -> Notice {
        match self {
            Self::Validation(err) => Notice {
                title: "Invalid input".to_string(),
                description: err.to_string(),
            },
            Self::RoomNotFound(_) => Notice {
                title: "Error".to_string(),
                description: "That room no longer exists.".to_string(),
            },
            Self::NotInRoom => Notice {
                title: "Error".to_string(),
                description: "Join a room first.".to_string(),
            },
            _ => Notice {
                title: "Error".to_string(),
                description: action.failure_text().to_string(),
            },
        }
    }
}
