//! Domain model structs persisted in the chat database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can travel in
//! change events and be handed to the export job unchanged.

use chrono::{DateTime, DurationRound, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use ignite_shared::{MessageId, RoomId, RoomVisibility, SessionId, UserName};

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A chat room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    /// Trimmed display name, 1..=50 characters.
    pub name: String,
    pub visibility: RoomVisibility,
    /// Display name of the creator.
    pub owner_name: UserName,
    /// Session token of the client that created the room.
    pub session_id: Option<SessionId>,
    pub created_at: DateTime<Utc>,
    /// Bumped whenever a message is posted to the room.
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the client when creating a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewRoom {
    pub name: String,
    pub visibility: RoomVisibility,
    pub owner_name: UserName,
    pub session_id: Option<SessionId>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Optional attachment reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Media {
    pub url: String,
    pub media_type: Option<String>,
}

/// A single chat message. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_name: UserName,
    pub body: String,
    pub media: Option<Media>,
    /// Server-assigned; never earlier than the previous message in the room.
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn key(&self) -> MessageKey {
        MessageKey {
            created_at: self.created_at,
            id: self.id,
        }
    }
}

/// Total order of messages within a room: timestamp, then insertion order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageKey {
    pub created_at: DateTime<Utc>,
    pub id: MessageId,
}

/// Fields supplied by the client when posting a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub user_name: UserName,
    pub body: String,
    pub media: Option<Media>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// One user's presence claim in one room. Keyed by `(room_id, user_name)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Membership {
    pub room_id: RoomId,
    pub user_name: UserName,
    pub last_activity: DateTime<Utc>,
    /// Set on first insert only.
    pub is_owner: bool,
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Drop sub-microsecond precision so a value survives a database round trip.
pub fn truncate_ts(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::microseconds(1)).unwrap_or(ts)
}

/// Fixed-width encoding; lexicographic order equals chronological order.
pub fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn decode_room_id(idx: usize, s: &str) -> rusqlite::Result<RoomId> {
    RoomId::parse(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
