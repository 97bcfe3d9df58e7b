//! Read-only snapshot of the chat database as spreadsheet rows.

use std::collections::HashMap;
use std::path::Path;

use ignite_shared::RoomId;
use ignite_store::{Database, Message, Room};

use crate::error::SyncError;

pub const HEADER: [&str; 5] = ["Room Name", "User Name", "Message", "Created At", "Room Type"];

const UNKNOWN_ROOM: &str = "Unknown";
const ROOM_TYPE: &str = "Chat Message";

/// Header row followed by one row per message, in the order given.
pub fn build_rows(messages: &[Message], rooms: &[Room]) -> Vec<Vec<String>> {
    let names: HashMap<RoomId, &str> = rooms.iter().map(|r| (r.id, r.name.as_str())).collect();

    let mut rows = Vec::with_capacity(messages.len() + 1);
    rows.push(HEADER.iter().map(|h| h.to_string()).collect());
    for message in messages {
        rows.push(vec![
            names
                .get(&message.room_id)
                .copied()
                .unwrap_or(UNKNOWN_ROOM)
                .to_string(),
            message.user_name.to_string(),
            message.body.clone(),
            message.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ROOM_TYPE.to_string(),
        ]);
    }
    rows
}

/// The `limit` most recent messages, newest first, as rows. Returns the
/// rows and the number of messages exported.
pub fn snapshot(path: &Path, limit: u32) -> Result<(Vec<Vec<String>>, usize), SyncError> {
    let db = Database::open_read_only(path)?;
    let rooms = db.list_rooms()?;
    let messages = db.latest_messages(limit)?;
    tracing::debug!(rooms = rooms.len(), messages = messages.len(), "snapshot read");
    Ok((build_rows(&messages, &rooms), messages.len()))
}
