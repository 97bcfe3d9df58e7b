//! CRUD operations for [`Room`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use ignite_shared::{RoomId, RoomVisibility, SessionId, UserName};

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{decode_room_id, decode_ts, encode_ts, Room};

const ROOM_COLUMNS: &str = "id, name, visibility, owner_name, session_id, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new room.
    pub fn create_room(&self, room: &Room) -> Result<()> {
        self.conn().execute(
            "INSERT INTO rooms (id, name, visibility, owner_name, session_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                room.id.to_string(),
                room.name,
                room.visibility.as_str(),
                room.owner_name.as_str(),
                room.session_id.as_ref().map(SessionId::as_str),
                encode_ts(&room.created_at),
                encode_ts(&room.updated_at),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single room by id.
    pub fn get_room(&self, id: RoomId) -> Result<Room> {
        self.conn()
            .query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1"),
                params![id.to_string()],
                row_to_room,
            )
            .map_err(not_found)
    }

    /// List all rooms, most recently updated first.
    pub fn list_rooms(&self) -> Result<Vec<Room>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms
             ORDER BY updated_at DESC, created_at DESC, id ASC"
        ))?;

        let rows = stmt.query_map([], row_to_room)?;

        let mut rooms = Vec::new();
        for row in rows {
            rooms.push(row?);
        }
        Ok(rooms)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Move `updated_at` forward. Returns `false` if the room does not exist.
    pub fn touch_room(&self, id: RoomId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE rooms SET updated_at = ?1 WHERE id = ?2 AND updated_at < ?1",
            params![encode_ts(&at), id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Room`].
fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let visibility_str: String = row.get(2)?;
    let owner_name: String = row.get(3)?;
    let session_id: Option<String> = row.get(4)?;
    let created_str: String = row.get(5)?;
    let updated_str: String = row.get(6)?;

    Ok(Room {
        id: decode_room_id(0, &id_str)?,
        name,
        visibility: RoomVisibility::from_str_opt(&visibility_str).unwrap_or_default(),
        owner_name: UserName::unchecked(owner_name),
        session_id: session_id.map(SessionId::unchecked),
        created_at: decode_ts(5, &created_str)?,
        updated_at: decode_ts(6, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::models::truncate_ts;

    fn sample_room(name: &str, at: DateTime<Utc>) -> Room {
        Room {
            id: RoomId::new(),
            name: name.to_string(),
            visibility: RoomVisibility::Public,
            owner_name: UserName::unchecked("alice"),
            session_id: Some(SessionId::unchecked("abc123")),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_create_and_get() {
        let db = Database::open_in_memory().unwrap();
        let room = sample_room("lobby", truncate_ts(Utc::now()));
        db.create_room(&room).unwrap();

        assert_eq!(db.get_room(room.id).unwrap(), room);
        assert!(matches!(
            db.get_room(RoomId::new()),
            Err(crate::StoreError::NotFound)
        ));
    }

    #[test]
    fn test_list_orders_by_recent_update() {
        let db = Database::open_in_memory().unwrap();
        let t0 = truncate_ts(Utc::now());
        let older = sample_room("older", t0);
        let newer = sample_room("newer", t0 + TimeDelta::seconds(5));
        db.create_room(&older).unwrap();
        db.create_room(&newer).unwrap();

        let names: Vec<_> = db.list_rooms().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["newer", "older"]);

        assert!(db.touch_room(older.id, t0 + TimeDelta::seconds(10)).unwrap());
        let names: Vec<_> = db.list_rooms().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["older", "newer"]);
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let db = Database::open_in_memory().unwrap();
        let t0 = truncate_ts(Utc::now());
        let room = sample_room("lobby", t0);
        db.create_room(&room).unwrap();

        assert!(!db.touch_room(room.id, t0 - TimeDelta::seconds(1)).unwrap());
        assert_eq!(db.get_room(room.id).unwrap().updated_at, t0);
    }
}
