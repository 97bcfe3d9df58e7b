use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use ignite_shared::{MessageId, RoomId, UserName};

use crate::database::Database;
use crate::error::Result;
use crate::models::{
    decode_room_id, decode_ts, encode_ts, truncate_ts, Media, Message, MessageKey, NewMessage,
    SortOrder,
};

const MESSAGE_COLUMNS: &str = "id, room_id, user_name, body, media_url, media_type, created_at";

impl Database {
    /// Append a message. The id comes from SQLite; `created_at` is `now`
    /// clamped so it never precedes the room's latest message.
    pub fn insert_message(&self, message: &NewMessage, now: DateTime<Utc>) -> Result<Message> {
        let latest: Option<String> = self
            .conn()
            .query_row(
                "SELECT MAX(created_at) FROM messages WHERE room_id = ?1",
                params![message.room_id.to_string()],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();

        let mut created_at = truncate_ts(now);
        if let Some(latest) = latest {
            let latest = decode_ts(0, &latest)?;
            if latest > created_at {
                created_at = latest;
            }
        }

        self.conn().execute(
            "INSERT INTO messages (room_id, user_name, body, media_url, media_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.room_id.to_string(),
                message.user_name.as_str(),
                message.body,
                message.media.as_ref().map(|m| m.url.as_str()),
                message.media.as_ref().and_then(|m| m.media_type.as_deref()),
                encode_ts(&created_at),
            ],
        )?;

        Ok(Message {
            id: MessageId(self.conn().last_insert_rowid()),
            room_id: message.room_id,
            user_name: message.user_name.clone(),
            body: message.body.clone(),
            media: message.media.clone(),
            created_at,
        })
    }

    /// Up to `limit` messages of a room. `Ascending` returns the oldest,
    /// `Descending` the newest, each in the requested order.
    pub fn list_messages(
        &self,
        room_id: RoomId,
        order: SortOrder,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let direction = match order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE room_id = ?1
             ORDER BY created_at {direction}, id {direction}
             LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![room_id.to_string(), limit], row_to_message)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Messages strictly after `after` in room order, oldest first.
    pub fn list_messages_after(
        &self,
        room_id: RoomId,
        after: MessageKey,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let ts = encode_ts(&after.created_at);
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE room_id = ?1
               AND (created_at > ?2 OR (created_at = ?2 AND id > ?3))
             ORDER BY created_at ASC, id ASC
             LIMIT ?4"
        ))?;

        let rows = stmt.query_map(
            params![room_id.to_string(), ts, after.id.0, limit],
            row_to_message,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Newest messages across every room, newest first.
    pub fn latest_messages(&self, limit: u32) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             ORDER BY created_at DESC, id DESC
             LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], row_to_message)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id: i64 = row.get(0)?;
    let room_id_str: String = row.get(1)?;
    let user_name: String = row.get(2)?;
    let body: String = row.get(3)?;
    let media_url: Option<String> = row.get(4)?;
    let media_type: Option<String> = row.get(5)?;
    let ts_str: String = row.get(6)?;

    Ok(Message {
        id: MessageId(id),
        room_id: decode_room_id(1, &room_id_str)?,
        user_name: UserName::unchecked(user_name),
        body,
        media: media_url.map(|url| Media { url, media_type }),
        created_at: decode_ts(6, &ts_str)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use ignite_shared::{RoomVisibility, SessionId};

    use super::*;
    use crate::models::Room;

    fn setup() -> (Database, RoomId) {
        let db = Database::open_in_memory().unwrap();
        let now = truncate_ts(Utc::now());
        let room = Room {
            id: RoomId::new(),
            name: "lobby".into(),
            visibility: RoomVisibility::Public,
            owner_name: UserName::unchecked("alice"),
            session_id: Some(SessionId::unchecked("s1")),
            created_at: now,
            updated_at: now,
        };
        db.create_room(&room).unwrap();
        (db, room.id)
    }

    fn new_msg(room_id: RoomId, body: &str) -> NewMessage {
        NewMessage {
            room_id,
            user_name: UserName::unchecked("alice"),
            body: body.into(),
            media: None,
        }
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let (db, room) = setup();
        let now = Utc::now();
        let a = db.insert_message(&new_msg(room, "a"), now).unwrap();
        let b = db.insert_message(&new_msg(room, "b"), now).unwrap();
        assert!(a.id < b.id);
        assert!(a.key() < b.key());
        assert_eq!(db.latest_messages(1).unwrap(), [b]);
    }

    #[test]
    fn test_created_at_never_goes_backwards() {
        let (db, room) = setup();
        let now = Utc::now();
        let a = db.insert_message(&new_msg(room, "a"), now).unwrap();
        let b = db
            .insert_message(&new_msg(room, "b"), now - TimeDelta::seconds(30))
            .unwrap();
        assert_eq!(b.created_at, a.created_at);
        assert!(a.key() < b.key());
    }

    #[test]
    fn test_list_messages_limit_applies_per_direction() {
        let (db, room) = setup();
        let t0 = Utc::now();
        for i in 0..5 {
            db.insert_message(&new_msg(room, &i.to_string()), t0 + TimeDelta::seconds(i))
                .unwrap();
        }
        let bodies = |order| -> Vec<String> {
            db.list_messages(room, order, 3)
                .unwrap()
                .into_iter()
                .map(|m| m.body)
                .collect()
        };
        assert_eq!(bodies(SortOrder::Ascending), ["0", "1", "2"]);
        assert_eq!(bodies(SortOrder::Descending), ["4", "3", "2"]);
    }

    #[test]
    fn test_messages_after_key() {
        let (db, room) = setup();
        let now = Utc::now();
        let a = db.insert_message(&new_msg(room, "a"), now).unwrap();
        let b = db.insert_message(&new_msg(room, "b"), now).unwrap();
        let c = db.insert_message(&new_msg(room, "c"), now).unwrap();

        let after: Vec<_> = db
            .list_messages_after(room, a.key(), 10)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(after, [b.id, c.id]);
    }

    #[test]
    fn test_media_round_trip() {
        let (db, room) = setup();
        let mut msg = new_msg(room, "look");
        msg.media = Some(Media {
            url: "https://example.org/cat.png".into(),
            media_type: Some("image/png".into()),
        });
        let stored = db.insert_message(&msg, Utc::now()).unwrap();
        let listed = db.list_messages(room, SortOrder::Ascending, 10).unwrap();
        assert_eq!(listed, [stored]);
        assert_eq!(listed[0].media, msg.media);
    }
}
