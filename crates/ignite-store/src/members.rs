//! Room-membership records: one presence row per `(room_id, user_name)`.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use ignite_shared::{RoomId, UserName};

use crate::database::Database;
use crate::error::Result;
use crate::models::{decode_room_id, decode_ts, encode_ts, truncate_ts, Membership};

const MEMBER_COLUMNS: &str = "room_id, user_name, last_activity, is_owner";

impl Database {
    pub fn get_membership(&self, room_id: RoomId, user_name: &UserName) -> Result<Option<Membership>> {
        let member = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {MEMBER_COLUMNS} FROM room_members
                     WHERE room_id = ?1 AND user_name = ?2"
                ),
                params![room_id.to_string(), user_name.as_str()],
                row_to_membership,
            )
            .optional()?;
        Ok(member)
    }

    /// Insert or refresh a presence row. On conflict only `last_activity`
    /// is rewritten; the owner flag keeps its first value.
    ///
    /// Returns the stored row and whether it was newly created.
    pub fn upsert_membership(
        &self,
        room_id: RoomId,
        user_name: &UserName,
        last_activity: DateTime<Utc>,
    ) -> Result<(Membership, bool)> {
        let existed = self.get_membership(room_id, user_name)?.is_some();

        self.conn().execute(
            "INSERT INTO room_members (room_id, user_name, last_activity, is_owner)
             VALUES (?1, ?2, ?3, 0)
             ON CONFLICT (room_id, user_name)
             DO UPDATE SET last_activity = excluded.last_activity",
            params![
                room_id.to_string(),
                user_name.as_str(),
                encode_ts(&truncate_ts(last_activity)),
            ],
        )?;

        let member = self
            .get_membership(room_id, user_name)?
            .ok_or(crate::StoreError::NotFound)?;
        Ok((member, !existed))
    }

    /// Insert a row unless one already exists for the key. An existing row
    /// is left untouched. Returns `true` if a row was inserted.
    pub fn insert_membership_if_absent(
        &self,
        room_id: RoomId,
        user_name: &UserName,
        is_owner: bool,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO room_members (room_id, user_name, last_activity, is_owner)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                room_id.to_string(),
                user_name.as_str(),
                encode_ts(&truncate_ts(now)),
                is_owner,
            ],
        )?;
        Ok(affected > 0)
    }

    /// Remove a row. Returns `true` if one was deleted.
    pub fn delete_membership(&self, room_id: RoomId, user_name: &UserName) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM room_members WHERE room_id = ?1 AND user_name = ?2",
            params![room_id.to_string(), user_name.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// All rows of one room, or of every room when `room_id` is `None`.
    pub fn list_memberships(&self, room_id: Option<RoomId>) -> Result<Vec<Membership>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM room_members
             WHERE ?1 IS NULL OR room_id = ?1
             ORDER BY room_id ASC, user_name ASC"
        ))?;
        let rows = stmt.query_map(params![room_id.map(|r| r.to_string())], row_to_membership)?;

        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    /// Rows of `room_id` whose last activity is at or after `cutoff`.
    pub fn count_members_since(&self, room_id: RoomId, cutoff: DateTime<Utc>) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM room_members
             WHERE room_id = ?1 AND last_activity >= ?2",
            params![room_id.to_string(), encode_ts(&truncate_ts(cutoff))],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn row_to_membership(row: &rusqlite::Row<'_>) -> rusqlite::Result<Membership> {
    let room_id_str: String = row.get(0)?;
    let user_name: String = row.get(1)?;
    let ts_str: String = row.get(2)?;
    let is_owner: bool = row.get(3)?;

    Ok(Membership {
        room_id: decode_room_id(0, &room_id_str)?,
        user_name: UserName::unchecked(user_name),
        last_activity: decode_ts(2, &ts_str)?,
        is_owner,
    })
}
