//! The storage collaborator facade.
//!
//! [`Store`] serialises every write behind one lock, assigns server-side ids
//! and timestamps, checks that membership rows are only written by their own
//! user, and publishes a [`ChangeEvent`] for each committed change while still
//! holding the lock, so subscribers observe commit order.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::broadcast;
use tracing::debug;

use ignite_shared::{RoomId, UserName};

use crate::changes::{ChangeEvent, ChangeFilter, ChangeSubscription};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{
    truncate_ts, Membership, Message, MessageKey, NewMessage, NewRoom, Room, SortOrder,
};

/// Events buffered per subscriber before it starts lagging.
pub const CHANGE_FEED_CAPACITY: usize = 1024;

pub struct Store {
    db: Mutex<Database>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Store {
    pub fn new(db: Database) -> Self {
        Self::with_feed_capacity(db, CHANGE_FEED_CAPACITY)
    }

    pub fn with_feed_capacity(db: Database, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        Self {
            db: Mutex::new(db),
            changes,
        }
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// A handle that performs writes on behalf of `caller`.
    pub fn session(self: &Arc<Self>, caller: UserName) -> StoreSession {
        StoreSession {
            store: Arc::clone(self),
            caller,
        }
    }

    /// Subscribe to committed changes. Only events published after this call
    /// are delivered.
    pub fn subscribe(&self, filter: ChangeFilter) -> ChangeSubscription {
        ChangeSubscription::new(self.changes.subscribe(), filter)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn publish(&self, event: ChangeEvent) {
        debug!(table = ?event.table(), kind = ?event.kind(), room = %event.room_id(), "change");
        // No subscribers is fine.
        let _ = self.changes.send(event);
    }

    fn authorize(caller: &UserName, owner: &UserName) -> Result<()> {
        if caller != owner {
            return Err(StoreError::Forbidden {
                caller: caller.to_string(),
                owner: owner.to_string(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn list_rooms(&self) -> Result<Vec<Room>> {
        self.lock()?.list_rooms()
    }

    pub fn get_room(&self, id: RoomId) -> Result<Room> {
        self.lock()?.get_room(id)
    }

    pub fn list_memberships(&self, room_id: Option<RoomId>) -> Result<Vec<Membership>> {
        self.lock()?.list_memberships(room_id)
    }

    /// Members of `room_id` with `now - last_activity <= window`. A window
    /// reaching past the epoch counts every record.
    pub fn count_active_members(
        &self,
        room_id: RoomId,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> Result<usize> {
        let cutoff = now
            .checked_sub_signed(window)
            .map_or(DateTime::<Utc>::UNIX_EPOCH, |cutoff| {
                cutoff.max(DateTime::<Utc>::UNIX_EPOCH)
            });
        self.lock()?.count_members_since(room_id, cutoff)
    }

    pub fn list_messages(
        &self,
        room_id: RoomId,
        order: SortOrder,
        limit: u32,
    ) -> Result<Vec<Message>> {
        self.lock()?.list_messages(room_id, order, limit)
    }

    /// Newest messages across all rooms, newest first.
    pub fn latest_messages(&self, limit: u32) -> Result<Vec<Message>> {
        self.lock()?.latest_messages(limit)
    }

    pub fn list_messages_after(
        &self,
        room_id: RoomId,
        after: MessageKey,
        limit: u32,
    ) -> Result<Vec<Message>> {
        self.lock()?.list_messages_after(room_id, after, limit)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Create a room and its owner's membership row in one transaction.
    pub fn create_room(&self, caller: &UserName, new_room: NewRoom) -> Result<Room> {
        Self::authorize(caller, &new_room.owner_name)?;

        let db = self.lock()?;
        let now = truncate_ts(Utc::now());
        let room = Room {
            id: RoomId::new(),
            name: new_room.name,
            visibility: new_room.visibility,
            owner_name: new_room.owner_name,
            session_id: new_room.session_id,
            created_at: now,
            updated_at: now,
        };

        let tx = db.conn().unchecked_transaction()?;
        db.create_room(&room)?;
        db.insert_membership_if_absent(room.id, &room.owner_name, true, now)?;
        tx.commit()?;

        let owner = db
            .get_membership(room.id, &room.owner_name)?
            .ok_or(StoreError::NotFound)?;

        self.publish(ChangeEvent::RoomInserted(room.clone()));
        self.publish(ChangeEvent::MemberInserted(owner));
        Ok(room)
    }

    /// Append a message and bump the room's `updated_at`.
    pub fn insert_message(&self, caller: &UserName, message: NewMessage) -> Result<Message> {
        Self::authorize(caller, &message.user_name)?;

        let db = self.lock()?;
        db.get_room(message.room_id)?;

        let stored = db.insert_message(&message, Utc::now())?;
        let bumped = db.touch_room(stored.room_id, stored.created_at)?;

        self.publish(ChangeEvent::MessageInserted(stored.clone()));
        if bumped {
            self.publish(ChangeEvent::RoomUpdated(db.get_room(stored.room_id)?));
        }
        Ok(stored)
    }

    pub fn upsert_membership(
        &self,
        caller: &UserName,
        room_id: RoomId,
        user_name: &UserName,
        last_activity: DateTime<Utc>,
    ) -> Result<Membership> {
        Self::authorize(caller, user_name)?;

        let db = self.lock()?;
        db.get_room(room_id)?;

        let (member, inserted) = db.upsert_membership(room_id, user_name, last_activity)?;
        self.publish(if inserted {
            ChangeEvent::MemberInserted(member.clone())
        } else {
            ChangeEvent::MemberUpdated(member.clone())
        });
        Ok(member)
    }

    /// Insert a membership row unless the key already exists.
    ///
    /// Only the room's owner may claim the owner flag.
    pub fn insert_membership_if_absent(
        &self,
        caller: &UserName,
        room_id: RoomId,
        user_name: &UserName,
        is_owner: bool,
    ) -> Result<bool> {
        Self::authorize(caller, user_name)?;

        let db = self.lock()?;
        let room = db.get_room(room_id)?;
        if is_owner {
            Self::authorize(caller, &room.owner_name)?;
        }

        let inserted = db.insert_membership_if_absent(room_id, user_name, is_owner, Utc::now())?;
        if inserted {
            let member = db
                .get_membership(room_id, user_name)?
                .ok_or(StoreError::NotFound)?;
            self.publish(ChangeEvent::MemberInserted(member));
        }
        Ok(inserted)
    }

    /// Remove a membership row. Deleting a missing row is a no-op.
    pub fn delete_membership(
        &self,
        caller: &UserName,
        room_id: RoomId,
        user_name: &UserName,
    ) -> Result<bool> {
        Self::authorize(caller, user_name)?;

        let db = self.lock()?;
        let deleted = db.delete_membership(room_id, user_name)?;
        if deleted {
            self.publish(ChangeEvent::MemberDeleted {
                room_id,
                user_name: user_name.clone(),
            });
        }
        Ok(deleted)
    }
}

/// A [`Store`] bound to the display name it writes as.
#[derive(Clone)]
pub struct StoreSession {
    store: Arc<Store>,
    caller: UserName,
}

impl StoreSession {
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn caller(&self) -> &UserName {
        &self.caller
    }
}
