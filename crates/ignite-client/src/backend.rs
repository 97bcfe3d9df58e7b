//! The storage collaborator as seen by the client core.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use ignite_shared::{RoomId, UserName};
use ignite_store::{
    ChangeFilter, ChangeSubscription, Membership, Message, MessageKey, NewMessage, NewRoom, Room,
    SortOrder, StoreSession,
};

pub use crate::error::BackendError;

pub type BackendResult<T> = Result<T, BackendError>;

/// Relational store, row change notifications and the membership RPCs.
///
/// Writes are performed on behalf of a single display name; rows belonging
/// to someone else are rejected with [`BackendError::Forbidden`].
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_rooms(&self) -> BackendResult<Vec<Room>>;

    async fn get_room(&self, room_id: RoomId) -> BackendResult<Room>;

    /// Insert a room together with its owner's membership.
    async fn create_room(&self, new_room: NewRoom) -> BackendResult<Room>;

    /// Insert, or rewrite only `last_activity` of an existing record.
    async fn upsert_membership(
        &self,
        room_id: RoomId,
        user_name: &UserName,
        last_activity: DateTime<Utc>,
    ) -> BackendResult<Membership>;

    /// Returns `false` when the record already existed; it is left untouched.
    async fn insert_membership_if_absent(
        &self,
        room_id: RoomId,
        user_name: &UserName,
        is_owner: bool,
    ) -> BackendResult<bool>;

    /// Idempotent. Returns whether a record was removed.
    async fn delete_membership(&self, room_id: RoomId, user_name: &UserName)
        -> BackendResult<bool>;

    async fn count_active_members(
        &self,
        room_id: RoomId,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> BackendResult<usize>;

    async fn list_memberships(&self, room_id: Option<RoomId>) -> BackendResult<Vec<Membership>>;

    async fn insert_message(&self, message: NewMessage) -> BackendResult<Message>;

    async fn list_messages(
        &self,
        room_id: RoomId,
        order: SortOrder,
        limit: u32,
    ) -> BackendResult<Vec<Message>>;

    /// Messages strictly after `after` in ordering-key order, ascending.
    async fn list_messages_after(
        &self,
        room_id: RoomId,
        after: MessageKey,
        limit: u32,
    ) -> BackendResult<Vec<Message>>;

    /// Only changes committed after this call are delivered.
    async fn subscribe(&self, filter: ChangeFilter) -> BackendResult<ChangeSubscription>;
}

#[async_trait]
impl Backend for StoreSession {
    async fn list_rooms(&self) -> BackendResult<Vec<Room>> {
        Ok(self.store().list_rooms()?)
    }

    async fn get_room(&self, room_id: RoomId) -> BackendResult<Room> {
        Ok(self.store().get_room(room_id)?)
    }

    async fn create_room(&self, new_room: NewRoom) -> BackendResult<Room> {
        Ok(self.store().create_room(self.caller(), new_room)?)
    }

    async fn upsert_membership(
        &self,
        room_id: RoomId,
        user_name: &UserName,
        last_activity: DateTime<Utc>,
    ) -> BackendResult<Membership> {
        Ok(self
            .store()
            .upsert_membership(self.caller(), room_id, user_name, last_activity)?)
    }

    async fn insert_membership_if_absent(
        &self,
        room_id: RoomId,
        user_name: &UserName,
        is_owner: bool,
    ) -> BackendResult<bool> {
        Ok(self
            .store()
            .insert_membership_if_absent(self.caller(), room_id, user_name, is_owner)?)
    }

    async fn delete_membership(
        &self,
        room_id: RoomId,
        user_name: &UserName,
    ) -> BackendResult<bool> {
        Ok(self
            .store()
            .delete_membership(self.caller(), room_id, user_name)?)
    }

    async fn count_active_members(
        &self,
        room_id: RoomId,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> BackendResult<usize> {
        Ok(self.store().count_active_members(room_id, now, window)?)
    }

    async fn list_memberships(&self, room_id: Option<RoomId>) -> BackendResult<Vec<Membership>> {
        Ok(self.store().list_memberships(room_id)?)
    }

    async fn insert_message(&self, message: NewMessage) -> BackendResult<Message> {
        Ok(self.store().insert_message(self.caller(), message)?)
    }

    async fn list_messages(
        &self,
        room_id: RoomId,
        order: SortOrder,
        limit: u32,
    ) -> BackendResult<Vec<Message>> {
        Ok(self.store().list_messages(room_id, order, limit)?)
    }

    async fn list_messages_after(
        &self,
        room_id: RoomId,
        after: MessageKey,
        limit: u32,
    ) -> BackendResult<Vec<Message>> {
        Ok(self.store().list_messages_after(room_id, after, limit)?)
    }

    async fn subscribe(&self, filter: ChangeFilter) -> BackendResult<ChangeSubscription> {
        Ok(self.store().subscribe(filter))
    }
}
