//! Test doubles shared by the unit tests of this crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use ignite_shared::{RoomId, RoomVisibility, SessionId, UserName};
use ignite_store::{
    ChangeFilter, ChangeSubscription, Membership, Message, MessageKey, NewMessage, NewRoom, Room,
    SortOrder, Store, StoreSession,
};

use crate::backend::{Backend, BackendError, BackendResult};
use crate::config::ClientConfig;
use crate::context::ChatContext;

pub(crate) fn store_session(name: &str) -> (Arc<Store>, StoreSession) {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let session = store.session(UserName::unchecked(name));
    (store, session)
}

pub(crate) fn context(name: &str) -> ChatContext {
    ChatContext::new(
        UserName::unchecked(name),
        SessionId::unchecked("abc123"),
        ClientConfig::default(),
    )
}

pub(crate) async fn create_room(backend: &dyn Backend, owner: &str, name: &str) -> Room {
    backend
        .create_room(NewRoom {
            name: name.to_string(),
            visibility: RoomVisibility::Public,
            owner_name: UserName::unchecked(owner),
            session_id: None,
        })
        .await
        .unwrap()
}

/// Wraps a real session, counting calls and optionally failing them.
pub(crate) struct RecordingBackend {
    inner: StoreSession,
    pub upserts: AtomicUsize,
    pub deletes: AtomicUsize,
    pub inserts: AtomicUsize,
    pub failing: AtomicBool,
}

impl RecordingBackend {
    pub fn new(inner: StoreSession) -> Arc<Self> {
        Arc::new(Self {
            inner,
            upserts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        })
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> BackendResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn list_rooms(&self) -> BackendResult<Vec<Room>> {
        self.check()?;
        self.inner.list_rooms().await
    }

    async fn get_room(&self, room_id: RoomId) -> BackendResult<Room> {
        self.check()?;
        self.inner.get_room(room_id).await
    }

    async fn create_room(&self, new_room: NewRoom) -> BackendResult<Room> {
        self.check()?;
        self.inner.create_room(new_room).await
    }

    async fn upsert_membership(
        &self,
        room_id: RoomId,
        user_name: &UserName,
        last_activity: DateTime<Utc>,
    ) -> BackendResult<Membership> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner
            .upsert_membership(room_id, user_name, last_activity)
            .await
    }

    async fn insert_membership_if_absent(
        &self,
        room_id: RoomId,
        user_name: &UserName,
        is_owner: bool,
    ) -> BackendResult<bool> {
        self.check()?;
        self.inner
            .insert_membership_if_absent(room_id, user_name, is_owner)
            .await
    }

    async fn delete_membership(
        &self,
        room_id: RoomId,
        user_name: &UserName,
    ) -> BackendResult<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.delete_membership(room_id, user_name).await
    }

    async fn count_active_members(
        &self,
        room_id: RoomId,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> BackendResult<usize> {
        self.check()?;
        self.inner.count_active_members(room_id, now, window).await
    }

    async fn list_memberships(&self, room_id: Option<RoomId>) -> BackendResult<Vec<Membership>> {
        self.check()?;
        self.inner.list_memberships(room_id).await
    }

    async fn insert_message(&self, message: NewMessage) -> BackendResult<Message> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.insert_message(message).await
    }

    async fn list_messages(
        &self,
        room_id: RoomId,
        order: SortOrder,
        limit: u32,
    ) -> BackendResult<Vec<Message>> {
        self.check()?;
        self.inner.list_messages(room_id, order, limit).await
    }

    async fn list_messages_after(
        &self,
        room_id: RoomId,
        after: MessageKey,
        limit: u32,
    ) -> BackendResult<Vec<Message>> {
        self.check()?;
        self.inner.list_messages_after(room_id, after, limit).await
    }

    async fn subscribe(&self, filter: ChangeFilter) -> BackendResult<ChangeSubscription> {
        self.check()?;
        self.inner.subscribe(filter).await
    }
}
