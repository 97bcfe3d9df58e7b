//! The client facade: one logged-in user, at most one open room.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use ignite_shared::RoomId;
use ignite_store::{Membership, Message, Room};

use crate::backend::{Backend, BackendError};
use crate::config;
use crate::context::ChatContext;
use crate::directory::RoomDirectory;
use crate::error::ClientError;
use crate::presence::PresenceTracker;
use crate::reaper;
use crate::stream::{self, MessageFeed};

/// How long shutdown waits for the final membership delete.
const LEAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Resources owned while a room is open.
pub struct RoomSession {
    room: Room,
    presence: Option<PresenceTracker>,
    cancel: watch::Sender<bool>,
    feed: Option<MessageFeed>,
}

impl RoomSession {
    pub fn room(&self) -> &Room {
        &self.room
    }

    /// The message feed can be taken once, typically by the renderer.
    pub fn take_feed(&mut self) -> Option<MessageFeed> {
        self.feed.take()
    }

    /// Returns the room and the pending membership delete.
    fn close(mut self) -> (Room, Option<JoinHandle<()>>) {
        let _ = self.cancel.send(true);
        let leave = self.presence.take().map(PresenceTracker::stop);
        (self.room.clone(), leave)
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

pub struct ChatClient {
    backend: Arc<dyn Backend>,
    ctx: ChatContext,
    directory: RoomDirectory,
    current: Option<RoomSession>,
    pending_leave: Option<JoinHandle<()>>,
}

impl ChatClient {
    pub fn new(backend: Arc<dyn Backend>, ctx: ChatContext) -> Self {
        let directory = RoomDirectory::new(Arc::clone(&backend), ctx.clone());
        Self {
            backend,
            ctx,
            directory,
            current: None,
            pending_leave: None,
        }
    }

    pub fn context(&self) -> &ChatContext {
        &self.ctx
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    pub fn current_room(&self) -> Option<&Room> {
        self.current.as_ref().map(RoomSession::room)
    }

    /// Leave the current room (if any), join `room_id`, open its feed and
    /// start announcing presence.
    pub async fn enter_room(&mut self, room_id: RoomId) -> Result<&mut RoomSession, ClientError> {
        let presence_interval =
            config::positive_interval("presence_interval", self.ctx.config().presence_interval)?;
        self.leave_room();
        // The previous delete must land before this join and announce.
        self.finish_leave().await;

        let room = match self.backend.get_room(room_id).await {
            Ok(room) => room,
            Err(BackendError::NotFound) => return Err(ClientError::RoomNotFound(room_id)),
            Err(e) => return Err(e.into()),
        };
        self.directory.join_room(room_id).await?;

        let config = self.ctx.config();
        let (cancel, cancel_rx) = watch::channel(false);
        let feed = stream::open(
            Arc::clone(&self.backend),
            room_id,
            config.history_limit,
            cancel_rx,
        )
        .await?;
        let presence = PresenceTracker::start(
            Arc::clone(&self.backend),
            room_id,
            self.ctx.user().clone(),
            presence_interval,
        )
        .await?;

        info!(room = %room.id, name = %room.name, user = %self.ctx.user(), "entered room");
        Ok(self.current.insert(RoomSession {
            room,
            presence: Some(presence),
            cancel,
            feed: Some(feed),
        }))
    }

    /// Stops presence and closes the feed before returning. The membership
    /// delete finishes in the background; the next [`enter_room`] or
    /// [`shutdown`] waits for it.
    ///
    /// [`enter_room`]: ChatClient::enter_room
    /// [`shutdown`]: ChatClient::shutdown
    pub fn leave_room(&mut self) -> Option<Room> {
        let session = self.current.take()?;
        let (room, leave) = session.close();
        self.pending_leave = leave;
        info!(room = %room.id, user = %self.ctx.user(), "left room");
        Some(room)
    }

    async fn finish_leave(&mut self) {
        if let Some(leave) = self.pending_leave.take() {
            if let Err(e) = leave.await {
                warn!(error = %e, "Membership delete task failed");
            }
        }
    }

    pub async fn send(&self, body: &str) -> Result<Message, ClientError> {
        let room = self.current_room().ok_or(ClientError::NotInRoom)?;
        stream::send(self.backend.as_ref(), &self.ctx, room.id, body).await
    }

    /// Active members of the current room, owner first.
    pub async fn active_members(&self) -> Result<Vec<Membership>, ClientError> {
        let room = self.current_room().ok_or(ClientError::NotInRoom)?;
        let records = self.backend.list_memberships(Some(room.id)).await?;
        Ok(reaper::active_members(
            &records,
            room.id,
            Utc::now(),
            self.ctx.freshness(),
        ))
    }

    pub async fn active_count(&self, room_id: RoomId) -> Result<usize, ClientError> {
        Ok(self
            .backend
            .count_active_members(room_id, Utc::now(), self.ctx.freshness())
            .await?)
    }

    /// Leave any open room and wait, up to a bound, for the membership
    /// delete to reach the store.
    pub async fn shutdown(&mut self) {
        self.leave_room();
        if tokio::time::timeout(LEAVE_TIMEOUT, self.finish_leave())
            .await
            .is_err()
        {
            warn!(user = %self.ctx.user(), "Membership delete timed out, record will expire");
        }
    }

    /// Shut down and drop the context.
    pub async fn logout(mut self) {
        self.shutdown().await;
        info!(user = %self.ctx.user(), "logged out");
    }
}
