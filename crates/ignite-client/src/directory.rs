//! Room list annotated with active-member counts.
//!
//! [`RoomDirectory::watch`] keeps a [`DirectoryState`] current from row
//! change notifications and re-publishes it on a timer, because members
//! expire without any event.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use ignite_shared::{validate, RoomId, RoomVisibility, UserName};
use ignite_store::{ChangeEvent, ChangeFilter, ChangeSubscription, Membership, NewRoom, Room, Table};

use crate::backend::{Backend, BackendError};
use crate::config;
use crate::context::ChatContext;
use crate::error::ClientError;
use crate::reaper;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub room: Room,
    pub active_count: usize,
}

/// Most recently updated first, then newest created, then id.
fn directory_order(a: &Room, b: &Room) -> Ordering {
    b.updated_at
        .cmp(&a.updated_at)
        .then(b.created_at.cmp(&a.created_at))
        .then(a.id.cmp(&b.id))
}

/// Local mirror of the `rooms` and `room_members` tables.
#[derive(Debug, Clone, Default)]
pub struct DirectoryState {
    rooms: HashMap<RoomId, Room>,
    members: HashMap<(RoomId, UserName), Membership>,
}

impl DirectoryState {
    pub fn from_snapshot(rooms: Vec<Room>, members: Vec<Membership>) -> Self {
        Self {
            rooms: rooms.into_iter().map(|r| (r.id, r)).collect(),
            members: members
                .into_iter()
                .map(|m| ((m.room_id, m.user_name.clone()), m))
                .collect(),
        }
    }

    /// Apply one change. Returns `false` for events that do not affect the
    /// directory.
    pub fn apply(&mut self, event: &ChangeEvent) -> bool {
        match event {
            ChangeEvent::RoomInserted(room) | ChangeEvent::RoomUpdated(room) => {
                self.rooms.insert(room.id, room.clone());
                true
            }
            ChangeEvent::MemberInserted(member) | ChangeEvent::MemberUpdated(member) => {
                self.members
                    .insert((member.room_id, member.user_name.clone()), member.clone());
                true
            }
            ChangeEvent::MemberDeleted { room_id, user_name } => self
                .members
                .remove(&(*room_id, user_name.clone()))
                .is_some(),
            ChangeEvent::MessageInserted(_) => false,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn active_count(&self, room_id: RoomId, now: DateTime<Utc>, window: TimeDelta) -> usize {
        reaper::count_active(self.members.values(), room_id, now, window)
    }

    pub fn active_members(
        &self,
        room_id: RoomId,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> Vec<Membership> {
        reaper::active_members(self.members.values(), room_id, now, window)
    }

    pub fn summaries(&self, now: DateTime<Utc>, window: TimeDelta) -> Vec<RoomSummary> {
        let mut rooms: Vec<&Room> = self.rooms.values().collect();
        rooms.sort_by(|a, b| directory_order(a, b));
        rooms
            .into_iter()
            .map(|room| RoomSummary {
                room: room.clone(),
                active_count: self.active_count(room.id, now, window),
            })
            .collect()
    }
}

pub struct RoomDirectory {
    backend: Arc<dyn Backend>,
    ctx: ChatContext,
}

impl RoomDirectory {
    pub fn new(backend: Arc<dyn Backend>, ctx: ChatContext) -> Self {
        Self { backend, ctx }
    }

    /// One-shot listing, ordered like the live view.
    pub async fn list_rooms(&self) -> Result<Vec<RoomSummary>, ClientError> {
        let mut rooms = self.backend.list_rooms().await?;
        rooms.sort_by(directory_order);

        let now = Utc::now();
        let window = self.ctx.freshness();
        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            let active_count = self
                .backend
                .count_active_members(room.id, now, window)
                .await?;
            summaries.push(RoomSummary { room, active_count });
        }
        Ok(summaries)
    }

    /// Create a public room owned by the current user.
    pub async fn create_room(&self, name: &str) -> Result<Room, ClientError> {
        let name = validate::room_name(name)?;
        let room = self
            .backend
            .create_room(NewRoom {
                name,
                visibility: RoomVisibility::Public,
                owner_name: self.ctx.user().clone(),
                session_id: Some(self.ctx.session_id().clone()),
            })
            .await?;
        info!(room = %room.id, name = %room.name, owner = %room.owner_name, "room created");
        Ok(room)
    }

    /// Insert a non-owner membership unless one exists. Returns whether a
    /// record was inserted.
    pub async fn join_room(&self, room_id: RoomId) -> Result<bool, ClientError> {
        match self
            .backend
            .insert_membership_if_absent(room_id, self.ctx.user(), false)
            .await
        {
            Ok(inserted) => {
                debug!(room = %room_id, user = %self.ctx.user(), inserted, "join");
                Ok(inserted)
            }
            Err(BackendError::NotFound) => Err(ClientError::RoomNotFound(room_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Start a live view. Subscribes before taking the snapshot so no change
    /// falls between the two.
    pub async fn watch(&self) -> Result<DirectoryWatch, ClientError> {
        let refresh =
            config::positive_interval("directory_refresh", self.ctx.config().directory_refresh)?;
        let sub = self
            .backend
            .subscribe(ChangeFilter::tables([Table::Rooms, Table::RoomMembers]))
            .await?;
        let state = load_snapshot(self.backend.as_ref()).await?;

        let window = self.ctx.freshness();
        let (tx, rx) = watch::channel(state.summaries(Utc::now(), window));
        let task = tokio::spawn(run_watch(
            Arc::clone(&self.backend),
            sub,
            state,
            tx,
            window,
            refresh,
        ));

        Ok(DirectoryWatch { rx, task })
    }
}

async fn load_snapshot(backend: &dyn Backend) -> Result<DirectoryState, BackendError> {
    let rooms = backend.list_rooms().await?;
    let members = backend.list_memberships(None).await?;
    Ok(DirectoryState::from_snapshot(rooms, members))
}

async fn run_watch(
    backend: Arc<dyn Backend>,
    mut sub: ChangeSubscription,
    mut state: DirectoryState,
    tx: watch::Sender<Vec<RoomSummary>>,
    window: TimeDelta,
    refresh: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + refresh, refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = sub.recv() => match event {
                Ok(event) => {
                    if !state.apply(&event) {
                        continue;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Directory feed lagged, reloading");
                    match load_snapshot(backend.as_ref()).await {
                        Ok(fresh) => state = fresh,
                        Err(e) => warn!(error = %e, "Directory reload failed"),
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("directory feed closed");
                    break;
                }
            },
            _ = ticker.tick() => {}
        }

        if tx.send(state.summaries(Utc::now(), window)).is_err() {
            break;
        }
    }
}

/// A live directory view. Dropping it stops the refresh task.
pub struct DirectoryWatch {
    rx: watch::Receiver<Vec<RoomSummary>>,
    task: JoinHandle<()>,
}

impl DirectoryWatch {
    pub fn current(&self) -> Vec<RoomSummary> {
        self.rx.borrow().clone()
    }

    /// Wait for the next publication. Returns `false` once the view has
    /// stopped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

impl Drop for DirectoryWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}
