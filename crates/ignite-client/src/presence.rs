//! Periodic liveness announce while a room is being viewed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use ignite_shared::{RoomId, UserName};

use crate::backend::Backend;
use crate::config;
use crate::error::ClientError;

/// Upsert `(room, user, now)`. Failures are logged and swallowed.
///
/// Returns whether the record was written.
pub async fn announce(backend: &dyn Backend, room_id: RoomId, user: &UserName) -> bool {
    match backend.upsert_membership(room_id, user, Utc::now()).await {
        Ok(member) => {
            debug!(room = %room_id, user = %user, at = %member.last_activity, "presence announced");
            true
        }
        Err(e) => {
            warn!(room = %room_id, user = %user, error = %e, "Presence announce failed");
            false
        }
    }
}

/// Owns the announce task for one room.
///
/// Dropping the tracker aborts the task without removing the record; use
/// [`PresenceTracker::stop`] to also delete it.
pub struct PresenceTracker {
    backend: Arc<dyn Backend>,
    room_id: RoomId,
    user: UserName,
    task: Option<JoinHandle<()>>,
}

impl PresenceTracker {
    /// Announce once, then keep announcing every `interval`.
    pub async fn start(
        backend: Arc<dyn Backend>,
        room_id: RoomId,
        user: UserName,
        interval: Duration,
    ) -> Result<Self, ClientError> {
        let interval = config::positive_interval("presence_interval", interval)?;
        announce(backend.as_ref(), room_id, &user).await;

        let task = tokio::spawn({
            let backend = Arc::clone(&backend);
            let user = user.clone();
            async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    announce(backend.as_ref(), room_id, &user).await;
                }
            }
        });

        debug!(room = %room_id, user = %user, every = ?interval, "presence started");
        Ok(Self {
            backend,
            room_id,
            user,
            task: Some(task),
        })
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the announce task before returning, then delete the record in
    /// the background. Await the returned handle before writing to the same
    /// room again. A failed delete leaves the record to expire.
    pub fn stop(mut self) -> JoinHandle<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let backend = Arc::clone(&self.backend);
        let room_id = self.room_id;
        let user = self.user.clone();
        tokio::spawn(async move {
            match backend.delete_membership(room_id, &user).await {
                Ok(removed) => debug!(room = %room_id, user = %user, removed, "left room"),
                Err(e) => {
                    warn!(room = %room_id, user = %user, error = %e, "Membership delete failed")
                }
            }
        })
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_room, store_session, RecordingBackend};

    const INTERVAL: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_announce_is_idempotent() {
        let (store, alice) = store_session("alice");
        let room = create_room(&alice, "alice", "general").await;
        let bob = store.session(UserName::unchecked("bob"));

        assert!(announce(&bob, room.id, bob.caller()).await);
        assert!(announce(&bob, room.id, bob.caller()).await);

        let members = store.list_memberships(Some(room.id)).unwrap();
        let bobs: Vec<_> = members
            .iter()
            .filter(|m| m.user_name.as_str() == "bob")
            .collect();
        assert_eq!(bobs.len(), 1);
        assert!(!bobs[0].is_owner);
    }

    #[tokio::test]
    async fn test_announce_failure_is_swallowed() {
        let (_store, alice) = store_session("alice");
        assert!(!announce(&alice, RoomId::new(), alice.caller()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_announce_until_stopped() {
        let (store, alice) = store_session("alice");
        let room = create_room(&alice, "alice", "general").await;
        let backend = RecordingBackend::new(store.session(UserName::unchecked("bob")));

        let tracker = PresenceTracker::start(
            backend.clone(),
            room.id,
            UserName::unchecked("bob"),
            INTERVAL,
        )
        .await
        .unwrap();
        assert_eq!(backend.upserts(), 1);
        assert!(tracker.is_running());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(backend.upserts(), 2);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.upserts(), 3);

        tracker.stop().await.unwrap();
        assert_eq!(backend.deletes(), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(backend.upserts(), 3);

        let members = store.list_memberships(Some(room.id)).unwrap();
        assert!(members.iter().all(|m| m.user_name.as_str() != "bob"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_do_not_stop_the_timer() {
        let (store, alice) = store_session("alice");
        let room = create_room(&alice, "alice", "general").await;
        let backend = RecordingBackend::new(store.session(UserName::unchecked("bob")));
        backend.set_failing(true);

        let tracker = PresenceTracker::start(
            backend.clone(),
            room.id,
            UserName::unchecked("bob"),
            INTERVAL,
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(backend.upserts(), 2);
        assert!(tracker.is_running());

        backend.set_failing(false);
        tokio::time::sleep(Duration::from_secs(30)).await;
        let members = store.list_memberships(Some(room.id)).unwrap();
        assert!(members.iter().any(|m| m.user_name.as_str() == "bob"));

        drop(tracker);
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected_before_announcing() {
        let (store, alice) = store_session("alice");
        let room = create_room(&alice, "alice", "general").await;
        let backend = RecordingBackend::new(store.session(UserName::unchecked("bob")));

        let result = PresenceTracker::start(
            backend.clone(),
            room.id,
            UserName::unchecked("bob"),
            Duration::ZERO,
        )
        .await;
        assert!(matches!(result, Err(ClientError::Config(_))));
        assert_eq!(backend.upserts(), 0);
    }
}
