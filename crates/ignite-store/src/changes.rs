//! Row change notifications.
//!
//! The [`Store`](crate::Store) publishes one [`ChangeEvent`] per committed
//! write on a broadcast channel, in commit order. Subscribers narrow the feed
//! with a [`ChangeFilter`] keyed by table and, optionally, room.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use ignite_shared::{RoomId, UserName};

use crate::models::{Membership, Message, Room};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Rooms,
    Messages,
    RoomMembers,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A committed row change, carrying the new row (or the deleted key).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeEvent {
    RoomInserted(Room),
    RoomUpdated(Room),
    MessageInserted(Message),
    MemberInserted(Membership),
    MemberUpdated(Membership),
    MemberDeleted { room_id: RoomId, user_name: UserName },
}

impl ChangeEvent {
    pub fn table(&self) -> Table {
        match self {
            Self::RoomInserted(_) | Self::RoomUpdated(_) => Table::Rooms,
            Self::MessageInserted(_) => Table::Messages,
            Self::MemberInserted(_) | Self::MemberUpdated(_) | Self::MemberDeleted { .. } => {
                Table::RoomMembers
            }
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::RoomInserted(_) | Self::MessageInserted(_) | Self::MemberInserted(_) => {
                ChangeKind::Insert
            }
            Self::RoomUpdated(_) | Self::MemberUpdated(_) => ChangeKind::Update,
            Self::MemberDeleted { .. } => ChangeKind::Delete,
        }
    }

    pub fn room_id(&self) -> RoomId {
        match self {
            Self::RoomInserted(room) | Self::RoomUpdated(room) => room.id,
            Self::MessageInserted(msg) => msg.room_id,
            Self::MemberInserted(m) | Self::MemberUpdated(m) => m.room_id,
            Self::MemberDeleted { room_id, .. } => *room_id,
        }
    }
}

/// Which events a subscription wants. Empty `tables` means every table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    pub tables: Vec<Table>,
    pub room_id: Option<RoomId>,
}

impl ChangeFilter {
    pub fn table(table: Table) -> Self {
        Self {
            tables: vec![table],
            room_id: None,
        }
    }

    pub fn tables(tables: impl IntoIterator<Item = Table>) -> Self {
        Self {
            tables: tables.into_iter().collect(),
            room_id: None,
        }
    }

    pub fn in_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        (self.tables.is_empty() || self.tables.contains(&event.table()))
            && self.room_id.map_or(true, |id| id == event.room_id())
    }
}

/// A filtered view of the store's change feed.
pub struct ChangeSubscription {
    rx: broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
}

impl ChangeSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<ChangeEvent>, filter: ChangeFilter) -> Self {
        Self { rx, filter }
    }

    /// Wait for the next matching event.
    ///
    /// `Lagged(n)` means at least `n` events were dropped because this
    /// subscriber fell behind; the caller must resynchronise. `Closed` means
    /// the store is gone.
    pub async fn recv(&mut self) -> Result<ChangeEvent, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn member(room_id: RoomId) -> Membership {
        Membership {
            room_id,
            user_name: UserName::unchecked("bob"),
            last_activity: Utc::now(),
            is_owner: false,
        }
    }

    #[test]
    fn test_filter_by_table_and_room() {
        let room = RoomId::new();
        let other = RoomId::new();
        let filter = ChangeFilter::table(Table::RoomMembers).in_room(room);

        assert!(filter.matches(&ChangeEvent::MemberInserted(member(room))));
        assert!(filter.matches(&ChangeEvent::MemberDeleted {
            room_id: room,
            user_name: UserName::unchecked("bob"),
        }));
        assert!(!filter.matches(&ChangeEvent::MemberInserted(member(other))));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let event = ChangeEvent::MemberUpdated(member(RoomId::new()));
        assert!(ChangeFilter::default().matches(&event));
        assert_eq!(event.kind(), ChangeKind::Update);
        assert_eq!(event.table(), Table::RoomMembers);
    }

    #[tokio::test]
    async fn test_subscription_skips_unmatched_events() {
        let (tx, rx) = broadcast::channel(8);
        let room = RoomId::new();
        let mut sub = ChangeSubscription::new(rx, ChangeFilter::default().in_room(room));

        tx.send(ChangeEvent::MemberInserted(member(RoomId::new()))).unwrap();
        tx.send(ChangeEvent::MemberInserted(member(room))).unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.room_id(), room);
    }
}
