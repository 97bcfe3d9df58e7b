//! Membership freshness.
//!
//! Records are never swept by a background job. A record whose
//! `last_activity` is older than the freshness window simply stops counting,
//! and callers re-evaluate on change notifications and on a timer because
//! passive expiry emits no event.

use chrono::{DateTime, TimeDelta, Utc};

use ignite_shared::RoomId;
use ignite_store::Membership;

/// `now - last_activity <= window`. Future timestamps count as active.
pub fn is_active(record: &Membership, now: DateTime<Utc>, window: TimeDelta) -> bool {
    now.signed_duration_since(record.last_activity) <= window
}

pub fn count_active<'a>(
    records: impl IntoIterator<Item = &'a Membership>,
    room_id: RoomId,
    now: DateTime<Utc>,
    window: TimeDelta,
) -> usize {
    records
        .into_iter()
        .filter(|m| m.room_id == room_id && is_active(m, now, window))
        .count()
}

/// Active records of `room_id`, owner first, then most recently active.
pub fn active_members<'a>(
    records: impl IntoIterator<Item = &'a Membership>,
    room_id: RoomId,
    now: DateTime<Utc>,
    window: TimeDelta,
) -> Vec<Membership> {
    let mut members: Vec<Membership> = records
        .into_iter()
        .filter(|m| m.room_id == room_id && is_active(m, now, window))
        .cloned()
        .collect();
    members.sort_by(|a, b| {
        b.is_owner
            .cmp(&a.is_owner)
            .then(b.last_activity.cmp(&a.last_activity))
            .then(a.user_name.cmp(&b.user_name))
    });
    members
}
