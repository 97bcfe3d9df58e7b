//! Message append and the ordered live tail of a room.
//!
//! A feed subscribes to notifications before it reads the backfill. Live
//! events at or before the last backfilled key are dropped, which closes the
//! gap between the two without a general dedup set. When the notification
//! channel lags, the feed re-reads everything after its high-water mark.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use ignite_shared::{validate, RoomId};
use ignite_store::{
    ChangeEvent, ChangeFilter, ChangeSubscription, Media, Message, MessageKey, NewMessage,
    SortOrder, Table,
};

use crate::backend::{Backend, BackendError};
use crate::context::ChatContext;
use crate::error::ClientError;

/// Page size used when catching up after a lag.
const CATCH_UP_PAGE: u32 = 100;

/// Delay before retrying a failed catch-up.
const CATCH_UP_RETRY: Duration = Duration::from_secs(2);

pub async fn send(
    backend: &dyn Backend,
    ctx: &ChatContext,
    room_id: RoomId,
    body: &str,
) -> Result<Message, ClientError> {
    send_media(backend, ctx, room_id, body, None).await
}

/// Validation happens before any storage call.
pub async fn send_media(
    backend: &dyn Backend,
    ctx: &ChatContext,
    room_id: RoomId,
    body: &str,
    media: Option<Media>,
) -> Result<Message, ClientError> {
    let body = validate::message_body(body)?;
    let media = match media {
        Some(media) => Some(Media {
            url: validate::media_url(&media.url)?,
            media_type: media.media_type,
        }),
        None => None,
    };

    let message = backend
        .insert_message(NewMessage {
            room_id,
            user_name: ctx.user().clone(),
            body,
            media,
        })
        .await
        .map_err(|e| match e {
            BackendError::NotFound => ClientError::RoomNotFound(room_id),
            other => other.into(),
        })?;
    debug!(room = %room_id, id = %message.id, "message sent");
    Ok(message)
}

/// The most recent `limit` messages, oldest first.
pub async fn history(
    backend: &dyn Backend,
    room_id: RoomId,
    limit: u32,
) -> Result<Vec<Message>, ClientError> {
    let mut messages = backend
        .list_messages(room_id, SortOrder::Descending, limit)
        .await?;
    messages.reverse();
    Ok(messages)
}

/// Backfill plus live tail of one room.
pub struct MessageFeed {
    backfill: Vec<Message>,
    live: BoxStream<'static, Message>,
}

impl MessageFeed {
    pub fn backfill(&self) -> &[Message] {
        &self.backfill
    }

    pub fn into_parts(self) -> (Vec<Message>, BoxStream<'static, Message>) {
        (self.backfill, self.live)
    }

    /// Backfill followed by the live tail as one stream.
    pub fn into_stream(self) -> BoxStream<'static, Message> {
        stream::iter(self.backfill).chain(self.live).boxed()
    }
}

/// Open a feed on `room_id`. It ends once `cancel` becomes `true` or its
/// sender is dropped.
pub async fn open(
    backend: Arc<dyn Backend>,
    room_id: RoomId,
    limit: u32,
    cancel: watch::Receiver<bool>,
) -> Result<MessageFeed, ClientError> {
    let sub = backend
        .subscribe(ChangeFilter::table(Table::Messages).in_room(room_id))
        .await?;
    let backfill = history(backend.as_ref(), room_id, limit).await?;
    let cutoff = backfill.last().map(Message::key);

    debug!(room = %room_id, backfill = backfill.len(), "feed opened");
    Ok(MessageFeed {
        live: live_stream(backend, room_id, sub, cutoff, cancel),
        backfill,
    })
}

struct LiveState {
    backend: Arc<dyn Backend>,
    room_id: RoomId,
    sub: ChangeSubscription,
    /// Events at or before this key were already delivered some other way.
    cutoff: Option<MessageKey>,
    last_delivered: Option<MessageKey>,
    pending: VecDeque<Message>,
    resync: bool,
    cancel: watch::Receiver<bool>,
}

impl LiveState {
    fn high_water(&self) -> Option<MessageKey> {
        let queued = self.pending.back().map(Message::key);
        [self.cutoff, self.last_delivered, queued]
            .into_iter()
            .flatten()
            .max()
    }

    /// Queue every stored message after the high-water mark.
    async fn catch_up(&mut self) -> Result<(), BackendError> {
        let mut after = self.high_water();
        loop {
            let page = match after {
                Some(key) => {
                    self.backend
                        .list_messages_after(self.room_id, key, CATCH_UP_PAGE)
                        .await?
                }
                None => {
                    self.backend
                        .list_messages(self.room_id, SortOrder::Ascending, CATCH_UP_PAGE)
                        .await?
                }
            };
            let full = page.len() as u32 == CATCH_UP_PAGE;
            if let Some(last) = page.last() {
                after = Some(last.key());
                self.cutoff = after;
            }
            debug!(room = %self.room_id, fetched = page.len(), "feed catch-up page");
            self.pending.extend(page);
            if !full {
                return Ok(());
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

fn live_stream(
    backend: Arc<dyn Backend>,
    room_id: RoomId,
    sub: ChangeSubscription,
    cutoff: Option<MessageKey>,
    cancel: watch::Receiver<bool>,
) -> BoxStream<'static, Message> {
    let state = LiveState {
        backend,
        room_id,
        sub,
        cutoff,
        last_delivered: None,
        pending: VecDeque::new(),
        resync: false,
        cancel,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.is_cancelled() {
                debug!(room = %state.room_id, "feed closed");
                return None;
            }

            if let Some(message) = state.pending.pop_front() {
                state.last_delivered = Some(message.key());
                return Some((message, state));
            }

            if state.resync {
                match state.catch_up().await {
                    Ok(()) => state.resync = false,
                    Err(e) => {
                        warn!(room = %state.room_id, error = %e, "Feed catch-up failed, retrying");
                        tokio::select! {
                            _ = tokio::time::sleep(CATCH_UP_RETRY) => {}
                            changed = state.cancel.changed() => {
                                if changed.is_err() {
                                    return None;
                                }
                            }
                        }
                    }
                }
                continue;
            }

            tokio::select! {
                changed = state.cancel.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
                event = state.sub.recv() => match event {
                    Ok(ChangeEvent::MessageInserted(message)) => {
                        if state.cutoff.is_some_and(|cutoff| message.key() <= cutoff) {
                            debug!(room = %state.room_id, id = %message.id, "dropped overlap");
                            continue;
                        }
                        state.pending.push_back(message);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(room = %state.room_id, skipped, "Message feed lagged, catching up");
                        state.resync = true;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    })
    .boxed()
}
