use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serenity::model::id::{ChannelId, UserId};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::{sync::Notify, time::Instant};
use tracing::{debug, info};

use crate::{error::PlayerError, sources::TrackMetadata};

/// A resolved track waiting in (or taken from) a guild queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedTrack {
    pub metadata: Arc<TrackMetadata>,
    pub requested_by: UserId,
    /// Channel the `play` command came from; "now playing" goes there.
    pub channel_id: ChannelId,
}

impl QueuedTrack {
    pub fn new(metadata: TrackMetadata, requested_by: UserId, channel_id: ChannelId) -> Self {
        Self {
            metadata: Arc::new(metadata),
            requested_by,
            channel_id,
        }
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }
}

/// Pending tracks of one guild.
///
/// Any number of command tasks may [`append`](Self::append) while the guild's
/// playback loop is the single consumer of [`pop_front`](Self::pop_front).
/// Indices are 0-based here; the command layer converts from 1-based input.
///
/// A closed queue rejects appends for good. Closing and appending take the
/// same lock, so an append either lands before the close or fails.
#[derive(Debug)]
pub struct TrackQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Notify,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> Default for TrackQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TrackQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Notify::new(),
        }
    }

    pub fn append(&self, item: T) -> Result<(), PlayerError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(PlayerError::Closed);
            }
            state.items.push_back(item);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Closes the queue only if nothing is pending. False means an append
    /// won the race and the consumer should keep going.
    pub fn close_if_empty(&self) -> bool {
        let mut state = self.state.lock();
        if state.items.is_empty() {
            state.closed = true;
        }
        state.closed
    }

    /// Closes the queue and drops everything pending.
    pub fn close(&self) -> usize {
        let dropped = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.items).len()
        };
        if dropped > 0 {
            info!("🗑️ Queue closed, {} tracks dropped", dropped);
        }
        dropped
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Waits until an item is available or `wait` elapses.
    pub async fn pop_front(&self, wait: Duration) -> Result<T, PlayerError> {
        let deadline = Instant::now() + wait;

        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so an append between check and await is not lost.
            notified.as_mut().enable();

            if let Some(item) = self.state.lock().items.pop_front() {
                return Ok(item);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                debug!("Queue pop timed out after {:?}", wait);
                return Err(PlayerError::Timeout);
            }
        }
    }

    pub fn remove_at(&self, index: usize) -> Result<T, PlayerError> {
        let mut state = self.state.lock();
        let len = state.items.len();
        let removed = state
            .items
            .remove(index)
            .ok_or(PlayerError::IndexOutOfRange { index, len })?;
        debug!("❌ Track removed at position {}", index);
        Ok(removed)
    }

    pub fn shuffle(&self) {
        let mut state = self.state.lock();
        state.items.make_contiguous().shuffle(&mut rand::thread_rng());
        info!("🔀 Queue shuffled ({} tracks)", state.items.len());
    }

    /// Drops every pending item, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.items.len();
        state.items.clear();
        if dropped > 0 {
            info!("🗑️ Queue cleared ({} tracks)", dropped);
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }
}

impl<T: Clone> TrackQueue<T> {
    /// Items in `[start, end)`; bounds are clamped to the queue.
    pub fn slice(&self, start: usize, end: usize) -> Vec<T> {
        let state = self.state.lock();
        let end = end.min(state.items.len());
        let start = start.min(end);
        state.items.range(start..end).cloned().collect()
    }

    /// 1-based page of `per_page` items. Pages past the end are empty.
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage<T> {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let total_items = self.len();
        let start = (page - 1).saturating_mul(per_page);

        QueuePage {
            items: self.slice(start, start.saturating_add(per_page)),
            offset: start,
            current_page: page,
            total_pages: total_items.div_ceil(per_page).max(1),
            total_items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage<T> {
    pub items: Vec<T>,
    /// 0-based queue index of `items[0]`.
    pub offset: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}
