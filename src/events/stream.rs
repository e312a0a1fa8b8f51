//! Resumable event streams
//!
//! An [`EventStream`] is what a streaming endpoint hands each client: the
//! events it missed since its last seen id (from the [`EventLog`]) followed by
//! live events (from the [`Hub`]).
//!
//! The live subscription is registered before the log is read. Anything
//! published earlier is already in the log, anything later arrives live, and
//! ids at or below the last replayed one are skipped, so the client sees no
//! gap and no duplicate (within the log's capacity).

use std::collections::VecDeque;

use crate::error::Result;

use super::event::{Event, EventKinds};
use super::hub::{Hub, Subscription};
use super::log::EventLog;

/// Replay-then-live stream of events
pub struct EventStream {
    replay: VecDeque<Event>,
    live: Subscription,
    /// Highest id already handed out (or known to be covered by replay)
    last_id: u64,
}

impl EventStream {
    /// Open a stream
    ///
    /// With `last_event_id = None` only live events are delivered. An id
    /// beyond the newest logged event belongs to a history this log no longer
    /// has (a wiped or volatile log), so the whole retained log is replayed.
    pub async fn open(
        hub: &Hub,
        log: &EventLog,
        last_event_id: Option<u64>,
        kinds: EventKinds,
    ) -> Result<Self> {
        let live = hub.subscribe(kinds).await?;

        let (replay, last_id) = match last_event_id {
            Some(after) => {
                let head = log.last_id().unwrap_or(0);
                let after = if after > head {
                    tracing::debug!(
                        last_event_id = after,
                        head,
                        "Last event id is ahead of the log, replaying from the start"
                    );
                    0
                } else {
                    after
                };
                let missed = log.replay_after(after)?;
                let last_id = missed.last().map_or(after, |event| event.id);
                let replay: VecDeque<Event> = missed
                    .into_iter()
                    .filter(|event| kinds.includes(event.kind))
                    .collect();
                (replay, last_id)
            }
            None => (VecDeque::new(), 0),
        };

        tracing::debug!(
            subscriber = live.id(),
            replayed = replay.len(),
            resume_from = ?last_event_id,
            "Event stream opened"
        );

        Ok(Self {
            replay,
            live,
            last_id,
        })
    }

    /// Next event, or `None` once the hub has shut down
    pub async fn next(&mut self) -> Option<Event> {
        if let Some(event) = self.replay.pop_front() {
            return Some(event);
        }

        loop {
            let event = self.live.recv().await?;
            if event.id > self.last_id {
                self.last_id = event.id;
                return Some(event);
            }
        }
    }

    /// Number of replayed events not yet consumed
    pub fn pending_replay(&self) -> usize {
        self.replay.len()
    }

    /// Stop the stream and deregister from the hub
    pub async fn close(self) {
        tracing::debug!(subscriber = self.live.id(), "Event stream closed");
        self.live.unsubscribe().await;
    }
}
