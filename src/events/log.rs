//! Persistent, capacity-bounded event log
//!
//! Events are stored under 8-byte big-endian ids so that key order is id
//! order. The log behaves like a ring buffer: once it holds `capacity` events,
//! every append also deletes the oldest record, in the same atomic batch.
//!
//! Replay is best effort. A reader asking for events after an id that has
//! already been evicted silently starts from the oldest retained event.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{CatalogError, Result};
use crate::storage::{KvBackend, StoreError, WriteBatch};

use super::event::{Event, EventKind};

/// Id given to the first event of an empty log
pub const FIRST_EVENT_ID: u64 = 1;

/// Encode an event id as a store key
pub fn encode_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Decode a store key back into an event id
pub fn decode_key(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| {
        CatalogError::Storage(StoreError::Corrupt(format!(
            "event key has {} bytes, expected 8",
            key.len()
        )))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

#[derive(Debug)]
struct Cursor {
    /// Id the next append receives
    next: u64,
    /// Oldest retained id (equal to `next` when empty)
    oldest: u64,
}

/// Append-only event log with oldest-first eviction
pub struct EventLog {
    backend: Arc<dyn KvBackend>,
    capacity: u64,
    cursor: Mutex<Cursor>,
}

impl EventLog {
    /// Open a log on `backend`, seeding ids from the records already present
    pub fn open(backend: Arc<dyn KvBackend>, capacity: usize) -> Result<Self> {
        let next = match backend.last()? {
            Some((key, _)) => decode_key(&key)? + 1,
            None => FIRST_EVENT_ID,
        };
        let oldest = match backend.first()? {
            Some((key, _)) => decode_key(&key)?,
            None => next,
        };

        tracing::debug!(next_id = next, oldest_id = oldest, capacity, "Opened event log");

        Ok(Self {
            backend,
            capacity: capacity.max(1) as u64,
            cursor: Mutex::new(Cursor { next, oldest }),
        })
    }

    /// Append an event, evicting the oldest records beyond capacity
    pub fn append(&self, kind: EventKind, data: Value) -> Result<Event> {
        let mut cursor = self.cursor.lock();

        let event = Event {
            id: cursor.next,
            kind,
            data,
        };

        let mut batch = WriteBatch::new();
        batch.put(encode_key(event.id).to_vec(), serde_json::to_vec(&event)?);

        // Retained range after this append is [oldest, next]
        let mut oldest = cursor.oldest;
        while cursor.next + 1 - oldest > self.capacity {
            batch.delete(encode_key(oldest).to_vec());
            oldest += 1;
        }

        self.backend.write_batch(batch)?;

        if oldest != cursor.oldest {
            tracing::trace!(evicted_through = oldest - 1, "Evicted old events");
        }
        cursor.oldest = oldest;
        cursor.next += 1;

        Ok(event)
    }

    /// All retained events with an id greater than `after`, in id order
    pub fn replay_after(&self, after: u64) -> Result<Vec<Event>> {
        let Some(start) = after.checked_add(1) else {
            return Ok(Vec::new());
        };

        self.backend
            .scan(&encode_key(start), None, 0, None)?
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(CatalogError::from))
            .collect()
    }

    /// Id of the most recent event, if any
    pub fn last_id(&self) -> Option<u64> {
        let cursor = self.cursor.lock();
        (cursor.next > cursor.oldest).then(|| cursor.next - 1)
    }

    /// Id of the oldest retained event, if any
    pub fn oldest_id(&self) -> Option<u64> {
        let cursor = self.cursor.lock();
        (cursor.next > cursor.oldest).then_some(cursor.oldest)
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        let cursor = self.cursor.lock();
        (cursor.next - cursor.oldest) as usize
    }

    /// Whether the log holds no events
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of retained events
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::storage::{DiskBackend, MemoryBackend};

    fn memory_log(capacity: usize) -> EventLog {
        EventLog::open(Arc::new(MemoryBackend::new()), capacity).unwrap()
    }

    fn ids(events: &[Event]) -> Vec<u64> {
        events.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_keys_sort_numerically() {
        assert!(encode_key(255) < encode_key(256));
        assert_eq!(decode_key(&encode_key(0xdead_beef)).unwrap(), 0xdead_beef);
        assert!(decode_key(b"short").is_err());
    }

    #[test]
    fn test_append_assigns_monotonic_ids() {
        let log = memory_log(10);
        assert!(log.is_empty());
        assert_eq!(log.last_id(), None);

        let a = log.append(EventKind::Create, json!({ "id": "a" })).unwrap();
        let b = log.append(EventKind::Update, json!({ "id": "a" })).unwrap();

        assert_eq!(a.id, FIRST_EVENT_ID);
        assert_eq!(b.id, FIRST_EVENT_ID + 1);
        assert_eq!(log.last_id(), Some(b.id));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_replay_after() {
        let log = memory_log(10);
        for i in 0..5 {
            log.append(EventKind::Create, json!({ "n": i })).unwrap();
        }

        assert_eq!(ids(&log.replay_after(0).unwrap()), vec![1, 2, 3, 4, 5]);
        assert_eq!(ids(&log.replay_after(3).unwrap()), vec![4, 5]);
        assert!(log.replay_after(5).unwrap().is_empty());
        assert!(log.replay_after(u64::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let log = memory_log(3);
        for i in 0..7 {
            log.append(EventKind::Create, json!({ "n": i })).unwrap();
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.oldest_id(), Some(5));

        // Asking for evicted history starts at the oldest retained event
        assert_eq!(ids(&log.replay_after(1).unwrap()), vec![5, 6, 7]);
    }

    #[test]
    fn test_reopen_continues_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.redb");

        {
            let log = EventLog::open(Arc::new(DiskBackend::open(&path).unwrap()), 4).unwrap();
            for i in 0..6 {
                log.append(EventKind::Create, json!({ "n": i })).unwrap();
            }
        }

        let log = EventLog::open(Arc::new(DiskBackend::open(&path).unwrap()), 4).unwrap();
        assert_eq!(log.oldest_id(), Some(3));
        assert_eq!(log.last_id(), Some(6));

        let next = log.append(EventKind::Delete, json!({ "id": "x" })).unwrap();
        assert_eq!(next.id, 7);
        assert_eq!(ids(&log.replay_after(0).unwrap()), vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_shrinking_capacity_on_reopen() {
        let backend: Arc<dyn KvBackend> = Arc::new(MemoryBackend::new());
        {
            let log = EventLog::open(Arc::clone(&backend), 10).unwrap();
            for i in 0..8 {
                log.append(EventKind::Create, json!({ "n": i })).unwrap();
            }
        }

        let log = EventLog::open(backend, 3).unwrap();
        log.append(EventKind::Create, json!({})).unwrap();
        assert_eq!(ids(&log.replay_after(0).unwrap()), vec![7, 8, 9]);
    }
}
