//! Typed entry store
//!
//! Entries are stored under their id (UTF-8 bytes, verbatim) as JSON values.
//! Key order is therefore id order, which is the order of every listing.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{CatalogError, Result};
use crate::registry::Entry;

use super::backend::KvBackend;

/// Entries fetched per backend scan while iterating
const ITER_CHUNK: usize = 256;

/// Ordered document store for entries
#[derive(Clone)]
pub struct EntryStore {
    backend: Arc<dyn KvBackend>,
}

impl EntryStore {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Check whether an entry exists
    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.backend.get(id.as_bytes())?.is_some())
    }

    /// Insert a new entry, failing with `Conflict` if the id is taken
    pub fn add(&self, entry: &Entry) -> Result<()> {
        if self.contains(&entry.id)? {
            return Err(CatalogError::Conflict(format!(
                "entry {} already exists",
                entry.id
            )));
        }
        self.write(entry)
    }

    /// Fetch an entry
    pub fn get(&self, id: &str) -> Result<Option<Entry>> {
        match self.backend.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Replace an existing entry, failing with `NotFound` if it is absent
    pub fn update(&self, entry: &Entry) -> Result<()> {
        if !self.contains(&entry.id)? {
            return Err(CatalogError::not_found("entry", &entry.id));
        }
        self.write(entry)
    }

    /// Remove an entry, failing with `NotFound` if it is absent
    pub fn delete(&self, id: &str) -> Result<()> {
        self.backend.delete(id.as_bytes())?;
        Ok(())
    }

    /// Number of stored entries
    pub fn total(&self) -> Result<usize> {
        Ok(self.backend.len()?)
    }

    /// One page of entries in id order
    pub fn list(&self, offset: usize, limit: usize) -> Result<Vec<Entry>> {
        self.backend
            .scan(b"", None, offset, Some(limit))?
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(CatalogError::from))
            .collect()
    }

    /// Iterate every entry in id order
    pub fn iter(&self) -> EntryIter {
        EntryIter {
            backend: Arc::clone(&self.backend),
            next_start: Some(Vec::new()),
            buffer: VecDeque::new(),
        }
    }

    fn write(&self, entry: &Entry) -> Result<()> {
        let bytes = serde_json::to_vec(entry)?;
        self.backend.put(entry.id.as_bytes(), &bytes)?;
        Ok(())
    }
}

/// Forward iterator over all entries, reading the backend in chunks
pub struct EntryIter {
    backend: Arc<dyn KvBackend>,
    /// Key to resume from, `None` once the backend is exhausted
    next_start: Option<Vec<u8>>,
    buffer: VecDeque<Entry>,
}

impl EntryIter {
    fn fill(&mut self) -> Result<()> {
        let Some(start) = self.next_start.take() else {
            return Ok(());
        };

        let pairs = self.backend.scan(&start, None, 0, Some(ITER_CHUNK))?;
        if pairs.len() == ITER_CHUNK {
            if let Some((last, _)) = pairs.last() {
                // Smallest key strictly greater than `last`
                let mut resume = last.clone();
                resume.push(0);
                self.next_start = Some(resume);
            }
        }

        for (_, bytes) in pairs {
            self.buffer.push_back(serde_json::from_slice(&bytes)?);
        }
        Ok(())
    }
}

impl Iterator for EntryIter {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            if let Err(e) = self.fill() {
                self.next_start = None;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn store() -> EntryStore {
        EntryStore::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn test_add_get_update_delete() {
        let store = store();
        let entry = Entry::new("a").with_field("name", "lamp");

        store.add(&entry).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(entry.clone()));

        // Duplicate add is a conflict
        assert!(matches!(store.add(&entry), Err(CatalogError::Conflict(_))));

        let changed = entry.with_field("name", "bulb");
        store.update(&changed).unwrap();
        assert_eq!(store.get("a").unwrap().unwrap().payload["name"], "bulb");

        store.delete("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert!(matches!(store.delete("a"), Err(CatalogError::NotFound(_))));
        assert!(matches!(
            store.update(&Entry::new("a")),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_pages_in_id_order() {
        let store = store();
        for id in ["c", "a", "b"] {
            store.add(&Entry::new(id)).unwrap();
        }

        let ids: Vec<_> = store.list(1, 5).unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(store.total().unwrap(), 3);
    }

    #[test]
    fn test_iter_crosses_chunk_boundaries() {
        let store = store();
        let count = ITER_CHUNK * 2 + 7;
        for i in 0..count {
            store.add(&Entry::new(format!("e{:05}", i))).unwrap();
        }

        let ids: Vec<_> = store.iter().map(|e| e.unwrap().id).collect();
        assert_eq!(ids.len(), count);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
