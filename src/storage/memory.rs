//! Volatile sorted-tree backend

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use super::backend::{BatchOp, KvBackend, KvPair, StoreError, StoreResult, WriteBatch};

/// In-memory ordered store
///
/// A `BTreeMap` behind a `parking_lot::RwLock`. Contents are lost when the
/// backend is dropped.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tree: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.tree.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.tree.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        match self.tree.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(key)),
        }
    }

    fn scan(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<KvPair>> {
        if end.is_some_and(|end| end < start) {
            return Ok(Vec::new());
        }

        let tree = self.tree.read();
        let upper = end.map_or(Bound::Unbounded, Bound::Excluded);
        let range = tree
            .range::<[u8], _>((Bound::Included(start), upper))
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(range)
    }

    fn first(&self) -> StoreResult<Option<KvPair>> {
        Ok(self
            .tree
            .read()
            .first_key_value()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn last(&self) -> StoreResult<Option<KvPair>> {
        Ok(self
            .tree
            .read()
            .last_key_value()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.tree.read().len())
    }

    fn write_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut tree = self.tree.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(key, value) => {
                    tree.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    tree.remove(&key);
                }
            }
        }
        Ok(())
    }
}
