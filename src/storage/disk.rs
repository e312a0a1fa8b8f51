//! Durable on-disk backend
//!
//! Each [`DiskBackend`] owns one redb database file holding a single table of
//! raw byte keys and values. Every write is its own committed transaction, so a
//! successful return means the data survived; batches share one transaction.

use std::ops::Bound;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::backend::{BatchOp, KvBackend, KvPair, StoreError, StoreResult, WriteBatch};

const RECORDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");

/// redb-backed ordered store
///
/// Calls block until the transaction commits, fsync included. The catalog
/// makes them from async code while holding its write lock, so every mutation
/// occupies a runtime worker for the duration of its commit. Embedders with
/// heavy write load should run the catalog on a multi-threaded runtime.
pub struct DiskBackend {
    db: Database,
    path: PathBuf,
}

impl DiskBackend {
    /// Open the database at `path`, creating it (and its table) if needed
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path)?;

        // Create the table up front so read transactions never see it missing
        let txn = db.begin_write()?;
        txn.open_table(RECORDS)?;
        txn.commit()?;

        tracing::debug!(path = %path.display(), "Opened disk backend");

        Ok(Self { db, path })
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for DiskBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskBackend")
            .field("path", &self.path)
            .finish()
    }
}

impl KvBackend for DiskBackend {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        let value = table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(RECORDS)?;
            let removed = table.remove(key)?.is_some();
            removed
        };

        if !removed {
            txn.abort()?;
            return Err(StoreError::not_found(key));
        }

        txn.commit()?;
        Ok(())
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

        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        let upper = end.map_or(Bound::Unbounded, Bound::Excluded);

        let mut pairs = Vec::new();
        for item in table
            .range::<&[u8]>((Bound::Included(start), upper))?
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
        {
            let (key, value) = item?;
            pairs.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(pairs)
    }

    fn first(&self) -> StoreResult<Option<KvPair>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        let pair = table
            .first()?
            .map(|(key, value)| (key.value().to_vec(), value.value().to_vec()));
        Ok(pair)
    }

    fn last(&self) -> StoreResult<Option<KvPair>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        let pair = table
            .last()?
            .map(|(key, value)| (key.value().to_vec(), value.value().to_vec()));
        Ok(pair)
    }

    fn len(&self) -> StoreResult<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        Ok(table.len()? as usize)
    }

    fn write_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS)?;
            for op in batch.into_ops() {
                match op {
                    BatchOp::Put(key, value) => {
                        table.insert(key.as_slice(), value.as_slice())?;
                    }
                    BatchOp::Delete(key) => {
                        table.remove(key.as_slice())?;
                    }
                }
            }
        }
        txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::backend::conformance;
    use super::*;

    fn temp_backend() -> (tempfile::TempDir, DiskBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskBackend::open(dir.path().join("test.redb")).unwrap();
        (dir, backend)
    }

    #[test]
    fn test_point_operations() {
        let (_dir, backend) = temp_backend();
        conformance::point_operations(&backend);
    }

    #[test]
    fn test_ordered_scans() {
        let (_dir, backend) = temp_backend();
        conformance::ordered_scans(&backend);
    }

    #[test]
    fn test_atomic_batches() {
        let (_dir, backend) = temp_backend();
        conformance::atomic_batches(&backend);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.redb");

        {
            let backend = DiskBackend::open(&path).unwrap();
            backend.put(b"k", b"v").unwrap();
        }

        let backend = DiskBackend::open(&path).unwrap();
        assert_eq!(backend.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(backend.path(), path.as_path());
    }
}
