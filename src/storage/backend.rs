//! Backend contract shared by the memory and disk stores

use thiserror::Error;

/// A key/value pair returned by scans
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Result alias for backend operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error type for backend operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Delete of a key that does not exist
    #[error("key not found: {0}")]
    NotFound(String),

    /// Failure reported by redb
    #[error("redb: {0}")]
    Redb(#[from] redb::Error),

    /// A record could not be interpreted
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

macro_rules! impl_from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(err: $ty) -> Self {
                    StoreError::Redb(redb::Error::from(err))
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl StoreError {
    pub(crate) fn not_found(key: &[u8]) -> Self {
        StoreError::NotFound(String::from_utf8_lossy(key).into_owned())
    }
}

/// One operation inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    /// Deleting an absent key inside a batch is not an error
    Delete(Vec<u8>),
}

/// A set of writes applied atomically
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
        self
    }

    /// Queue a delete
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Delete(key.into()));
        self
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Consume the batch, yielding its operations in order
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Ordered byte-string store
///
/// Keys are compared lexicographically. Implementations must make
/// [`write_batch`](KvBackend::write_batch) atomic and must give each call a
/// consistent view of the data.
pub trait KvBackend: Send + Sync {
    /// Read a single key
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Insert or overwrite a key
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Remove a key, failing with [`StoreError::NotFound`] if it is absent
    fn delete(&self, key: &[u8]) -> StoreResult<()>;

    /// Scan `[start, end)` in key order, skipping `offset` pairs and returning
    /// at most `limit` of them (`None` = no limit, `end = None` = unbounded)
    fn scan(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<KvPair>>;

    /// Smallest key and its value
    fn first(&self) -> StoreResult<Option<KvPair>>;

    /// Largest key and its value
    fn last(&self) -> StoreResult<Option<KvPair>>;

    /// Number of stored keys
    fn len(&self) -> StoreResult<usize>;

    /// Whether the store is empty
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Apply every operation in `batch` atomically
    fn write_batch(&self, batch: WriteBatch) -> StoreResult<()>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_builder() {
        let mut batch = WriteBatch::new();
        batch.put("a", "1").delete("b");

        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.into_ops(),
            vec![
                BatchOp::Put(b"a".to_vec(), b"1".to_vec()),
                BatchOp::Delete(b"b".to_vec())
            ]
        );
    }

    #[test]
    fn test_not_found_is_lossy_utf8() {
        let err = StoreError::not_found(b"entry:1");
        assert_eq!(err.to_string(), "key not found: entry:1");
    }
}
