//! Ordered key-value storage
//!
//! Everything the catalog persists goes through the [`KvBackend`] contract: an
//! ordered byte-string store with point reads and writes, forward range scans
//! and atomic batches. Two interchangeable backends are provided:
//!
//! - [`MemoryBackend`]: a volatile sorted tree, for tests and ephemeral catalogs
//! - [`DiskBackend`]: a durable redb file with identical semantics
//!
//! [`EntryStore`] layers the typed entry documents on top of a backend.

pub mod backend;
pub mod disk;
pub mod documents;
pub mod memory;

pub use backend::{BatchOp, KvBackend, KvPair, StoreError, StoreResult, WriteBatch};
pub use disk::DiskBackend;
pub use documents::EntryStore;
pub use memory::MemoryBackend;
