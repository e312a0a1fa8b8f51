//! Registry/catalog core with TTL eviction and replayable change streams
//!
//! A catalog stores JSON entry documents, each optionally owning a list of
//! resources. Entries with a `ttl` are evicted once they have not been
//! rewritten for that many seconds, and every add, update, delete and eviction
//! is published as an event that clients can follow live or replay after a
//! reconnect.
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────────────────── Catalog ─────────────────────────────┐
//!   │                                                                  │
//!   │  EntryStore ──► KvBackend (MemoryBackend | DiskBackend)          │
//!   │  Index { resource id → entry id, expiry instant → entry ids }    │
//!   │  IdGenerator                                                     │
//!   │                                                                  │
//!   │  sweeper task ──(every sweep_interval)──► sweep_expired()        │
//!   └──────────────┬───────────────────────────────────────────────────┘
//!                  │ every mutation
//!                  ▼
//!            EventLog (bounded, KvBackend) ──► Hub actor ──► Subscription
//!                  │                                             │
//!                  └────────── replay_after ──► EventStream ◄────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use catalog_rs::{Catalog, CatalogConfig, Entry, EventKinds};
//!
//! #[tokio::main]
//! async fn main() -> catalog_rs::Result<()> {
//!     let catalog = Arc::new(Catalog::open("./data", CatalogConfig::default())?);
//!     let sweeper = catalog.spawn_sweeper();
//!
//!     let mut stream = catalog.event_stream(Some(0), EventKinds::all()).await?;
//!     let entry = catalog.add(Entry::new("").with_ttl(30)).await?;
//!     println!("registered {}", entry.id);
//!
//!     while let Some(event) = stream.next().await {
//!         println!("{} {}", event.kind, event.id);
//!     }
//!
//!     catalog.shutdown().await;
//!     let _ = sweeper.await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod events;
pub mod registry;
pub mod stats;
pub mod storage;

pub use error::{CatalogError, ErrorKind, Result};
pub use events::{Event, EventKind, EventKinds, EventStream};
pub use registry::{Catalog, CatalogConfig, Entry, Page, Resource};
pub use stats::CatalogStats;
