//! Entry registry
//!
//! The registry owns the entry documents, keeps the resource and expiry
//! indexes in step with them and turns every mutation into an event.
//!
//! # Architecture
//!
//! ```text
//!                           Arc<Catalog>
//!                 ┌──────────────────────────────┐
//!                 │ RwLock<CatalogState {        │
//!                 │   store: EntryStore,         │
//!                 │   index: Index {             │
//!                 │     resources, expiry        │
//!                 │   },                         │
//!                 │   ids: IdGenerator,          │
//!                 │ }>                           │
//!                 └──────┬───────────────┬───────┘
//!                        │               │
//!        add/update/delete/sweep         │ list/filter/get
//!                        │               │
//!                        ▼               ▼
//!                 EventLog.append()   (read lock)
//!                        │
//!                        ▼
//!                 Hub.publish() ──► Subscription ──► EventStream
//! ```
//!
//! # Expiry
//!
//! An entry with a positive `ttl` expires `ttl` seconds after its last write.
//! The expiry index is sorted by instant, so a sweep only visits the expired
//! prefix and stops at the first future row.

pub mod config;
pub mod entry;
pub mod filter;
pub mod ids;
pub mod index;
pub mod page;
pub mod store;
pub mod validate;

pub use config::CatalogConfig;
pub use entry::{Entry, Resource};
pub use filter::{Filter, FilterOp};
pub use ids::IdGenerator;
pub use index::Index;
pub use page::{paginate, Page};
pub use store::Catalog;
pub use validate::{AcceptAll, Validator};
