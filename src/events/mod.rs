//! Change notification pipeline
//!
//! Every mutation of the catalog produces an [`Event`]. The event is first
//! appended to the [`EventLog`], which assigns its id, and then handed to the
//! [`Hub`] for fan-out to live subscribers.
//!
//! ```text
//!  Catalog ──► EventLog::append ──► Hub::publish ──► Subscription ─┐
//!                   │                                              ├─► EventStream ──► sse::encode
//!                   └────────── EventLog::replay_after ────────────┘
//! ```

pub mod event;
pub mod hub;
pub mod log;
pub mod sse;
pub mod stream;

pub use event::{Event, EventKind, EventKinds};
pub use hub::{Hub, HubStats, SubscriberId, Subscription};
pub use log::{EventLog, FIRST_EVENT_ID};
pub use stream::EventStream;
