//! Lifecycle event types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CatalogError, Result};

/// Kind of lifecycle change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl EventKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(EventKind::Create),
            "update" => Ok(EventKind::Update),
            "delete" => Ok(EventKind::Delete),
            other => Err(CatalogError::BadRequest(format!(
                "unknown event type: {}",
                other
            ))),
        }
    }
}

bitflags::bitflags! {
    /// Set of event kinds a subscriber is interested in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventKinds: u8 {
        const CREATE = 0b001;
        const UPDATE = 0b010;
        const DELETE = 0b100;
    }
}

impl EventKinds {
    /// Whether `kind` is in the set
    pub fn includes(&self, kind: EventKind) -> bool {
        self.contains(EventKinds::from(kind))
    }

    /// Parse a comma separated list such as `"create,delete"`
    ///
    /// An empty string selects every kind.
    pub fn parse_list(list: &str) -> Result<Self> {
        let mut kinds = EventKinds::empty();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            kinds |= EventKinds::from(name.parse::<EventKind>()?);
        }
        if kinds.is_empty() {
            kinds = EventKinds::all();
        }
        Ok(kinds)
    }
}

impl From<EventKind> for EventKinds {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Create => EventKinds::CREATE,
            EventKind::Update => EventKinds::UPDATE,
            EventKind::Delete => EventKinds::DELETE,
        }
    }
}

/// An emitted lifecycle event
///
/// `data` holds the entry snapshot for create and update, and `{"id": ...}`
/// for delete. Events are ordered by `id` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic id assigned by the event log
    pub id: u64,
    /// Kind of change
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Event payload
    pub data: Value,
}

impl Event {
    /// Id of the entry the event is about, if present in the payload
    pub fn entry_id(&self) -> Option<&str> {
        self.data.get("id").and_then(Value::as_str)
    }
}
