//! Entry and resource documents
//!
//! An [`Entry`] is the unit of registration: a JSON document with a registry-wide
//! unique id, an optional TTL and any number of nested [`Resource`]s. Fields the
//! catalog does not interpret are kept in `payload` and passed through as-is.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A registered document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Registry-wide unique id; empty means "assign one"
    #[serde(default)]
    pub id: String,

    /// Time to live in seconds; `None` or `0` never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,

    /// Set by the catalog on add
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Set by the catalog on add and every update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// `updated_at + ttl`, present only for expiring entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Nested, independently addressable resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,

    /// Everything else in the document
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// A nested resource owned by an entry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Registry-wide unique id; empty means "assign one"
    #[serde(default)]
    pub id: String,

    /// Id of the owning entry, maintained by the catalog
    #[serde(default)]
    pub entry_id: String,

    /// Everything else in the resource document
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Entry {
    /// Create an entry with the given id (may be empty)
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the TTL in seconds
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Add a resource
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Set a payload field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// TTL that actually expires the entry (zero is treated as unset)
    pub fn effective_ttl(&self) -> Option<u64> {
        self.ttl.filter(|ttl| *ttl > 0)
    }

    /// Stamp timestamps for a write at `now`
    ///
    /// `created_at` is kept when already set (updates) and `expires_at` is
    /// recomputed from the TTL.
    pub(crate) fn stamp(&mut self, created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.created_at = Some(created_at.unwrap_or(now));
        self.updated_at = Some(now);
        self.expires_at = self.effective_ttl().map(|ttl| {
            i64::try_from(ttl)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|ttl| now.checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
    }

    /// Find a resource by id
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }
}

impl Resource {
    /// Create a resource with the given id (may be empty)
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set a payload field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_payload_round_trips_unknown_fields() {
        let doc = json!({
            "id": "dev-1",
            "ttl": 30,
            "name": "thermostat",
            "meta": { "room": "kitchen" },
            "resources": [{ "id": "r1", "unit": "celsius" }]
        });

        let entry: Entry = serde_json::from_value(doc).unwrap();
        assert_eq!(entry.id, "dev-1");
        assert_eq!(entry.ttl, Some(30));
        assert_eq!(entry.payload["name"], "thermostat");
        assert_eq!(entry.resources[0].payload["unit"], "celsius");

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["meta"]["room"], "kitchen");
        assert!(back.get("expiresAt").is_none());
    }

    #[test]
    fn test_stamp_sets_expiry() {
        let now = Utc::now();
        let mut entry = Entry::new("a").with_ttl(10);
        entry.stamp(None, now);

        assert_eq!(entry.created_at, Some(now));
        assert_eq!(entry.updated_at, Some(now));
        assert_eq!(entry.expires_at, Some(now + Duration::seconds(10)));
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let now = Utc::now();
        let mut entry = Entry::new("a").with_ttl(0);
        entry.stamp(None, now);

        assert!(entry.expires_at.is_none());
        assert!(entry.effective_ttl().is_none());
    }

    #[test]
    fn test_stamp_keeps_created_at() {
        let created = Utc::now() - Duration::seconds(60);
        let now = Utc::now();
        let mut entry = Entry::new("a");
        entry.stamp(Some(created), now);

        assert_eq!(entry.created_at, Some(created));
        assert_eq!(entry.updated_at, Some(now));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let now = Utc::now();
        let mut entry = Entry::new("a").with_ttl(u64::MAX);
        entry.stamp(None, now);

        assert!(entry.expires_at.unwrap() > now);
    }
}
