//! Secondary indexes
//!
//! Two sorted structures derived from the stored entries:
//!
//! - resource index: resource id → owning entry id (unique keys)
//! - expiry index: expiry instant → entry ids (duplicate instants allowed)
//!
//! The expiry index is a multi-map, so removing one entry's row is a lookup
//! of its instant followed by removing that id from the instant's list; rows
//! of other entries sharing the instant are never touched.
//!
//! The indexes are purely in memory and rebuilt from the store on startup.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::error::{CatalogError, Result};
use crate::storage::EntryStore;

use super::entry::Entry;

/// Resource and expiry indexes for the catalog
#[derive(Debug, Default)]
pub struct Index {
    resources: BTreeMap<String, String>,
    expiry: BTreeMap<DateTime<Utc>, Vec<String>>,
    expiring: usize,
}

impl Index {
    /// Create empty indexes
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the indexes by scanning every stored entry
    pub fn rebuild(store: &EntryStore) -> Result<Self> {
        let mut index = Self::new();
        for entry in store.iter() {
            index.insert(&entry?)?;
        }

        tracing::debug!(
            resources = index.resource_count(),
            expiring = index.expiring_count(),
            "Rebuilt indexes"
        );

        Ok(index)
    }

    /// Check that `entry`'s resource ids are free
    ///
    /// Ids already owned by `owner` are allowed, so an update may keep its own
    /// resources. Ids repeated inside the document are a conflict too. Empty
    /// ids are still to be assigned and are skipped.
    pub fn check_resources(&self, entry: &Entry, owner: Option<&str>) -> Result<()> {
        let mut seen = HashSet::new();
        for resource in entry.resources.iter().filter(|r| !r.id.is_empty()) {
            if !seen.insert(resource.id.as_str()) {
                return Err(CatalogError::Conflict(format!(
                    "resource {} appears more than once",
                    resource.id
                )));
            }

            if let Some(existing) = self.resources.get(&resource.id) {
                if Some(existing.as_str()) != owner {
                    return Err(CatalogError::Conflict(format!(
                        "resource {} is registered by {}",
                        resource.id, existing
                    )));
                }
            }
        }
        Ok(())
    }

    /// Insert every index row of `entry`
    ///
    /// Fails with `Conflict` before touching anything if a resource id is
    /// already indexed.
    pub fn insert(&mut self, entry: &Entry) -> Result<()> {
        self.check_resources(entry, None)?;

        for resource in &entry.resources {
            self.resources
                .insert(resource.id.clone(), entry.id.clone());
        }

        if let Some(at) = entry.expires_at {
            self.expiry.entry(at).or_default().push(entry.id.clone());
            self.expiring += 1;
        }
        Ok(())
    }

    /// Remove every index row of `entry`
    ///
    /// `entry` must be the stored version, since its `expires_at` locates the
    /// expiry row.
    pub fn remove(&mut self, entry: &Entry) {
        for resource in &entry.resources {
            if self.resources.get(&resource.id) == Some(&entry.id) {
                self.resources.remove(&resource.id);
            }
        }

        let Some(at) = entry.expires_at else {
            return;
        };

        if let Some(ids) = self.expiry.get_mut(&at) {
            if let Some(pos) = ids.iter().position(|id| *id == entry.id) {
                ids.remove(pos);
                self.expiring -= 1;
            }
            if ids.is_empty() {
                self.expiry.remove(&at);
            }
        }
    }

    /// Owner of a resource
    pub fn owner_of(&self, resource_id: &str) -> Option<&str> {
        self.resources.get(resource_id).map(String::as_str)
    }

    /// Whether a resource id is indexed
    pub fn has_resource(&self, resource_id: &str) -> bool {
        self.resources.contains_key(resource_id)
    }

    /// All `(resource id, entry id)` rows in resource id order
    pub fn resources(&self) -> impl Iterator<Item = (&str, &str)> {
        self.resources
            .iter()
            .map(|(resource, entry)| (resource.as_str(), entry.as_str()))
    }

    /// Ids of entries whose expiry is not after `now`, earliest first
    ///
    /// Only the expired prefix of the index is visited.
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<String> {
        self.expiry
            .range(..=now)
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }

    /// Earliest expiry instant in the index
    pub fn next_expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry.keys().next().copied()
    }

    /// Number of resource rows
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of expiry rows
    pub fn expiring_count(&self) -> usize {
        self.expiring
    }

    /// All expiry rows in ascending order
    pub fn expiry_rows(&self) -> impl Iterator<Item = (DateTime<Utc>, &str)> {
        self.expiry
            .iter()
            .flat_map(|(at, ids)| ids.iter().map(move |id| (*at, id.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::registry::Resource;
    use crate::storage::MemoryBackend;

    fn expiring(id: &str, at: DateTime<Utc>) -> Entry {
        let mut entry = Entry::new(id);
        entry.expires_at = Some(at);
        entry
    }

    #[test]
    fn test_resource_rows() {
        let mut index = Index::new();
        let entry = Entry::new("a")
            .with_resource(Resource::new("r1"))
            .with_resource(Resource::new("r2"));

        index.insert(&entry).unwrap();
        assert_eq!(index.owner_of("r1"), Some("a"));
        assert_eq!(index.owner_of("r2"), Some("a"));

        index.remove(&entry);
        assert!(!index.has_resource("r1"));
        assert_eq!(index.resource_count(), 0);
    }

    #[test]
    fn test_duplicate_resource_is_rejected_atomically() {
        let mut index = Index::new();
        index
            .insert(&Entry::new("a").with_resource(Resource::new("r1")))
            .unwrap();

        let clash = Entry::new("b")
            .with_resource(Resource::new("r0"))
            .with_resource(Resource::new("r1"));
        assert!(matches!(index.insert(&clash), Err(CatalogError::Conflict(_))));

        // Nothing from the failed insert leaked in
        assert!(!index.has_resource("r0"));
        assert_eq!(index.owner_of("r1"), Some("a"));
    }

    #[test]
    fn test_check_resources_allows_owner() {
        let mut index = Index::new();
        let entry = Entry::new("a").with_resource(Resource::new("r1"));
        index.insert(&entry).unwrap();

        assert!(index.check_resources(&entry, Some("a")).is_ok());
        assert!(index.check_resources(&entry, Some("b")).is_err());

        let repeated = Entry::new("c")
            .with_resource(Resource::new("x"))
            .with_resource(Resource::new("x"));
        assert!(index.check_resources(&repeated, None).is_err());
    }

    #[test]
    fn test_expired_stops_at_future_rows() {
        let now = Utc::now();
        let mut index = Index::new();
        index.insert(&expiring("late", now + Duration::seconds(5))).unwrap();
        index.insert(&expiring("early", now - Duration::seconds(5))).unwrap();
        index.insert(&expiring("exact", now)).unwrap();
        index.insert(&Entry::new("forever")).unwrap();

        assert_eq!(index.expired(now), vec!["early", "exact"]);
        assert_eq!(index.expiring_count(), 3);
        assert_eq!(index.next_expiry(), Some(now - Duration::seconds(5)));
    }

    #[test]
    fn test_duplicate_expiry_instants() {
        let at = Utc::now();
        let mut index = Index::new();
        let a = expiring("a", at);
        let b = expiring("b", at);
        let c = expiring("c", at);
        index.insert(&a).unwrap();
        index.insert(&b).unwrap();
        index.insert(&c).unwrap();

        // Removing the middle row leaves both neighbours in place
        index.remove(&b);
        assert_eq!(index.expired(at), vec!["a", "c"]);
        assert_eq!(index.expiring_count(), 2);

        index.remove(&a);
        index.remove(&c);
        assert!(index.expired(at).is_empty());
        assert!(index.next_expiry().is_none());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let at = Utc::now();
        let mut index = Index::new();
        index.insert(&expiring("a", at)).unwrap();

        index.remove(&expiring("ghost", at));
        assert_eq!(index.expired(at), vec!["a"]);
        assert_eq!(index.expiring_count(), 1);
    }

    #[test]
    fn test_rebuild_from_store() {
        let store = EntryStore::new(Arc::new(MemoryBackend::new()));
        let at = Utc::now();
        store
            .add(&expiring("a", at).with_resource(Resource::new("r1")))
            .unwrap();
        store.add(&Entry::new("b")).unwrap();

        let index = Index::rebuild(&store).unwrap();
        assert_eq!(index.owner_of("r1"), Some("a"));
        assert_eq!(index.expiry_rows().collect::<Vec<_>>(), vec![(at, "a")]);
    }
}
