//! Catalog implementation
//!
//! The central controller that owns the entry store, the secondary indexes and
//! the id generator, and turns every mutation into a lifecycle event.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{CatalogError, Result};
use crate::events::{Event, EventKind, EventKinds, EventLog, EventStream, Hub, Subscription};
use crate::stats::CatalogStats;
use crate::storage::{DiskBackend, EntryStore, KvBackend, MemoryBackend};

use super::config::CatalogConfig;
use super::entry::{Entry, Resource};
use super::filter::Filter;
use super::ids::IdGenerator;
use super::index::Index;
use super::page::{paginate, paginate_vec, Page};
use super::validate::{AcceptAll, Validator};

/// File name of the entry database inside a data directory
pub const ENTRIES_FILE: &str = "entries.redb";

/// File name of the event log database inside a data directory
pub const EVENTS_FILE: &str = "events.redb";

/// Everything guarded by the catalog lock
struct CatalogState {
    store: EntryStore,
    index: Index,
    ids: IdGenerator,
}

impl CatalogState {
    /// Generate an id that is used neither by an entry nor by a resource
    fn fresh_id(&mut self, kind: &str) -> Result<String> {
        loop {
            let id = self.ids.next_id(kind);
            if !self.store.contains(&id)? && !self.index.has_resource(&id) {
                return Ok(id);
            }
        }
    }

    /// Fill in missing resource ids and point every resource at its entry
    fn adopt_resources(&mut self, entry: &mut Entry, kind: &str) -> Result<()> {
        for i in 0..entry.resources.len() {
            if entry.resources[i].id.is_empty() {
                entry.resources[i].id = self.fresh_id(kind)?;
            }
            entry.resources[i].entry_id = entry.id.clone();
        }
        Ok(())
    }
}

/// Registry of entries with TTL eviction and change notifications
///
/// One `RwLock` guards the store, both indexes and the id generator as a
/// unit. Every mutation holds the write lock from its first read until its
/// event has been logged and handed to the hub, so no reader ever observes a
/// half-indexed entry and events are emitted in mutation order.
pub struct Catalog {
    state: RwLock<CatalogState>,
    log: EventLog,
    hub: Hub,
    hub_task: Mutex<Option<JoinHandle<()>>>,
    validator: Box<dyn Validator>,
    shutdown: CancellationToken,
    sweeps: AtomicU64,
    expired: AtomicU64,
    config: CatalogConfig,
}

impl Catalog {
    /// Create a catalog over the given backends
    ///
    /// Rebuilds the indexes from `entries`, seeds the event log from `events`
    /// and starts the notification hub. Must be called inside a Tokio runtime.
    pub fn new(
        entries: Arc<dyn KvBackend>,
        events: Arc<dyn KvBackend>,
        config: CatalogConfig,
    ) -> Result<Self> {
        let store = EntryStore::new(entries);
        let index = Index::rebuild(&store)?;
        let log = EventLog::open(events, config.event_log_capacity)?;
        let (hub, hub_task) = Hub::spawn(config.hub_queue_capacity, config.subscriber_buffer);

        let entries = store.total()?;
        tracing::info!(
            entries,
            resources = index.resource_count(),
            last_event_id = ?log.last_id(),
            "Catalog ready"
        );

        Ok(Self {
            state: RwLock::new(CatalogState {
                store,
                index,
                ids: IdGenerator::new(),
            }),
            log,
            hub,
            hub_task: Mutex::new(Some(hub_task)),
            validator: Box::new(AcceptAll),
            shutdown: CancellationToken::new(),
            sweeps: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            config,
        })
    }

    /// Create a catalog that keeps everything in memory
    pub fn in_memory(config: CatalogConfig) -> Result<Self> {
        Self::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(MemoryBackend::new()),
            config,
        )
    }

    /// Open (or create) a durable catalog in `dir`
    ///
    /// Writes are committed synchronously; see [`DiskBackend`] for what that
    /// means for the runtime.
    pub fn open(dir: impl AsRef<Path>, config: CatalogConfig) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let entries = DiskBackend::open(dir.join(ENTRIES_FILE))?;
        let events = DiskBackend::open(dir.join(EVENTS_FILE))?;
        Self::new(Arc::new(entries), Arc::new(events), config)
    }

    /// Replace the validator consulted before every add and update
    pub fn with_validator(mut self, validator: impl Validator) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Get the catalog configuration
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Register a new entry
    ///
    /// A caller-supplied id must not match any entry or resource; missing ids
    /// are generated. Returns the stored entry.
    pub async fn add(&self, mut entry: Entry) -> Result<Entry> {
        self.validate(&entry)?;

        let mut state = self.state.write().await;

        if !entry.id.is_empty()
            && (state.store.contains(&entry.id)? || state.index.has_resource(&entry.id))
        {
            return Err(CatalogError::Conflict(format!(
                "id {} is already registered",
                entry.id
            )));
        }
        state.index.check_resources(&entry, None)?;

        if entry.id.is_empty() {
            entry.id = state.fresh_id(&self.config.entry_id_kind)?;
        }
        state.adopt_resources(&mut entry, &self.config.resource_id_kind)?;
        entry.stamp(None, Utc::now());
        let data = serde_json::to_value(&entry)?;

        state.index.insert(&entry)?;
        if let Err(e) = state.store.add(&entry) {
            state.index.remove(&entry);
            return Err(e);
        }

        let event = match self.log.append(EventKind::Create, data) {
            Ok(event) => event,
            Err(e) => {
                state.undo("add", &entry.id, state.store.delete(&entry.id));
                state.index.remove(&entry);
                return Err(e);
            }
        };

        tracing::info!(
            entry = %entry.id,
            resources = entry.resources.len(),
            ttl = ?entry.effective_ttl(),
            "Entry registered"
        );

        self.publish(event).await;
        Ok(entry)
    }

    /// Fetch an entry
    pub async fn get(&self, id: &str) -> Result<Entry> {
        let state = self.state.read().await;
        state
            .store
            .get(id)?
            .ok_or_else(|| CatalogError::not_found("entry", id))
    }

    /// Replace an existing entry
    ///
    /// Keeps `created_at`, refreshes `updated_at` and recomputes the expiry,
    /// so updating with an unchanged document is how clients keep an entry
    /// alive.
    pub async fn update(&self, id: &str, mut entry: Entry) -> Result<Entry> {
        self.validate(&entry)?;

        let mut state = self.state.write().await;

        let existing = state
            .store
            .get(id)?
            .ok_or_else(|| CatalogError::not_found("entry", id))?;

        if !entry.id.is_empty() && entry.id != id {
            return Err(CatalogError::BadRequest(format!(
                "entry id {} does not match {}",
                entry.id, id
            )));
        }
        entry.id = id.to_string();

        state.index.check_resources(&entry, Some(id))?;
        state.adopt_resources(&mut entry, &self.config.resource_id_kind)?;
        entry.stamp(existing.created_at, Utc::now());
        let data = serde_json::to_value(&entry)?;

        state.index.remove(&existing);
        if let Err(e) = state.index.insert(&entry) {
            state.restore(&existing);
            return Err(e);
        }
        if let Err(e) = state.store.update(&entry) {
            state.index.remove(&entry);
            state.restore(&existing);
            return Err(e);
        }

        let event = match self.log.append(EventKind::Update, data) {
            Ok(event) => event,
            Err(e) => {
                state.undo("update", id, state.store.update(&existing));
                state.index.remove(&entry);
                state.restore(&existing);
                return Err(e);
            }
        };

        tracing::info!(
            entry = %entry.id,
            resources = entry.resources.len(),
            ttl = ?entry.effective_ttl(),
            "Entry updated"
        );

        self.publish(event).await;
        Ok(entry)
    }

    /// Remove an entry and its resources
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;

        let existing = state
            .store
            .get(id)?
            .ok_or_else(|| CatalogError::not_found("entry", id))?;
        self.remove_locked(&mut state, &existing).await?;

        tracing::info!(entry = %id, "Entry deleted");
        Ok(())
    }

    /// One page of entries in id order
    pub async fn list(&self, page: usize, per_page: usize) -> Result<Page<Entry>> {
        let state = self.state.read().await;

        let total = state.store.total()?;
        let (offset, limit) = paginate(page, per_page, self.config.max_per_page, total)?;
        let items = if limit == 0 {
            Vec::new()
        } else {
            state.store.list(offset, limit)?
        };

        Ok(Page {
            items,
            page,
            per_page,
            total,
        })
    }

    /// One page of the entries matching `path op value`
    ///
    /// The whole store is scanned under a single read lock, so the result is
    /// a consistent snapshot; `total` counts all matches.
    pub async fn filter(
        &self,
        path: &str,
        op: &str,
        value: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Page<Entry>> {
        let filter = Filter::new(path, op, value)?;
        paginate(page, per_page, self.config.max_per_page, 0)?;

        let state = self.state.read().await;
        let mut matches = Vec::new();
        for entry in state.store.iter() {
            let entry = entry?;
            if filter.matches_document(&entry)? {
                matches.push(entry);
            }
        }
        drop(state);

        tracing::debug!(path, op = %filter.op(), value, matches = matches.len(), "Filtered entries");

        paginate_vec(matches, page, per_page, self.config.max_per_page)
    }

    /// Number of registered entries
    pub async fn total(&self) -> Result<usize> {
        self.state.read().await.store.total()
    }

    /// Resolve a resource through the resource index
    pub async fn resource(&self, id: &str) -> Result<Resource> {
        let state = self.state.read().await;

        let owner = state
            .index
            .owner_of(id)
            .ok_or_else(|| CatalogError::not_found("resource", id))?;
        let entry = state
            .store
            .get(owner)?
            .ok_or_else(|| CatalogError::not_found("entry", owner))?;

        entry
            .resource(id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("resource", id))
    }

    /// Id of the entry that owns a resource
    pub async fn resource_owner(&self, id: &str) -> Result<String> {
        let state = self.state.read().await;
        state
            .index
            .owner_of(id)
            .map(str::to_string)
            .ok_or_else(|| CatalogError::not_found("resource", id))
    }

    /// One page of resources in resource id order
    pub async fn list_resources(&self, page: usize, per_page: usize) -> Result<Page<Resource>> {
        let state = self.state.read().await;

        let total = state.index.resource_count();
        let (offset, limit) = paginate(page, per_page, self.config.max_per_page, total)?;

        let mut items = Vec::with_capacity(limit);
        let mut owner: Option<Entry> = None;
        for (resource_id, entry_id) in state.index.resources().skip(offset).take(limit) {
            if owner.as_ref().map(|e| e.id.as_str()) != Some(entry_id) {
                owner = state.store.get(entry_id)?;
            }
            let resource = owner
                .as_ref()
                .and_then(|entry| entry.resource(resource_id))
                .ok_or_else(|| CatalogError::not_found("resource", resource_id))?;
            items.push(resource.clone());
        }

        Ok(Page {
            items,
            page,
            per_page,
            total,
        })
    }

    /// One page of the resources matching `path op value`, in resource id order
    pub async fn filter_resources(
        &self,
        path: &str,
        op: &str,
        value: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Page<Resource>> {
        let filter = Filter::new(path, op, value)?;
        paginate(page, per_page, self.config.max_per_page, 0)?;

        let state = self.state.read().await;
        let mut matches = Vec::new();
        for entry in state.store.iter() {
            for resource in entry?.resources {
                if filter.matches_document(&resource)? {
                    matches.push(resource);
                }
            }
        }
        drop(state);

        matches.sort_by(|a, b| a.id.cmp(&b.id));
        paginate_vec(matches, page, per_page, self.config.max_per_page)
    }

    /// Evict every entry whose expiry has passed
    pub async fn sweep_expired(&self) -> Result<usize> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Evict every entry whose expiry is not after `now`
    ///
    /// Entries are removed earliest first and each removal emits a `delete`
    /// event. The first failure aborts the rest of the sweep; the remaining
    /// entries are picked up by the next one.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut state = self.state.write().await;
        self.sweeps.fetch_add(1, Ordering::Relaxed);

        let expired = state.index.expired(now);
        if expired.is_empty() {
            return Ok(0);
        }

        let mut evicted = 0;
        for id in expired {
            let entry = match state.store.get(&id) {
                Ok(Some(entry)) => entry,
                Ok(None) => return Err(CatalogError::not_found("entry", &id)),
                Err(e) => return Err(e),
            };
            self.remove_locked(&mut state, &entry).await?;

            evicted += 1;
            self.expired.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(entry = %id, expires_at = ?entry.expires_at, "Entry expired");
        }

        tracing::info!(evicted, remaining = state.index.expiring_count(), "Expiry sweep finished");
        Ok(evicted)
    }

    /// Spawn the background expiry sweeper
    ///
    /// Runs every `sweep_interval` until [`shutdown`](Self::shutdown).
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let catalog = Arc::clone(self);
        let cancel = self.shutdown.clone();
        let interval = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Expiry sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = catalog.sweep_expired().await {
                            tracing::warn!(error = %e, "Expiry sweep aborted");
                        }
                    }
                }
            }
        })
    }

    /// Subscribe to live events of the given kinds
    pub async fn subscribe(&self, kinds: EventKinds) -> Result<Subscription> {
        self.hub.subscribe(kinds).await
    }

    /// Open a replay-then-live stream for a (re)connecting client
    pub async fn event_stream(
        &self,
        last_event_id: Option<u64>,
        kinds: EventKinds,
    ) -> Result<EventStream> {
        EventStream::open(&self.hub, &self.log, last_event_id, kinds).await
    }

    /// Retained events with an id greater than `after`
    pub fn events_after(&self, after: u64) -> Result<Vec<Event>> {
        self.log.replay_after(after)
    }

    /// The event log
    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    /// The notification hub
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Current statistics
    pub async fn stats(&self) -> Result<CatalogStats> {
        let (entries, resources, expiring, next_expiry) = {
            let state = self.state.read().await;
            (
                state.store.total()?,
                state.index.resource_count(),
                state.index.expiring_count(),
                state.index.next_expiry(),
            )
        };

        Ok(CatalogStats {
            entries,
            resources,
            expiring,
            next_expiry,
            sweeps: self.sweeps.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            last_event_id: self.log.last_id(),
            retained_events: self.log.len(),
            hub: self.hub.stats().await.unwrap_or_default(),
        })
    }

    /// Stop the sweeper and the hub; subscriber streams end
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.hub.shutdown().await;

        let task = self.hub_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Notification hub task failed");
            }
        }

        tracing::info!("Catalog shut down");
    }

    fn validate(&self, entry: &Entry) -> Result<()> {
        self.validator
            .validate(entry)
            .map_err(CatalogError::BadRequest)
    }

    /// Delete `entry` from the store and indexes and emit its event
    ///
    /// Caller holds the write lock. If the event cannot be logged the entry
    /// and its index rows are put back.
    async fn remove_locked(&self, state: &mut CatalogState, entry: &Entry) -> Result<()> {
        state.store.delete(&entry.id)?;
        state.index.remove(entry);

        let event = match self.log.append(EventKind::Delete, json!({ "id": entry.id })) {
            Ok(event) => event,
            Err(e) => {
                state.undo("delete", &entry.id, state.store.add(entry));
                state.restore(entry);
                return Err(e);
            }
        };

        self.publish(event).await;
        Ok(())
    }

    /// Hand a logged event to the hub
    ///
    /// The event is already durable, so a stopped hub is not an error.
    async fn publish(&self, event: Event) {
        let (id, kind) = (event.id, event.kind);
        if self.hub.publish(event).await.is_err() {
            tracing::warn!(event = id, kind = %kind, "Hub stopped, event only logged");
        }
    }
}

impl CatalogState {
    /// Put back the index rows of an entry after a failed replacement
    fn restore(&mut self, entry: &Entry) {
        if let Err(e) = self.index.insert(entry) {
            tracing::error!(entry = %entry.id, error = %e, "Failed to restore index rows");
        }
    }

    /// Report a store write that undoes a mutation whose event was not logged
    fn undo(&self, op: &str, id: &str, result: Result<()>) {
        if let Err(e) = result {
            tracing::error!(op, entry = %id, error = %e, "Failed to roll back store write");
        }
    }
}
