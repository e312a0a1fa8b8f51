//! Statistics for a running catalog

use chrono::{DateTime, Utc};

use crate::events::HubStats;

/// Catalog-wide statistics
#[derive(Debug, Clone, Default)]
pub struct CatalogStats {
    /// Registered entries
    pub entries: usize,
    /// Indexed resources across all entries
    pub resources: usize,
    /// Entries with a TTL
    pub expiring: usize,
    /// Earliest pending expiry
    pub next_expiry: Option<DateTime<Utc>>,
    /// Completed expiry sweeps
    pub sweeps: u64,
    /// Entries evicted by sweeps
    pub expired: u64,
    /// Id of the most recent event
    pub last_event_id: Option<u64>,
    /// Events currently retained for replay
    pub retained_events: usize,
    /// Notification hub counters
    pub hub: HubStats,
}

impl CatalogStats {
    /// Share of entries that will expire, between 0 and 1
    pub fn expiring_ratio(&self) -> f64 {
        if self.entries == 0 {
            0.0
        } else {
            self.expiring as f64 / self.entries as f64
        }
    }
}
