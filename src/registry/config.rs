//! Catalog configuration

use std::time::Duration;

/// Default interval between expiry sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Default hard ceiling on page size
pub const DEFAULT_MAX_PER_PAGE: usize = 100;

/// Catalog configuration options
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// How often the sweeper evicts expired entries
    pub sweep_interval: Duration,

    /// Largest accepted `per_page`
    pub max_per_page: usize,

    /// Page size callers should use when the client gives none
    pub default_per_page: usize,

    /// Prefix of generated entry ids
    pub entry_id_kind: String,

    /// Prefix of generated resource ids
    pub resource_id_kind: String,

    /// Number of events kept for replay
    pub event_log_capacity: usize,

    /// Pending commands the hub queues before publishers wait
    pub hub_queue_capacity: usize,

    /// Undelivered events buffered per subscriber before the hub waits
    pub subscriber_buffer: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_per_page: DEFAULT_MAX_PER_PAGE,
            default_per_page: 20,
            entry_id_kind: "entry".to_string(),
            resource_id_kind: "resource".to_string(),
            event_log_capacity: 1000,
            hub_queue_capacity: 256,
            subscriber_buffer: 64,
        }
    }
}

impl CatalogConfig {
    /// Set the sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the page size ceiling (at least 1)
    pub fn max_per_page(mut self, max: usize) -> Self {
        self.max_per_page = max.max(1);
        self.default_per_page = self.default_per_page.min(self.max_per_page);
        self
    }

    /// Set the default page size, capped at `max_per_page`
    pub fn default_per_page(mut self, per_page: usize) -> Self {
        self.default_per_page = per_page.clamp(1, self.max_per_page);
        self
    }

    /// Set the prefixes of generated ids
    pub fn id_kinds(mut self, entry: impl Into<String>, resource: impl Into<String>) -> Self {
        self.entry_id_kind = entry.into();
        self.resource_id_kind = resource.into();
        self
    }

    /// Set the event log capacity (at least 1)
    pub fn event_log_capacity(mut self, capacity: usize) -> Self {
        self.event_log_capacity = capacity.max(1);
        self
    }

    /// Set the hub command queue capacity (at least 1)
    pub fn hub_queue_capacity(mut self, capacity: usize) -> Self {
        self.hub_queue_capacity = capacity.max(1);
        self
    }

    /// Set the per-subscriber buffer (at least 1)
    pub fn subscriber_buffer(mut self, capacity: usize) -> Self {
        self.subscriber_buffer = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CatalogConfig::default();

        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.max_per_page, DEFAULT_MAX_PER_PAGE);
        assert_eq!(config.default_per_page, 20);
        assert_eq!(config.entry_id_kind, "entry");
        assert_eq!(config.resource_id_kind, "resource");
        assert_eq!(config.event_log_capacity, 1000);
    }

    #[test]
    fn test_builder_max_per_page_caps_default() {
        let config = CatalogConfig::default().max_per_page(10);

        assert_eq!(config.max_per_page, 10);
        assert_eq!(config.default_per_page, 10);
    }

    #[test]
    fn test_builder_default_per_page_clamped() {
        let config = CatalogConfig::default().default_per_page(1000);
        assert_eq!(config.default_per_page, DEFAULT_MAX_PER_PAGE);

        let config = CatalogConfig::default().default_per_page(0);
        assert_eq!(config.default_per_page, 1);
    }

    #[test]
    fn test_builder_capacities_at_least_one() {
        let config = CatalogConfig::default()
            .event_log_capacity(0)
            .hub_queue_capacity(0)
            .subscriber_buffer(0);

        assert_eq!(config.event_log_capacity, 1);
        assert_eq!(config.hub_queue_capacity, 1);
        assert_eq!(config.subscriber_buffer, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = CatalogConfig::default()
            .sweep_interval(Duration::from_millis(250))
            .id_kinds("device", "res")
            .max_per_page(50)
            .default_per_page(25);

        assert_eq!(config.sweep_interval, Duration::from_millis(250));
        assert_eq!(config.entry_id_kind, "device");
        assert_eq!(config.resource_id_kind, "res");
        assert_eq!(config.max_per_page, 50);
        assert_eq!(config.default_per_page, 25);
    }
}
