//! Catalog statistics

pub mod metrics;

pub use metrics::CatalogStats;
