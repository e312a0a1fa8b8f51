//! Catalog change feed example
//!
//! Run with: cargo run --example catalog_feed [DATA_DIR]
//!
//! Without a data directory the catalog lives in memory. With one, entries
//! and events survive restarts and the feed resumes after the last event the
//! previous run printed.
//!
//! ## What it does
//!
//! - Registers a permanent entry with two resources
//! - Registers a short-lived entry (ttl = 2s) and lets the sweeper evict it
//! - Prints every change as a Server-Sent Events frame, with keep-alive
//!   comments while the feed is idle

use std::sync::Arc;
use std::time::Duration;

use catalog_rs::events::sse;
use catalog_rs::{Catalog, CatalogConfig, Entry, EventKinds, Resource};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("catalog_rs=debug".parse()?)
                .add_directive("catalog_feed=debug".parse()?),
        )
        .init();

    let config = CatalogConfig::default().sweep_interval(Duration::from_millis(500));

    let catalog = match std::env::args().nth(1) {
        Some(dir) => {
            println!("Opening catalog in {}", dir);
            Catalog::open(dir, config)?
        }
        None => {
            println!("Using an in-memory catalog");
            Catalog::in_memory(config)?
        }
    };
    let catalog = Arc::new(catalog);
    let sweeper = catalog.spawn_sweeper();

    // Resume after whatever an earlier run already logged
    let resume_from = catalog.event_log().last_id();
    let mut stream = catalog.event_stream(resume_from, EventKinds::all()).await?;

    let printer = tokio::spawn(async move {
        // Idle connections get a comment frame so proxies keep them open
        let mut keep_alive = tokio::time::interval(Duration::from_secs(1));
        keep_alive.tick().await;

        loop {
            tokio::select! {
                event = stream.next() => {
                    let Some(event) = event else { break };
                    match sse::encode(&event) {
                        Ok(frame) => print!("{}", String::from_utf8_lossy(&frame)),
                        Err(e) => eprintln!("Failed to encode event {}: {}", event.id, e),
                    }
                    keep_alive.reset();
                }
                _ = keep_alive.tick() => {
                    print!("{}", String::from_utf8_lossy(sse::KEEP_ALIVE));
                }
            }
        }
    });

    let station = catalog
        .add(
            Entry::new("")
                .with_field("name", "weather-station")
                .with_field("meta", json!({ "site": "roof" }))
                .with_resource(Resource::new("").with_field("unit", "celsius"))
                .with_resource(Resource::new("").with_field("unit", "percent")),
        )
        .await?;
    println!("Registered {} with {} resources", station.id, station.resources.len());

    let beacon = catalog
        .add(Entry::new("").with_field("name", "beacon").with_ttl(2))
        .await?;
    println!("Registered {} (expires at {:?})", beacon.id, beacon.expires_at);

    tokio::time::sleep(Duration::from_secs(3)).await;

    let stats = catalog.stats().await?;
    println!(
        "Stats: entries={} resources={} expiring={:.0}% expired={} last_event_id={:?}",
        stats.entries,
        stats.resources,
        stats.expiring_ratio() * 100.0,
        stats.expired,
        stats.last_event_id
    );

    catalog.shutdown().await;
    sweeper.await?;
    printer.await?;

    Ok(())
}
