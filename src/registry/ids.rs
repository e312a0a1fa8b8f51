//! Identifier generation
//!
//! Generated ids have the form `<kind>:<hex>` where the hex part is the
//! process start time in nanoseconds plus a counter. The generator lives inside
//! the catalog state and is only advanced under the catalog's write lock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic id generator
#[derive(Debug)]
pub struct IdGenerator {
    start: u64,
    counter: u64,
}

impl IdGenerator {
    /// Seed the generator from the current wall clock
    pub fn new() -> Self {
        let start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::with_start(start)
    }

    /// Seed the generator with an explicit start value
    pub fn with_start(start: u64) -> Self {
        Self { start, counter: 0 }
    }

    /// Produce the next id of the given kind
    pub fn next_id(&mut self, kind: &str) -> String {
        self.counter += 1;
        format!("{}:{:x}", kind, self.start.wrapping_add(self.counter))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
