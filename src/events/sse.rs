//! Server-Sent Events framing
//!
//! Each event becomes one SSE frame:
//!
//! ```text
//! event: <create|update|delete>
//! id: <event id>
//! data: <JSON document>
//!
//! ```
//!
//! The `id` line lets a browser's `EventSource` reconnect with a
//! `Last-Event-ID` header, which [`parse_last_event_id`] turns back into the
//! id to replay from.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Result;

use super::event::Event;

/// Comment frame used to keep idle connections open
pub const KEEP_ALIVE: &[u8] = b": keep-alive\n\n";

/// Encode an event as an SSE frame
pub fn encode(event: &Event) -> Result<Bytes> {
    let data = serde_json::to_string(&event.data)?;
    let id = event.id.to_string();
    let kind = event.kind.as_str();

    let mut buf = BytesMut::with_capacity(24 + kind.len() + id.len() + data.len());
    buf.put_slice(b"event: ");
    buf.put_slice(kind.as_bytes());
    buf.put_slice(b"\nid: ");
    buf.put_slice(id.as_bytes());
    buf.put_slice(b"\ndata: ");
    buf.put_slice(data.as_bytes());
    buf.put_slice(b"\n\n");
    Ok(buf.freeze())
}

/// Parse a `Last-Event-ID` header value
pub fn parse_last_event_id(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}
