//! Server-push wire framing
//!
//! Encodes `(id, name, data)` into standard SSE text framing so generic
//! EventSource clients parse call events unmodified. The server never
//! decodes frames; the only inbound parsing is the `timestamp` query
//! parameter.

use bytes::Bytes;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One relayed call event as delivered over a stream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Opaque token, unique per call
    pub id: String,
    /// Optional event name line
    pub name: Option<String>,
    /// Raw payload; literal newlines are escaped by the codec
    pub data: Bytes,
}

impl Event {
    pub fn new(id: impl Into<String>, data: Bytes) -> Self {
        Self {
            id: id.into(),
            name: None,
            data,
        }
    }

    /// Encode into an SSE frame: an `id:` line, an optional `event:`
    /// line and a `data:` line. Embedded `\n` becomes a `data:` field
    /// continuation and `\r` is escaped so the field terminator never
    /// appears unescaped inside the payload. The stream session appends
    /// the final newline that completes the blank-line terminator.
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(self.data.len() + 64);
        out.extend_from_slice(b"id:");
        out.extend_from_slice(self.id.as_bytes());
        out.push(b'\n');
        if let Some(name) = &self.name {
            out.extend_from_slice(b"event:");
            out.extend_from_slice(name.as_bytes());
            out.push(b'\n');
        }
        out.extend_from_slice(b"data:");
        for &byte in self.data.iter() {
            match byte {
                b'\n' => out.extend_from_slice(b"\ndata:"),
                b'\r' => out.extend_from_slice(b"\\r"),
                _ => out.push(byte),
            }
        }
        out.push(b'\n');
        Bytes::from(out)
    }
}

/// Parse a decimal Unix timestamp query parameter.
///
/// Malformed input yields the epoch, which consistently fails the
/// freshness check downstream; it never panics and never passes. Values
/// that parse but overflow `SystemTime` fall back to the epoch too.
pub fn parse_unix_timestamp(s: &str) -> SystemTime {
    s.parse::<u64>()
        .ok()
        .and_then(|secs| UNIX_EPOCH.checked_add(Duration::from_secs(secs)))
        .unwrap_or(UNIX_EPOCH)
}
