//! Write records and the key scheme that makes them self-verifying
//!
//! A key encodes exactly one sequence index and the payload repeats it as
//! `id`, so recovery can detect corruption without keeping a ledger.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

/// Maps (writer, index) to keys and back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyScheme {
    prefix: String,
    writers: u32,
}

impl KeyScheme {
    /// `writers == 1` gives `{prefix}{i}`, more give `{prefix}{w}_{i}`
    pub fn new(prefix: impl Into<String>, writers: u32) -> Self {
        Self {
            prefix: prefix.into(),
            writers: writers.max(1),
        }
    }

    /// Number of writers sharing this scheme
    pub fn writers(&self) -> u32 {
        self.writers
    }

    /// Key prefix owned by one writer; the index follows it directly
    pub fn writer_prefix(&self, writer: u32) -> String {
        if self.writers == 1 {
            self.prefix.clone()
        } else {
            format!("{}{}_", self.prefix, writer)
        }
    }

    /// Key for a writer's `index`-th record
    pub fn key(&self, writer: u32, index: u64) -> String {
        format!("{}{}", self.writer_prefix(writer), index)
    }
}

/// Read the `id` field of a recovered payload
///
/// Accepts a JSON number or a numeric string.
pub fn decode_index(payload: &Value) -> Option<u64> {
    match payload.get("id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// One logical write, immutable once built
#[derive(Debug, Clone)]
pub struct WriteRecord {
    key: String,
    writer: u32,
    index: u64,
    payload_bytes: usize,
    issued_at: DateTime<Utc>,
}

impl WriteRecord {
    /// Build the `index`-th record of `writer`
    pub fn new(scheme: &KeyScheme, writer: u32, index: u64, payload_bytes: usize) -> Self {
        Self {
            key: scheme.key(writer, index),
            writer,
            index,
            payload_bytes,
            issued_at: Utc::now(),
        }
    }

    /// Target key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Sequence index encoded in the key
    pub fn index(&self) -> u64 {
        self.index
    }

    /// JSON body sent with the PUT
    pub fn body(&self) -> Value {
        json!({
            "id": self.index,
            "writer": self.writer,
            "data": "x".repeat(self.payload_bytes),
            "ts": self.issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}
