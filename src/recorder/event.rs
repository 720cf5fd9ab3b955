//! # Event Model
//!
//! One JSON object per line in `events.jsonl`:
//!
//! ```json
//! {"ts":"2025-01-01T12:00:00.123Z","uptime_s":4.2,"session":"3f9c0a1b2c4d","kind":"tx","command":"F"}
//! ```
//!
//! The envelope (`ts`, `uptime_s`, `session`) is shared by every record and
//! the kind-specific payload is flattened next to it.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::telemetry::TelemetryReading;

/// Key holding undecodable ingest bodies
pub const RAW_FALLBACK_KEY: &str = "_raw";

/// Timestamped, append-only record
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Wall clock, RFC 3339 UTC with milliseconds
    pub ts: String,
    /// Monotonic seconds since session start
    pub uptime_s: f64,
    pub session: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Kind tag plus kind-specific fields
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// A drive code was written to the serial port
    Tx { command: String },
    /// Inbound HTTP request
    HttpGet { path: String, client: String },
    /// HTTP listener bound
    HttpStart { host: String, port: u16 },
    /// Distance telemetry, full snapshot of the cache after the update
    Ultrasonic { data: TelemetryReading },
    /// External sensor payload posted to `/ingest/<topic>`
    Ingest { topic: String, data: IngestData },
    /// Liveness marker
    Heartbeat { ser_dev: String, baud: u32 },
    /// A recoverable failure absorbed at `location`
    Error {
        #[serde(rename = "where")]
        location: String,
        msg: String,
    },
    SessionStart {
        start_ts: f64,
        ser_dev: String,
        baud: u32,
        run_dir: String,
        hostname: String,
    },
    SessionEnd { final_uptime_s: f64 },
}

impl EventPayload {
    /// Convenience constructor for error events
    pub fn error(location: impl Into<String>, msg: impl ToString) -> Self {
        EventPayload::Error {
            location: location.into(),
            msg: msg.to_string(),
        }
    }

    /// The `kind` tag written for this payload
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Tx { .. } => "tx",
            EventPayload::HttpGet { .. } => "http_get",
            EventPayload::HttpStart { .. } => "http_start",
            EventPayload::Ultrasonic { .. } => "ultrasonic",
            EventPayload::Ingest { .. } => "ingest",
            EventPayload::Heartbeat { .. } => "heartbeat",
            EventPayload::Error { .. } => "error",
            EventPayload::SessionStart { .. } => "session_start",
            EventPayload::SessionEnd { .. } => "session_end",
        }
    }
}

/// Body of an ingest request, decided once at decode time.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestData {
    /// Well-formed JSON, recorded verbatim
    Structured(Value),
    /// Anything else, recorded as `{"_raw": text}`
    Raw(String),
}

impl IngestData {
    /// Decode a request body. Never fails.
    ///
    /// An empty body is treated as `{}`.
    pub fn decode(body: &[u8]) -> Self {
        if body.is_empty() {
            return IngestData::Structured(Value::Object(Default::default()));
        }

        match serde_json::from_slice(body) {
            Ok(value) => IngestData::Structured(value),
            Err(_) => IngestData::Raw(String::from_utf8_lossy(body).into_owned()),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, IngestData::Raw(_))
    }
}

impl Serialize for IngestData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            IngestData::Structured(value) => value.serialize(serializer),
            IngestData::Raw(text) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(RAW_FALLBACK_KEY, text)?;
                map.end()
            }
        }
    }
}
