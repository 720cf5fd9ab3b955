//! # Bridge Context
//!
//! The one explicitly owned context shared by every HTTP handler: the intent
//! arbiter, the serial channel, the session recorder and the telemetry cache.
//!
//! Operator actions flow through [`Bridge::apply`]: resolve, transmit, record.
//! Transmission is fire-and-forget; a failed write is recorded as an `error`
//! event and otherwise ignored.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::drive::{DirectionKey, DriveCommand, IntentArbiter, OperatorAction};
use crate::recorder::{EventPayload, IngestData, SessionRecorder};
use crate::serial::SerialChannel;
use crate::telemetry::{TelemetryCache, TelemetryReading};

/// A press or release edge from server-side key tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Press(DirectionKey),
    Release(DirectionKey),
}

/// Snapshot served by the metrics endpoints
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub session: String,
    pub uptime_s: f64,
    pub ser_dev: String,
    pub baud: u32,
    pub run_dir: String,
    pub events_path: String,
    pub commands_csv: String,
    pub ultrasonic_cm: TelemetryReading,
    pub start_ts: f64,
}

/// Shared process context
pub struct Bridge {
    arbiter: Mutex<IntentArbiter>,
    channel: Arc<SerialChannel>,
    recorder: Arc<SessionRecorder>,
    telemetry: TelemetryCache,
}

impl Bridge {
    pub fn new(
        channel: Arc<SerialChannel>,
        recorder: Arc<SessionRecorder>,
        telemetry: TelemetryCache,
    ) -> Self {
        Self {
            arbiter: Mutex::new(IntentArbiter::new()),
            channel,
            recorder,
            telemetry,
        }
    }

    /// Handle a single-character route action
    ///
    /// Speed and autonomous actions bypass arbitration. Returns the command
    /// that was sent (or attempted).
    pub async fn apply(&self, action: OperatorAction) -> DriveCommand {
        let mut arbiter = self.arbiter.lock().await;
        let command = match action {
            OperatorAction::Hold(key) => arbiter.hold_only(key),
            OperatorAction::Stop => arbiter.release_all(),
            OperatorAction::Direct(command) => command,
            OperatorAction::Speed(level) => DriveCommand::Speed(level),
            OperatorAction::Autonomous(command) => command,
        };

        // Arbiter lock is held across the write so edges hit the wire in
        // the order they were resolved.
        self.send(command).await;
        command
    }

    /// Handle a server-side press/release edge
    pub async fn apply_edge(&self, edge: KeyEdge) -> DriveCommand {
        let mut arbiter = self.arbiter.lock().await;
        let command = match edge {
            KeyEdge::Press(key) => arbiter.press(key),
            KeyEdge::Release(key) => arbiter.release(key),
        };
        self.send(command).await;
        command
    }

    async fn send(&self, command: DriveCommand) {
        if let Err(e) = self.channel.transmit(command).await {
            warn!("Transmit of {} failed: {}", command, e);
            self.record(EventPayload::error("transmit", &e));
            return;
        }

        if let Err(e) = self.recorder.record_transmit(command) {
            warn!("Failed to record transmit of {}: {}", command, e);
        }
    }

    /// Record an externally posted sensor payload
    pub fn ingest(&self, topic: &str, body: &[u8]) {
        let data = IngestData::decode(body);
        if data.is_raw() {
            debug!(topic, "Ingest body is not JSON, recording raw text");
        }
        self.record(EventPayload::Ingest {
            topic: topic.to_string(),
            data,
        });
    }

    /// Append an event, logging instead of failing
    pub fn record(&self, payload: EventPayload) {
        let kind = payload.kind();
        if let Err(e) = self.recorder.log_event(payload) {
            warn!("Failed to record {} event: {}", kind, e);
        }
    }

    pub fn status(&self) -> StatusReport {
        let session = self.recorder.session();
        StatusReport {
            session: session.id().to_string(),
            uptime_s: session.uptime_s(),
            ser_dev: self.channel.device_path().to_string(),
            baud: self.channel.baud_rate(),
            run_dir: session.run_dir().display().to_string(),
            events_path: self.recorder.events_path().display().to_string(),
            commands_csv: self.recorder.commands_path().display().to_string(),
            ultrasonic_cm: self.telemetry.snapshot(),
            start_ts: session.start_ts(),
        }
    }

    pub fn recorder(&self) -> &Arc<SessionRecorder> {
        &self.recorder
    }

    pub fn channel(&self) -> &Arc<SerialChannel> {
        &self.channel
    }

    pub fn telemetry(&self) -> &TelemetryCache {
        &self.telemetry
    }
}
