//! # Telemetry Ingest Loop
//!
//! Drains the serial receive path in the background, updates the
//! [`TelemetryCache`], and records each useful line as an `ultrasonic` event.
//!
//! Lines without a distance reading are dropped silently. Read and record
//! failures become `error` events and the loop keeps going.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::parser::parse_distances;
use super::reading::{TelemetryCache, TelemetryReading};
use crate::error::Result;
use crate::recorder::{EventPayload, SessionRecorder};
use crate::serial::SerialChannel;

/// Location tag for errors raised by this loop
const ERROR_LOCATION: &str = "serial_listener";

/// Background telemetry reader
pub struct TelemetryIngest {
    channel: Arc<SerialChannel>,
    cache: TelemetryCache,
    recorder: Arc<SessionRecorder>,
    poll_interval: Duration,
}

impl TelemetryIngest {
    pub fn new(
        channel: Arc<SerialChannel>,
        cache: TelemetryCache,
        recorder: Arc<SessionRecorder>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            channel,
            cache,
            recorder,
            poll_interval,
        }
    }

    /// Parse one line and, if it carries readings, update the cache and record
    /// the full snapshot.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(snapshot))` - the cache was updated
    /// * `Ok(None)` - no reading in the line, nothing changed
    pub fn process_line(&self, line: &str) -> Result<Option<TelemetryReading>> {
        let samples = parse_distances(line);
        if samples.is_empty() {
            return Ok(None);
        }

        let snapshot = self.cache.apply(&samples);
        self.recorder
            .log_event(EventPayload::Ultrasonic { data: snapshot })?;
        debug!(?snapshot, "Telemetry updated");
        Ok(Some(snapshot))
    }

    /// Run until `cancel` fires
    ///
    /// A pending read is abandoned on cancellation; partial lines stay in the
    /// channel's buffer.
    pub async fn run(self, cancel: CancellationToken) {
        info!("Telemetry ingest started on {}", self.channel.device_path());

        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = self.channel.receive_line() => received,
            };

            let outcome = match received {
                Ok(Some(line)) => self.process_line(&line).map(|_| ()),
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                warn!("Telemetry ingest error: {}", e);
                if let Err(e) = self.recorder.log_event(EventPayload::error(ERROR_LOCATION, &e)) {
                    warn!("Failed to record telemetry error: {}", e);
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("Telemetry ingest stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::Session;
    use crate::serial::port_trait::mocks::MockSerialPort;
    use crate::serial::SerialReader;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    struct Fixture {
        _dir: TempDir,
        recorder: Arc<SessionRecorder>,
        cache: TelemetryCache,
        ingest: TelemetryIngest,
    }

    fn fixture(reader: SerialReader) -> Fixture {
        let dir = TempDir::new().unwrap();
        let session = Session::start(dir.path(), "/dev/mock0", 115200);
        let recorder = Arc::new(SessionRecorder::create(session).unwrap());
        let channel = Arc::new(SerialChannel::from_parts(
            Box::new(MockSerialPort::new()),
            reader,
            "/dev/mock0".to_string(),
            115200,
            Duration::from_millis(20),
        ));
        let cache = TelemetryCache::new();
        let ingest = TelemetryIngest::new(
            channel,
            cache.clone(),
            Arc::clone(&recorder),
            Duration::from_millis(5),
        );
        Fixture { _dir: dir, recorder, cache, ingest }
    }

    fn events(recorder: &SessionRecorder) -> Vec<Value> {
        std::fs::read_to_string(recorder.events_path())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn ultrasonic_lines(recorder: &SessionRecorder) -> usize {
        std::fs::read_to_string(recorder.events_path())
            .unwrap()
            .matches("\"kind\":\"ultrasonic\"")
            .count()
    }

    #[test]
    fn test_line_updates_present_labels_only() {
        let fx = fixture(Box::new(tokio::io::empty()));
        fx.cache.apply(&[(crate::telemetry::SensorPosition::Center, 50)]);

        let snapshot = fx.ingest.process_line("L: 23cm R: 87cm").unwrap().unwrap();

        assert_eq!(snapshot.left, Some(23));
        assert_eq!(snapshot.center, Some(50));
        assert_eq!(snapshot.right, Some(87));
        assert_eq!(fx.cache.snapshot(), snapshot);

        let events = events(&fx.recorder);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["kind"], "ultrasonic");
        assert_eq!(events[0]["data"], json!({"L": 23, "C": 50, "R": 87}));
    }

    #[test]
    fn test_unrecognized_line_changes_nothing() {
        let fx = fixture(Box::new(tokio::io::empty()));

        assert_eq!(fx.ingest.process_line("READY").unwrap(), None);
        assert_eq!(fx.cache.snapshot(), TelemetryReading::default());
        assert!(events(&fx.recorder).is_empty());
    }

    #[tokio::test]
    async fn test_run_ingests_until_cancelled() {
        let (mut device, host) = tokio::io::duplex(256);
        let fx = fixture(Box::new(host));
        let cache = fx.cache.clone();
        let recorder = Arc::clone(&fx.recorder);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(fx.ingest.run(cancel.clone()));

        device.write_all(b"L: 10cm\nnoise\xff\nC: 20cm R: 30cm\n").await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while ultrasonic_lines(&recorder) < 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        recorder.finish().unwrap();
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(
            cache.snapshot(),
            TelemetryReading { left: Some(10), center: Some(20), right: Some(30) }
        );

        let kinds: Vec<String> = events(&recorder)
            .iter()
            .map(|e| e["kind"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, vec!["ultrasonic", "ultrasonic", "session_end"]);
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled_mid_read() {
        let (_device, host) = tokio::io::duplex(64);
        let fx = fixture(Box::new(host));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(fx.ingest.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("ingest loop should observe cancellation")
            .unwrap();
    }
}
