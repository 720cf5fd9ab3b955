//! Periodic liveness marker in the event stream

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{EventPayload, SessionRecorder};

/// Emit a `heartbeat` event immediately, then every `period`, until cancelled
///
/// Cancellation is observed at the next wake, so shutdown latency is bounded
/// by one period.
pub async fn run_heartbeat(
    recorder: Arc<SessionRecorder>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ser_dev = recorder.session().ser_dev().to_string();
    let baud = recorder.session().baud();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = ticker.tick() => {
                let beat = EventPayload::Heartbeat { ser_dev: ser_dev.clone(), baud };
                if let Err(e) = recorder.log_event(beat) {
                    warn!("Failed to record heartbeat: {}", e);
                }
            }
        }
    }

    debug!("Heartbeat stopped");
}
