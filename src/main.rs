//! # Rover Bridge
//!
//! Drive a serial-connected rover from a browser and record every session.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (`ROVER_BRIDGE_CONFIG`, `SER_DEV`, `BAUD`)
//!    - Set up logging to stdout and a daily log file
//!    - Open the rover's serial port (fatal if missing)
//!    - Create the session run directory and write `session.json`
//!
//! 2. **Running**
//!    - Telemetry ingest task drains distance readings from the serial port
//!    - Heartbeat task marks liveness in the event stream
//!    - HTTP server turns operator requests into drive codes
//!
//! 3. **Shutdown** (Ctrl+C or SIGTERM)
//!    - Record `session_end`
//!    - Cancel background tasks and wait for them
//!
//! Expected output:
//! ```text
//! INFO rover_bridge: Rover Bridge v0.1.0 starting...
//! INFO rover_bridge::serial: Opened rover serial device at /dev/ttyUSB0 (115200 baud)
//! INFO rover_bridge::recorder: Recording session 3f9c0a1b2c4d to runlogs/2025-01-01/1735732800_3f9c0a1b2c4d
//! INFO rover_bridge: Serving on 0.0.0.0:8000
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use rover_bridge::bridge::Bridge;
use rover_bridge::config::Config;
use rover_bridge::http::{self, AppState};
use rover_bridge::recorder::{run_heartbeat, EventPayload, Session, SessionRecorder};
use rover_bridge::serial::SerialChannel;
use rover_bridge::telemetry::{TelemetryCache, TelemetryIngest};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let _log_guard = init_logging(&config.recorder.log_dir)?;

    info!("Rover Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    // No rover, no bridge
    let channel = Arc::new(SerialChannel::open(&config.serial)?);

    let session = Session::start(
        &config.recorder.log_dir,
        channel.device_path(),
        channel.baud_rate(),
    );
    let recorder = Arc::new(SessionRecorder::create(session)?);
    recorder.write_session_metadata()?;

    let cancel = CancellationToken::new();
    let telemetry = TelemetryCache::new();

    let ingest = TelemetryIngest::new(
        Arc::clone(&channel),
        telemetry.clone(),
        Arc::clone(&recorder),
        Duration::from_millis(config.telemetry.poll_interval_ms),
    );
    let ingest_task = tokio::spawn(ingest.run(cancel.clone()));

    let heartbeat_task = tokio::spawn(run_heartbeat(
        Arc::clone(&recorder),
        Duration::from_millis(config.recorder.heartbeat_interval_ms),
        cancel.clone(),
    ));

    let bridge = Arc::new(Bridge::new(channel, Arc::clone(&recorder), telemetry));
    let app = http::router(AppState {
        bridge: Arc::clone(&bridge),
        tail_bytes: config.recorder.tail_bytes,
    });

    let addr = format!("{}:{}", config.http.bind_addr, config.http.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    bridge.record(EventPayload::HttpStart {
        host: config.http.bind_addr.clone(),
        port: config.http.port,
    });
    info!("Serving on {}", addr);
    info!("Press Ctrl+C to exit");

    let shutdown = {
        let recorder = Arc::clone(&recorder);
        let cancel = cancel.clone();
        async move {
            wait_for_signal().await;
            info!("Shutdown requested");
            if let Err(e) = recorder.finish() {
                warn!("Failed to record session end: {}", e);
            }
            cancel.cancel();
        }
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    // Server may also stop on its own; close out the session either way
    recorder.finish()?;
    cancel.cancel();
    let (ingest_result, heartbeat_result) = tokio::join!(ingest_task, heartbeat_task);
    ingest_result?;
    heartbeat_result?;

    info!("Rover Bridge stopped");
    Ok(())
}

/// Stdout plus a daily-rolling file in the log directory
fn init_logging(log_dir: &str) -> Result<WorkerGuard> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("rover-bridge")
        .filename_suffix("log")
        .build(log_dir)
        .context("Failed to create log file appender")?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}

/// Resolve on Ctrl+C or SIGTERM
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
