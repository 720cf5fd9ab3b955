//! Session identity and run-directory layout

use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chrono::Local;
use serde::Serialize;

/// Length of the session token (hex characters)
pub const SESSION_ID_LEN: usize = 12;

/// One session per process lifetime. Immutable after [`Session::start`].
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    start_ts: f64,
    started: Instant,
    ser_dev: String,
    baud: u32,
    run_dir: PathBuf,
    hostname: String,
}

/// Serialized form written to `session.json`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionMetadata {
    pub session: String,
    pub start_ts: f64,
    pub ser_dev: String,
    pub baud: u32,
    pub run_dir: String,
    pub hostname: String,
}

impl Session {
    /// Start a new session rooted under `log_dir`.
    ///
    /// The run directory is `<log_dir>/<YYYY-MM-DD>/<start_epoch>_<id>`; it is
    /// only computed here, the recorder creates it.
    pub fn start(log_dir: impl AsRef<Path>, ser_dev: &str, baud: u32) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string()[..SESSION_ID_LEN].to_string();
        let start_ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        let run_dir = log_dir
            .as_ref()
            .join(Local::now().format("%Y-%m-%d").to_string())
            .join(format!("{}_{}", start_ts as u64, id));

        Self {
            id,
            start_ts,
            started: Instant::now(),
            ser_dev: ser_dev.to_string(),
            baud,
            run_dir,
            hostname: hostname(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wall-clock start, seconds since the Unix epoch
    pub fn start_ts(&self) -> f64 {
        self.start_ts
    }

    pub fn ser_dev(&self) -> &str {
        &self.ser_dev
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Monotonic seconds since start, rounded to milliseconds
    pub fn uptime_s(&self) -> f64 {
        (self.started.elapsed().as_secs_f64() * 1000.0).round() / 1000.0
    }

    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            session: self.id.clone(),
            start_ts: self.start_ts,
            ser_dev: self.ser_dev.clone(),
            baud: self.baud,
            run_dir: self.run_dir.display().to_string(),
            hostname: self.hostname.clone(),
        }
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .unwrap_or_default()
}
