//! # Session Recorder Module
//!
//! Durable, append-only record of everything the bridge observes.
//!
//! Each session gets its own run directory:
//!
//! ```text
//! <log_dir>/<YYYY-MM-DD>/<start_epoch>_<session>/
//! ├── events.jsonl   one JSON event per line
//! ├── commands.csv   ts,uptime_s,session,type,value
//! └── session.json   written once at startup
//! ```
//!
//! All writers share one mutex, so lines from HTTP handlers, the telemetry
//! task and the heartbeat task never interleave. After [`SessionRecorder::finish`]
//! the recorder is closed and further writes are dropped.

pub mod event;
pub mod heartbeat;
pub mod session;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use crate::drive::DriveCommand;
use crate::error::{Result, RoverBridgeError};

pub use event::{Event, EventPayload, IngestData, RAW_FALLBACK_KEY};
pub use heartbeat::run_heartbeat;
pub use session::{Session, SessionMetadata};

/// Event stream file name
pub const EVENTS_FILE: &str = "events.jsonl";
/// Command log file name
pub const COMMANDS_FILE: &str = "commands.csv";
/// Session metadata file name
pub const SESSION_FILE: &str = "session.json";

/// Header row of the command log
pub const COMMANDS_HEADER: &str = "ts,uptime_s,session,type,value";

struct RecorderState {
    events: File,
    commands: Option<File>,
    metadata_written: bool,
    closed: bool,
}

/// Append-only recorder for one session
pub struct SessionRecorder {
    session: Session,
    events_path: PathBuf,
    commands_path: PathBuf,
    metadata_path: PathBuf,
    state: Mutex<RecorderState>,
}

impl std::fmt::Debug for SessionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecorder")
            .field("session", &self.session.id())
            .field("run_dir", &self.session.run_dir())
            .finish_non_exhaustive()
    }
}

impl SessionRecorder {
    /// Create the run directory and open the event stream
    ///
    /// # Errors
    ///
    /// Returns error if the directory or event file cannot be created.
    pub fn create(session: Session) -> Result<Self> {
        let run_dir = session.run_dir().to_path_buf();
        fs::create_dir_all(&run_dir)?;

        let events_path = run_dir.join(EVENTS_FILE);
        let events = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&events_path)?;

        info!("Recording session {} to {}", session.id(), run_dir.display());

        Ok(Self {
            commands_path: run_dir.join(COMMANDS_FILE),
            metadata_path: run_dir.join(SESSION_FILE),
            events_path,
            session,
            state: Mutex::new(RecorderState {
                events,
                commands: None,
                metadata_written: false,
                closed: false,
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, RecorderState>> {
        self.state
            .lock()
            .map_err(|_| RoverBridgeError::Recorder("recorder lock poisoned".to_string()))
    }

    fn now_iso() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn append_event(&self, state: &mut RecorderState, payload: EventPayload) -> Result<()> {
        let event = Event {
            ts: Self::now_iso(),
            uptime_s: self.session.uptime_s(),
            session: self.session.id().to_string(),
            payload,
        };

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        state.events.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Append one event to the stream
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - the line was written
    /// * `Ok(false)` - the recorder is closed, nothing was written
    pub fn log_event(&self, payload: EventPayload) -> Result<bool> {
        let mut state = self.lock()?;
        if state.closed {
            debug!("Recorder closed, dropping {} event", payload.kind());
            return Ok(false);
        }
        self.append_event(&mut state, payload)?;
        Ok(true)
    }

    /// Append one row to the command log
    ///
    /// The header is written only by the writer that creates the file, so it
    /// appears once even if several processes race on the same run directory.
    pub fn log_command(&self, command: DriveCommand) -> Result<bool> {
        let mut state = self.lock()?;
        if state.closed {
            return Ok(false);
        }

        if state.commands.is_none() {
            state.commands = Some(open_command_log(&self.commands_path)?);
        }

        let row = format!(
            "{},{},{},{},{}\n",
            Self::now_iso(),
            self.session.uptime_s(),
            self.session.id(),
            command.category(),
            command.code()
        );
        if let Some(file) = state.commands.as_mut() {
            file.write_all(row.as_bytes())?;
        }
        Ok(true)
    }

    /// Record a transmitted command in both the event stream and command log
    pub fn record_transmit(&self, command: DriveCommand) -> Result<()> {
        self.log_event(EventPayload::Tx {
            command: command.code().to_string(),
        })?;
        self.log_command(command)?;
        Ok(())
    }

    /// Write `session.json` and emit the `session_start` event
    ///
    /// # Errors
    ///
    /// Returns [`RoverBridgeError::Recorder`] if called more than once.
    pub fn write_session_metadata(&self) -> Result<()> {
        let mut state = self.lock()?;
        if state.metadata_written {
            return Err(RoverBridgeError::Recorder(
                "session metadata already written".to_string(),
            ));
        }

        let meta = self.session.metadata();
        let file = File::create(&self.metadata_path)?;
        serde_json::to_writer_pretty(&file, &meta)?;
        state.metadata_written = true;

        if !state.closed {
            self.append_event(
                &mut state,
                EventPayload::SessionStart {
                    start_ts: meta.start_ts,
                    ser_dev: meta.ser_dev,
                    baud: meta.baud,
                    run_dir: meta.run_dir,
                    hostname: meta.hostname,
                },
            )?;
        }
        Ok(())
    }

    /// Emit the single `session_end` event and close the recorder
    ///
    /// Returns `Ok(false)` if the recorder was already closed.
    pub fn finish(&self) -> Result<bool> {
        let mut state = self.lock()?;
        if state.closed {
            return Ok(false);
        }

        let final_uptime_s = self.session.uptime_s();
        self.append_event(&mut state, EventPayload::SessionEnd { final_uptime_s })?;
        state.events.flush()?;
        state.closed = true;

        info!("Session {} closed after {:.3}s", self.session.id(), final_uptime_s);
        Ok(true)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }

    /// Last `max_bytes` of the event stream, lossily decoded
    pub fn tail(&self, max_bytes: u64) -> Result<String> {
        let mut file = File::open(&self.events_path)?;
        let size = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(size.saturating_sub(max_bytes)))?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn commands_path(&self) -> &Path {
        &self.commands_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }
}

fn open_command_log(path: &Path) -> Result<File> {
    match OpenOptions::new().append(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(format!("{}\n", COMMANDS_HEADER).as_bytes())?;
            Ok(file)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Ok(OpenOptions::new().append(true).open(path)?)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn recorder_in(dir: &TempDir) -> SessionRecorder {
        let session = Session::start(dir.path(), "/dev/ttyUSB0", 115200);
        SessionRecorder::create(session).unwrap()
    }

    fn read_events(recorder: &SessionRecorder) -> Vec<Value> {
        fs::read_to_string(recorder.events_path())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).expect("every line parses on its own"))
            .collect()
    }

    #[test]
    fn test_create_lays_out_run_dir() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_in(&dir);

        assert!(recorder.events_path().exists());
        assert!(recorder.events_path().starts_with(dir.path()));
        assert_eq!(recorder.events_path().parent(), Some(recorder.session().run_dir()));
        assert!(!recorder.commands_path().exists(), "command log is created lazily");
    }

    #[test]
    fn test_log_event_envelope() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_in(&dir);

        assert!(recorder
            .log_event(EventPayload::HttpGet { path: "/F".into(), client: "10.0.0.2".into() })
            .unwrap());

        let events = read_events(&recorder);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["kind"], "http_get");
        assert_eq!(events[0]["path"], "/F");
        assert_eq!(events[0]["session"], recorder.session().id());
        assert!(events[0]["ts"].as_str().unwrap().ends_with('Z'));
        assert!(events[0]["uptime_s"].as_f64().unwrap() >= 0.0);
    }

    #[test]
    fn test_concurrent_log_event_lines_never_interleave() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(recorder_in(&dir));
        let threads = 8;
        let per_thread = 50;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let recorder = Arc::clone(&recorder);
                std::thread::spawn(move || {
                    for i in 0..per_thread {
                        recorder
                            .log_event(EventPayload::Ingest {
                                topic: format!("t{}", t),
                                data: IngestData::Raw("x".repeat(200 + i)),
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let events = read_events(&recorder);
        assert_eq!(events.len(), threads * per_thread);
        for t in 0..threads {
            let topic = format!("t{}", t);
            assert_eq!(events.iter().filter(|e| e["topic"] == topic.as_str()).count(), per_thread);
        }
    }

    #[test]
    fn test_command_log_header_once() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_in(&dir);

        recorder.log_command(DriveCommand::Forward).unwrap();
        recorder.log_command(DriveCommand::from_code('4').unwrap()).unwrap();
        recorder.log_command(DriveCommand::Stop).unwrap();

        let csv = fs::read_to_string(recorder.commands_path()).unwrap();
        let rows: Vec<&str> = csv.lines().collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], COMMANDS_HEADER);

        let second: Vec<&str> = rows[2].split(',').collect();
        assert_eq!(second.len(), 5);
        assert_eq!(second[2], recorder.session().id());
        assert_eq!(second[3], "speed");
        assert_eq!(second[4], "4");
        assert!(rows[1].ends_with(",drive,F"));
    }

    #[test]
    fn test_command_log_header_once_across_writers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(COMMANDS_FILE);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut file = open_command_log(&path).unwrap();
                    file.write_all(b"row\n").unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let csv = fs::read_to_string(&path).unwrap();
        assert_eq!(csv.lines().filter(|l| *l == COMMANDS_HEADER).count(), 1);
        assert_eq!(csv.lines().filter(|l| *l == "row").count(), 8);
    }

    #[test]
    fn test_record_transmit_writes_both_logs() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_in(&dir);

        recorder.record_transmit(DriveCommand::SpinRightUTurn).unwrap();

        let events = read_events(&recorder);
        assert_eq!(events[0]["kind"], "tx");
        assert_eq!(events[0]["command"], "Y");
        let csv = fs::read_to_string(recorder.commands_path()).unwrap();
        assert!(csv.lines().nth(1).unwrap().ends_with(",drive,Y"));
    }

    #[test]
    fn test_session_metadata_written_once() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_in(&dir);

        recorder.write_session_metadata().unwrap();
        assert!(matches!(
            recorder.write_session_metadata(),
            Err(RoverBridgeError::Recorder(_))
        ));

        let meta: Value =
            serde_json::from_str(&fs::read_to_string(recorder.metadata_path()).unwrap()).unwrap();
        assert_eq!(meta["session"], recorder.session().id());
        assert_eq!(meta["ser_dev"], "/dev/ttyUSB0");
        assert_eq!(meta["baud"], 115200);

        let events = read_events(&recorder);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["kind"], "session_start");
        assert_eq!(events[0]["run_dir"], meta["run_dir"]);
    }

    #[test]
    fn test_finish_is_final() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_in(&dir);

        recorder.log_event(EventPayload::Heartbeat { ser_dev: "d".into(), baud: 1 }).unwrap();
        assert!(recorder.finish().unwrap());
        assert!(!recorder.finish().unwrap(), "second finish is a no-op");
        assert!(recorder.is_closed());

        assert!(!recorder
            .log_event(EventPayload::Heartbeat { ser_dev: "d".into(), baud: 1 })
            .unwrap());
        assert!(!recorder.log_command(DriveCommand::Stop).unwrap());

        let events = read_events(&recorder);
        let kinds: Vec<&str> = events.iter().map(|e| e["kind"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["heartbeat", "session_end"]);
        assert!(events[1]["final_uptime_s"].is_number());
    }

    #[test]
    fn test_tail_returns_last_bytes() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_in(&dir);

        for i in 0..100 {
            recorder.log_event(EventPayload::Tx { command: i.to_string() }).unwrap();
        }

        let tail = recorder.tail(256).unwrap();
        assert_eq!(tail.len(), 256);
        assert!(tail.ends_with("\"command\":\"99\"}\n"));

        let whole = recorder.tail(u64::MAX).unwrap();
        assert_eq!(whole, fs::read_to_string(recorder.events_path()).unwrap());
    }
}
