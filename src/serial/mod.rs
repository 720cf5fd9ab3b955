//! # Serial Communication Module
//!
//! Owns the full-duplex serial link to the rover's motor controller.
//!
//! This module handles:
//! - Opening the serial port (8N1, no flow control)
//! - Transmitting single-byte drive codes, fire-and-forget
//! - Serializing concurrent writers so command bytes never interleave
//! - Reading newline-terminated telemetry lines with a bounded timeout

pub mod framer;
pub mod port_trait;

use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::sync::Mutex;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::drive::DriveCommand;
use crate::error::{Result, RoverBridgeError};

pub use framer::LineFramer;
pub use port_trait::{SerialPortIO, TokioSerialPort};

/// Boxed read half of the serial link
pub type SerialReader = Box<dyn AsyncRead + Send + Unpin>;

/// Rover Serial Channel
///
/// One writer lock and one reader lock: transmits from concurrent HTTP
/// handlers queue on the writer, while the telemetry task is the only
/// practical reader.
pub struct SerialChannel {
    writer: Mutex<Box<dyn SerialPortIO>>,
    reader: Mutex<LineFramer<SerialReader>>,
    device_path: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("device_path", &self.device_path)
            .field("baud_rate", &self.baud_rate)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl SerialChannel {
    /// Open the configured serial device
    ///
    /// # Arguments
    ///
    /// * `config` - Serial port settings (device path, baud rate, read timeout)
    ///
    /// # Errors
    ///
    /// Returns [`RoverBridgeError::SerialPortNotFound`] if the device cannot be
    /// opened. Nothing can be driven without it, so callers treat this as fatal.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_bridge::config::SerialConfig;
    /// use rover_bridge::serial::SerialChannel;
    ///
    /// let channel = SerialChannel::open(&SerialConfig::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(config: &SerialConfig) -> Result<Self> {
        debug!("Trying to open serial port: {}", config.port);

        let port = Self::open_port(&config.port, config.baud_rate)?;
        info!("Opened rover serial device at {} ({} baud)", config.port, config.baud_rate);

        let (read_half, write_half) = tokio::io::split(port);
        Ok(Self::from_parts(
            Box::new(TokioSerialPort::new(write_half)),
            Box::new(read_half),
            config.port.clone(),
            config.baud_rate,
            Duration::from_millis(config.read_timeout_ms),
        ))
    }

    /// Build a channel over arbitrary I/O halves
    pub fn from_parts(
        writer: Box<dyn SerialPortIO>,
        reader: SerialReader,
        device_path: String,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Self {
        Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(LineFramer::new(reader)),
            device_path,
            baud_rate,
            read_timeout,
        }
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| RoverBridgeError::SerialPortNotFound(format!("{}: {}", path, e)))
    }

    /// Send one drive code to the rover
    ///
    /// Returns once the byte has been handed to the OS. The rover never
    /// acknowledges, and a failed write is not retried.
    ///
    /// # Errors
    ///
    /// Returns [`RoverBridgeError::Serial`] if the write or flush fails.
    pub async fn transmit(&self, command: DriveCommand) -> Result<()> {
        let byte = command.to_byte()?;

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&[byte])
            .await
            .map_err(|e| RoverBridgeError::Serial(format!("Failed to write command {}: {}", command, e)))?;
        writer
            .flush()
            .await
            .map_err(|e| RoverBridgeError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!(command = %command, "Sent drive command");
        Ok(())
    }

    /// Receive one telemetry line
    ///
    /// Waits at most the configured read timeout.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(line))` - a complete line (lossily decoded, trimmed)
    /// * `Ok(None)` - nothing arrived before the timeout, or the link hit EOF
    pub async fn receive_line(&self) -> Result<Option<String>> {
        let mut reader = self.reader.lock().await;
        match tokio::time::timeout(self.read_timeout, reader.next_line()).await {
            Ok(Ok(line)) => Ok(line),
            Ok(Err(e)) => {
                warn!("Serial read failed: {}", e);
                Err(RoverBridgeError::Serial(format!("Failed to read line: {}", e)))
            }
            Err(_elapsed) => Ok(None),
        }
    }

    /// Device path of the opened port (e.g. `/dev/ttyUSB0`)
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}
