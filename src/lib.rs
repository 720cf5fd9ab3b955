//! # Rover Bridge Library
//!
//! Drive a serial-connected rover from a browser and record every session.
//!
//! This library provides the core of the bridge: arbitrating held direction
//! keys into single-character drive codes, the serial command/telemetry
//! channel, distance telemetry ingest, and the append-only session recorder.

pub mod bridge;
pub mod config;
pub mod drive;
pub mod error;
pub mod http;
pub mod recorder;
pub mod serial;
pub mod telemetry;
