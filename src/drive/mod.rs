//! # Drive Module
//!
//! Operator intent to single-character drive codes.
//!
//! This module handles:
//! - The drive code alphabet sent to the rover (F/B/L/R/S/X/Y, 0-9, G/T)
//! - Tracking which directional keys the operator is holding
//! - Arbitrating a held key set into exactly one drive code
//! - Classifying inbound route segments into operator actions

pub mod arbiter;
pub mod command;

pub use arbiter::{resolve, IntentArbiter, PressedKeySet};
pub use command::{CommandCategory, DirectionKey, DriveCommand, OperatorAction, SpeedLevel};
