//! # Drive Command Alphabet
//!
//! Every byte the bridge writes to the rover is one ASCII character:
//!
//! | Code | Meaning |
//! |------|---------|
//! | `F` | Forward |
//! | `B` | Backward |
//! | `L` | Spin left |
//! | `R` | Spin right |
//! | `S` | Stop |
//! | `X` | U-turn left (forward + left) |
//! | `Y` | U-turn right (forward + right) |
//! | `0`-`9` | Speed level |
//! | `G` | Autonomous: drive straight once |
//! | `T` | Autonomous: spin 180° once |

use std::fmt;

use crate::error::{Result, RoverBridgeError};

/// A directional key the operator can hold down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectionKey {
    Forward,
    Backward,
    Left,
    Right,
}

impl DirectionKey {
    /// All directional keys, in bit order.
    pub const ALL: [DirectionKey; 4] = [
        DirectionKey::Forward,
        DirectionKey::Backward,
        DirectionKey::Left,
        DirectionKey::Right,
    ];

    /// Letter used for this key in routes and on the wire.
    pub fn code(self) -> char {
        match self {
            DirectionKey::Forward => 'F',
            DirectionKey::Backward => 'B',
            DirectionKey::Left => 'L',
            DirectionKey::Right => 'R',
        }
    }

    /// Parse a key letter (case-sensitive, matching the route table).
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'F' => Some(DirectionKey::Forward),
            'B' => Some(DirectionKey::Backward),
            'L' => Some(DirectionKey::Left),
            'R' => Some(DirectionKey::Right),
            _ => None,
        }
    }
}

/// Speed level 0-9, sent verbatim as its ASCII digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeedLevel(u8);

impl SpeedLevel {
    /// Highest selectable speed level.
    pub const MAX: u8 = 9;

    /// Create a speed level, rejecting anything above 9.
    pub fn new(level: u8) -> Option<Self> {
        (level <= Self::MAX).then_some(SpeedLevel(level))
    }

    /// Numeric level.
    pub fn get(self) -> u8 {
        self.0
    }
}

/// Category used by the tabular command log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCategory {
    Speed,
    Drive,
}

impl CommandCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandCategory::Speed => "speed",
            CommandCategory::Drive => "drive",
        }
    }
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single drive code sent to the rover.
///
/// Directional variants are produced by [`resolve`](super::resolve) from the
/// held key set. Speed levels and the one-shot autonomous triggers are issued
/// directly by an operator action and never pass through arbitration.
///
/// # Examples
///
/// ```
/// use rover_bridge::drive::{DriveCommand, SpeedLevel};
///
/// assert_eq!(DriveCommand::SpinLeftUTurn.code(), 'X');
/// assert_eq!(DriveCommand::from_code('7'), Some(DriveCommand::Speed(SpeedLevel::new(7).unwrap())));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveCommand {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    SpinLeftUTurn,
    SpinRightUTurn,
    Speed(SpeedLevel),
    DriveStraightOnce,
    Spin180Once,
}

impl DriveCommand {
    /// Wire character for this command.
    pub fn code(self) -> char {
        match self {
            DriveCommand::Forward => 'F',
            DriveCommand::Backward => 'B',
            DriveCommand::Left => 'L',
            DriveCommand::Right => 'R',
            DriveCommand::Stop => 'S',
            DriveCommand::SpinLeftUTurn => 'X',
            DriveCommand::SpinRightUTurn => 'Y',
            DriveCommand::Speed(level) => char::from(b'0' + level.get()),
            DriveCommand::DriveStraightOnce => 'G',
            DriveCommand::Spin180Once => 'T',
        }
    }

    /// Parse a wire character back into a command.
    pub fn from_code(code: char) -> Option<Self> {
        let cmd = match code {
            'F' => DriveCommand::Forward,
            'B' => DriveCommand::Backward,
            'L' => DriveCommand::Left,
            'R' => DriveCommand::Right,
            'S' => DriveCommand::Stop,
            'X' => DriveCommand::SpinLeftUTurn,
            'Y' => DriveCommand::SpinRightUTurn,
            'G' => DriveCommand::DriveStraightOnce,
            'T' => DriveCommand::Spin180Once,
            '0'..='9' => DriveCommand::Speed(SpeedLevel(code as u8 - b'0')),
            _ => return None,
        };
        Some(cmd)
    }

    /// Encode as the single byte written to the serial port.
    pub fn to_byte(self) -> Result<u8> {
        let code = self.code();
        if code.is_ascii() {
            Ok(code as u8)
        } else {
            Err(RoverBridgeError::InvalidCommand(code))
        }
    }

    /// Speed for digits, drive for everything else.
    pub fn category(self) -> CommandCategory {
        match self {
            DriveCommand::Speed(_) => CommandCategory::Speed,
            _ => CommandCategory::Drive,
        }
    }
}

impl fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// An operator action decoded from a single-character route (`/F`, `/7`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorAction {
    /// Browser-arbitrated direction: the operator now holds exactly this key.
    Hold(DirectionKey),
    /// Explicit stop / release-all.
    Stop,
    /// A U-turn code the browser already resolved (X/Y).
    Direct(DriveCommand),
    /// Speed selection, bypasses arbitration.
    Speed(SpeedLevel),
    /// One-shot autonomous trigger (G/T), bypasses arbitration.
    Autonomous(DriveCommand),
}

impl OperatorAction {
    /// Decode a route segment such as `"F"` or `"7"`.
    ///
    /// Returns `None` for anything that is not exactly one known character.
    pub fn from_route(segment: &str) -> Option<Self> {
        let mut chars = segment.chars();
        let code = chars.next()?;
        if chars.next().is_some() {
            return None;
        }

        if let Some(key) = DirectionKey::from_code(code) {
            return Some(OperatorAction::Hold(key));
        }

        match DriveCommand::from_code(code)? {
            DriveCommand::Stop => Some(OperatorAction::Stop),
            cmd @ (DriveCommand::SpinLeftUTurn | DriveCommand::SpinRightUTurn) => {
                Some(OperatorAction::Direct(cmd))
            }
            DriveCommand::Speed(level) => Some(OperatorAction::Speed(level)),
            cmd @ (DriveCommand::DriveStraightOnce | DriveCommand::Spin180Once) => {
                Some(OperatorAction::Autonomous(cmd))
            }
            _ => None,
        }
    }
}
