//! # Intent Arbiter
//!
//! Resolves the set of directional keys the operator is holding into exactly
//! one [`DriveCommand`].
//!
//! ## Priority Table
//!
//! Rows are evaluated top to bottom; the first match wins.
//!
//! | Forward | Backward | Left | Right | Result |
//! |---------|----------|------|-------|--------|
//! | no | yes | any | any | Backward |
//! | yes | any | yes | no | U-turn left (`X`) |
//! | yes | any | no | yes | U-turn right (`Y`) |
//! | yes | any | no | no | Forward |
//! | no | no | yes | no | Left |
//! | no | no | no | yes | Right |
//! | no | no | yes | yes | Stop |
//! | yes | any | yes | yes | Forward |
//! | no | no | no | no | Stop |
//!
//! Backward held without Forward suppresses any turn key. There is no
//! combined reverse-turn code.
//!
//! Every press or release edge produces one resolved command. Edges are never
//! coalesced: the rover relies on seeing an explicit `S` when keys come up.

use super::command::{DirectionKey, DriveCommand};

/// Set of directional keys currently held.
///
/// Stored as a 4-bit mask; a key is either present or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PressedKeySet(u8);

impl PressedKeySet {
    /// Empty set (implies Stop).
    pub const fn new() -> Self {
        PressedKeySet(0)
    }

    fn bit(key: DirectionKey) -> u8 {
        match key {
            DirectionKey::Forward => 0b0001,
            DirectionKey::Backward => 0b0010,
            DirectionKey::Left => 0b0100,
            DirectionKey::Right => 0b1000,
        }
    }

    /// Add a key. Returns `true` if it was not already held.
    pub fn insert(&mut self, key: DirectionKey) -> bool {
        let was_held = self.contains(key);
        self.0 |= Self::bit(key);
        !was_held
    }

    /// Remove a key. Returns `true` if it was held.
    pub fn remove(&mut self, key: DirectionKey) -> bool {
        let was_held = self.contains(key);
        self.0 &= !Self::bit(key);
        was_held
    }

    pub fn contains(&self, key: DirectionKey) -> bool {
        self.0 & Self::bit(key) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Number of held keys.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Held keys in F, B, L, R order.
    pub fn iter(&self) -> impl Iterator<Item = DirectionKey> + '_ {
        DirectionKey::ALL.into_iter().filter(move |key| self.contains(*key))
    }

    /// All 16 possible key sets.
    pub fn all() -> impl Iterator<Item = PressedKeySet> {
        (0u8..16).map(PressedKeySet)
    }
}

impl FromIterator<DirectionKey> for PressedKeySet {
    fn from_iter<I: IntoIterator<Item = DirectionKey>>(iter: I) -> Self {
        let mut set = PressedKeySet::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

/// Resolve a held key set into one drive command.
///
/// Pure function: the same set always yields the same command.
///
/// # Examples
///
/// ```
/// use rover_bridge::drive::{resolve, DirectionKey, DriveCommand, PressedKeySet};
///
/// let held: PressedKeySet = [DirectionKey::Forward, DirectionKey::Left].into_iter().collect();
/// assert_eq!(resolve(held), DriveCommand::SpinLeftUTurn);
/// assert_eq!(resolve(PressedKeySet::new()), DriveCommand::Stop);
/// ```
pub fn resolve(pressed: PressedKeySet) -> DriveCommand {
    let f = pressed.contains(DirectionKey::Forward);
    let b = pressed.contains(DirectionKey::Backward);
    let l = pressed.contains(DirectionKey::Left);
    let r = pressed.contains(DirectionKey::Right);

    if !f && b {
        DriveCommand::Backward
    } else if f && l && !r {
        DriveCommand::SpinLeftUTurn
    } else if f && r && !l {
        DriveCommand::SpinRightUTurn
    } else if f && !l && !r {
        DriveCommand::Forward
    } else if !f && l && !r {
        DriveCommand::Left
    } else if !f && r && !l {
        DriveCommand::Right
    } else if !f && l && r {
        DriveCommand::Stop
    } else if f && l && r {
        DriveCommand::Forward
    } else {
        DriveCommand::Stop
    }
}

/// Stateful arbiter owning the operator's held key set.
///
/// Each edge method mutates the set and returns the freshly resolved command,
/// which the caller must transmit.
#[derive(Debug, Default)]
pub struct IntentArbiter {
    pressed: PressedKeySet,
}

impl IntentArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Press edge.
    pub fn press(&mut self, key: DirectionKey) -> DriveCommand {
        self.pressed.insert(key);
        resolve(self.pressed)
    }

    /// Release edge.
    pub fn release(&mut self, key: DirectionKey) -> DriveCommand {
        self.pressed.remove(key);
        resolve(self.pressed)
    }

    /// Drop every held key. Always resolves to Stop.
    pub fn release_all(&mut self) -> DriveCommand {
        self.pressed.clear();
        resolve(self.pressed)
    }

    /// Replace the held set with a single key.
    ///
    /// Used by the single-letter routes, where the browser has already
    /// arbitrated its own key set and sends only the outcome.
    pub fn hold_only(&mut self, key: DirectionKey) -> DriveCommand {
        self.pressed.clear();
        self.pressed.insert(key);
        resolve(self.pressed)
    }

    /// Currently held keys.
    pub fn pressed(&self) -> PressedKeySet {
        self.pressed
    }
}
