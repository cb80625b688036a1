//! Rising-edge detection for button levels
//!
//! The firmware's snapshot records report levels, not presses: a held
//! button reads 1 on every record. Actions must fire once per press, so the
//! router keeps the last observed level per button and fires only on a
//! 0 to 1 transition. This also suppresses re-fires on sustained-high noise.

use std::collections::HashMap;

/// Per-button last-observed levels with rising-edge detection
///
/// Unknown ids start at level 0, so the very first observation of a high
/// level fires. State lives for the whole process; it is only reset by
/// restarting.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    levels: HashMap<u8, bool>,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a level observation; true when this is a rising edge
    ///
    /// The stored level is always updated, whether or not the edge fired.
    pub fn observe(&mut self, id: u8, level: bool) -> bool {
        let prev = self.levels.insert(id, level).unwrap_or(false);
        level && !prev
    }

    /// Last observed level for a button (0 if never observed)
    pub fn level(&self, id: u8) -> bool {
        self.levels.get(&id).copied().unwrap_or(false)
    }
}
