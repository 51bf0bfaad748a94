//! The placement fact.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in fractional seconds since the Unix epoch.
pub fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// One immutable pixel event.
///
/// `user` is the painter's display name, or the empty string for system
/// writes such as rectangle clears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Wall time of the placement, in seconds since the Unix epoch.
    pub timestamp: f64,
    /// Display name of the painter (empty for clears).
    pub user: String,
    /// Column.
    pub x: u16,
    /// Row.
    pub y: u16,
    /// Palette index.
    pub color: u8,
}

impl Placement {
    /// Creates a placement stamped with the current time.
    pub fn new(user: impl Into<String>, x: u16, y: u16, color: u8) -> Self {
        Self::at(now_seconds(), user, x, y, color)
    }

    /// Creates a placement with an explicit timestamp.
    pub fn at(timestamp: f64, user: impl Into<String>, x: u16, y: u16, color: u8) -> Self {
        Self {
            timestamp,
            user: user.into(),
            x,
            y,
            color,
        }
    }

    /// Returns the `(x, y)` coordinate.
    #[must_use]
    pub fn coordinate(&self) -> (u16, u16) {
        (self.x, self.y)
    }

    /// Returns true if this placement was written by the system rather than a user.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.user.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stamps_current_time() {
        let before = now_seconds();
        let p = Placement::new("alice", 1, 2, 3);
        assert!(p.timestamp >= before);
        assert_eq!(p.coordinate(), (1, 2));
        assert!(!p.is_system());
    }

    #[test]
    fn clear_placement_is_system() {
        let p = Placement::at(10.0, "", 0, 0, 0);
        assert!(p.is_system());
    }
}
