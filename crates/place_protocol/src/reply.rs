//! Server reply formatting.

use std::fmt;

/// A single-line message from server to client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Answer to `PING`.
    Pong,
    /// `AUTH` succeeded.
    AuthenticationSuccess,
    /// `AUTH` on an authenticated connection.
    AlreadyAuthenticated,
    /// The token did not resolve to a user.
    AuthenticationFailed,
    /// Not permitted: wrong state, missing privilege, banned, cooling down
    /// or a no-op placement.
    Forbidden,
    /// Malformed or out-of-range command.
    Invalid,
    /// The server failed to carry out a valid command.
    Error,
    /// The receiving user has been banned.
    Banned,
    /// The receiving user may place again at this Unix time in milliseconds.
    Cooldown {
        /// End of the cooldown window.
        until_ms: u64,
    },
    /// A pixel was placed.
    Place {
        /// Painter display name.
        user: String,
        /// Column.
        x: u16,
        /// Row.
        y: u16,
        /// Palette index.
        color: u8,
    },
    /// A rectangle was cleared.
    Clear {
        /// Left column.
        x1: u16,
        /// Top row.
        y1: u16,
        /// Right column.
        x2: u16,
        /// Bottom row.
        y2: u16,
    },
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pong => f.write_str("PONG"),
            Self::AuthenticationSuccess => f.write_str("AUTHENTICATION SUCCESS"),
            Self::AlreadyAuthenticated => f.write_str("ALREADY AUTHENTICATED"),
            Self::AuthenticationFailed => f.write_str("AUTHENTICATION FAILED"),
            Self::Forbidden => f.write_str("FORBIDDEN"),
            Self::Invalid => f.write_str("INVALID"),
            Self::Error => f.write_str("ERROR"),
            Self::Banned => f.write_str("BANNED"),
            Self::Cooldown { until_ms } => write!(f, "COOLDOWN {until_ms}"),
            Self::Place { user, x, y, color } => write!(f, "PLACE {user} {x} {y} {color}"),
            Self::Clear { x1, y1, x2, y2 } => write!(f, "CLEAR {x1} {y1} {x2} {y2}"),
        }
    }
}

/// Builds the `USERS` frame sent after the color frame of a snapshot.
///
/// Painter names are joined with single spaces in linear index order;
/// unpainted pixels contribute an empty name.
pub fn users_line<S: AsRef<str>>(painters: &[S]) -> String {
    let body_len: usize = painters.iter().map(|p| p.as_ref().len() + 1).sum();
    let mut line = String::with_capacity(6 + body_len);
    line.push_str("USERS ");
    for (i, painter) in painters.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(painter.as_ref());
    }
    line
}
