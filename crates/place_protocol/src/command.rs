//! Client command parsing.

use std::fmt;
use thiserror::Error;

/// Command keyword, matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    /// `PING`
    Ping,
    /// `AUTH`
    Auth,
    /// `PLACE`
    Place,
    /// `CLEAR`
    Clear,
    /// `BAN`
    Ban,
    /// `SETCOOLDOWN`
    SetCooldown,
    /// `CLEARUSER`
    ClearUser,
}

impl Keyword {
    /// Parses a keyword, ignoring ASCII case.
    pub fn parse(word: &str) -> Option<Self> {
        let keyword = match word.to_ascii_uppercase().as_str() {
            "PING" => Self::Ping,
            "AUTH" => Self::Auth,
            "PLACE" => Self::Place,
            "CLEAR" => Self::Clear,
            "BAN" => Self::Ban,
            "SETCOOLDOWN" => Self::SetCooldown,
            "CLEARUSER" => Self::ClearUser,
            _ => return None,
        };
        Some(keyword)
    }

    /// The canonical upper-case spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "PING",
            Self::Auth => "AUTH",
            Self::Place => "PLACE",
            Self::Clear => "CLEAR",
            Self::Ban => "BAN",
            Self::SetCooldown => "SETCOOLDOWN",
            Self::ClearUser => "CLEARUSER",
        }
    }

    /// Returns true for commands restricted to moderators.
    #[must_use]
    pub const fn requires_moderator(self) -> bool {
        matches!(
            self,
            Self::Clear | Self::Ban | Self::SetCooldown | Self::ClearUser
        )
    }

    /// Number of arguments, or `None` if any number is accepted.
    const fn arity(self) -> Option<usize> {
        match self {
            Self::Ping => None,
            Self::Auth | Self::Ban | Self::SetCooldown | Self::ClearUser => Some(1),
            Self::Place => Some(3),
            Self::Clear => Some(4),
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed client command.
///
/// Coordinates and colors are kept as wide signed integers; range checks
/// against the canvas happen in the server, after authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Liveness probe.
    Ping,
    /// Authenticate this connection.
    Auth {
        /// Opaque session token.
        token: String,
    },
    /// Paint one pixel.
    Place {
        /// Column.
        x: i64,
        /// Row.
        y: i64,
        /// Palette index.
        color: i64,
    },
    /// Reset an inclusive rectangle to color 0.
    Clear {
        /// Left column.
        x1: i64,
        /// Top row.
        y1: i64,
        /// Right column.
        x2: i64,
        /// Bottom row.
        y2: i64,
    },
    /// Ban a user by name.
    Ban {
        /// Target display name.
        name: String,
    },
    /// Change the process-wide placement cooldown.
    SetCooldown {
        /// New cooldown in seconds.
        seconds: u64,
    },
    /// Erase every placement of a user.
    ClearUser {
        /// Target display name.
        name: String,
    },
}

/// Why a line could not be parsed into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Blank line.
    #[error("empty command")]
    Empty,

    /// First word is not a known keyword.
    #[error("unknown command: {0}")]
    Unknown(String),

    /// Wrong number of arguments.
    #[error("{keyword} expects {expected} argument(s), got {got}")]
    Arity {
        /// The recognized keyword.
        keyword: Keyword,
        /// Required count.
        expected: usize,
        /// Supplied count.
        got: usize,
    },

    /// An argument that must be an integer is not.
    #[error("{keyword}: invalid number {value:?}")]
    InvalidNumber {
        /// The recognized keyword.
        keyword: Keyword,
        /// The offending argument.
        value: String,
    },
}

impl ParseError {
    /// The keyword, if the line started with a known one.
    ///
    /// The dispatcher uses this to check permissions before reporting a
    /// malformed command.
    #[must_use]
    pub fn keyword(&self) -> Option<Keyword> {
        match self {
            Self::Empty | Self::Unknown(_) => None,
            Self::Arity { keyword, .. } | Self::InvalidNumber { keyword, .. } => Some(*keyword),
        }
    }
}

impl Command {
    /// Parses one client line.
    ///
    /// The keyword is case-insensitive; arguments are split on any
    /// whitespace.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for blank lines, unknown keywords, wrong
    /// argument counts and non-numeric numeric arguments.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut words = line.split_whitespace();
        let word = words.next().ok_or(ParseError::Empty)?;
        let keyword = Keyword::parse(word).ok_or_else(|| ParseError::Unknown(word.to_string()))?;
        let args: Vec<&str> = words.collect();

        if let Some(expected) = keyword.arity() {
            if args.len() != expected {
                return Err(ParseError::Arity {
                    keyword,
                    expected,
                    got: args.len(),
                });
            }
        }

        let int = |value: &str| -> Result<i64, ParseError> {
            value.parse().map_err(|_| ParseError::InvalidNumber {
                keyword,
                value: value.to_string(),
            })
        };

        let command = match keyword {
            Keyword::Ping => Self::Ping,
            Keyword::Auth => Self::Auth {
                token: args[0].to_string(),
            },
            Keyword::Place => Self::Place {
                x: int(args[0])?,
                y: int(args[1])?,
                color: int(args[2])?,
            },
            Keyword::Clear => Self::Clear {
                x1: int(args[0])?,
                y1: int(args[1])?,
                x2: int(args[2])?,
                y2: int(args[3])?,
            },
            Keyword::Ban => Self::Ban {
                name: args[0].to_string(),
            },
            Keyword::SetCooldown => Self::SetCooldown {
                seconds: args[0].parse().map_err(|_| ParseError::InvalidNumber {
                    keyword,
                    value: args[0].to_string(),
                })?,
            },
            Keyword::ClearUser => Self::ClearUser {
                name: args[0].to_string(),
            },
        };
        Ok(command)
    }

    /// The keyword of this command.
    #[must_use]
    pub fn keyword(&self) -> Keyword {
        match self {
            Self::Ping => Keyword::Ping,
            Self::Auth { .. } => Keyword::Auth,
            Self::Place { .. } => Keyword::Place,
            Self::Clear { .. } => Keyword::Clear,
            Self::Ban { .. } => Keyword::Ban,
            Self::SetCooldown { .. } => Keyword::SetCooldown,
            Self::ClearUser { .. } => Keyword::ClearUser,
        }
    }
}
