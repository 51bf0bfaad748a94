//! # Pixelplace Protocol
//!
//! Wire protocol types for the pixelplace canvas server.
//!
//! This crate provides:
//! - [`CanvasSpec`] and [`Rect`] for canvas geometry and bounds checks
//! - [`Command`] parsing of client lines (`PLACE 5 5 3`, `AUTH <token>`, ...)
//! - [`Reply`] formatting of server lines (`PONG`, `CLEAR 0 0 9 9`, ...)
//! - [`users_line`] for the painter frame of the initial snapshot
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ```rust
//! use place_protocol::{Command, Reply};
//!
//! let command = Command::parse("place 5 5 3").unwrap();
//! assert_eq!(command, Command::Place { x: 5, y: 5, color: 3 });
//!
//! let reply = Reply::Place { user: "alice".into(), x: 5, y: 5, color: 3 };
//! assert_eq!(reply.to_string(), "PLACE alice 5 5 3");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod canvas;
mod command;
mod reply;

pub use canvas::{CanvasSpec, Rect};
pub use command::{Command, Keyword, ParseError};
pub use reply::{users_line, Reply};
