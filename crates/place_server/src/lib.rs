//! # Place Server
//!
//! Realtime collaborative pixel canvas over WebSocket.
//!
//! This crate provides:
//! - The canvas cache, rebuilt lazily from the placement log
//! - The session registry with per-user shared state
//! - The command dispatcher (auth, placement, moderation)
//! - The per-connection loop and the accepting server
//! - HMAC-SHA256 session tokens
//!
//! # Protocol
//!
//! On connect the server sends one binary frame with the color of every
//! pixel (row-major), then a `USERS` text line naming the last painter of
//! every pixel. Clients then send single-line text commands:
//!
//! ```text
//! PING
//! AUTH <token>
//! PLACE <x> <y> <color>
//! CLEAR <x1> <y1> <x2> <y2>      (moderators)
//! BAN <name>                     (moderators)
//! SETCOOLDOWN <seconds>          (moderators)
//! CLEARUSER <name>               (moderators)
//! ```
//!
//! Accepted placements and clears are broadcast to every connection.
//!
//! # Blocking work
//!
//! Storage and token checks run on a bounded blocking pool so a slow disk
//! never stalls the connection tasks.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod canvas;
mod config;
mod connection;
mod error;
mod handler;
mod registry;
mod server;
mod worker;

pub use auth::{AuthConfig, Authenticator, TokenValidator};
pub use canvas::{CanvasCache, CanvasSnapshot};
pub use config::{RepeatPolicy, ServerConfig};
pub use connection::{serve_connection, DuplicateFilter};
pub use error::{ServerError, ServerResult};
pub use handler::{CommandDispatcher, HandlerContext};
pub use registry::{ConnectionId, Outbound, SessionRegistry};
pub use server::PlaceServer;
pub use worker::WorkerPool;
