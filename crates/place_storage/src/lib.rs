//! # Pixelplace Storage
//!
//! Backends for the two external collaborators of the canvas server: the
//! append-only placement log and the user directory.
//!
//! The canvas server only talks to the [`PlacementStore`] and
//! [`UserDirectory`] traits. This crate ships reference implementations:
//!
//! - [`InMemoryPlacementStore`] - For testing and ephemeral canvases
//! - [`FilePlacementStore`] - CRC-framed append-only log on disk
//! - [`LocalDirectory`] - User records in memory, optionally persisted as JSON
//!
//! ## Example
//!
//! ```rust
//! use place_storage::{InMemoryPlacementStore, Placement, PlacementStore};
//!
//! let store = InMemoryPlacementStore::new();
//! store.append(&Placement::new("alice", 5, 5, 3)).unwrap();
//! store.append(&Placement::new("bob", 5, 5, 7)).unwrap();
//!
//! let last = store.last_at(5, 5).unwrap().unwrap();
//! assert_eq!(last.user, "bob");
//! assert_eq!(last.color, 7);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod error;
mod file;
mod index;
mod memory;
mod placement;
mod record;
mod store;

pub use directory::{LocalDirectory, Role, UserDirectory, UserId, UserRecord};
pub use error::{StorageError, StorageResult};
pub use file::{verify_log, FilePlacementStore, LogReport, LOCK_FILE, LOG_FILE};
pub use memory::InMemoryPlacementStore;
pub use placement::{now_seconds, Placement};
pub use record::{compute_crc32, decode_record, encode_record, RecordRead};
pub use store::PlacementStore;
