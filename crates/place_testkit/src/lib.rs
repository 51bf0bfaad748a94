//! # Place Testkit
//!
//! Test utilities for the pixel canvas workspace.
//!
//! This crate provides:
//! - Fixtures: a seeded user directory and temporary placement logs
//! - Property-based generators for placements and command lines
//! - A naive reference canvas to check cached snapshots against
//!
//! ## Usage
//!
//! ```rust,ignore
//! use place_testkit::prelude::*;
//!
//! #[test]
//! fn log_survives_reopen() {
//!     let canvas = TempCanvas::new();
//!     canvas.store().append(&Placement::at(1.0, "alice", 1, 1, 3)).unwrap();
//!     let canvas = canvas.reopen();
//!     assert_eq!(canvas.store().len().unwrap(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod model;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
