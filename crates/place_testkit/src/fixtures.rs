//! Test fixtures.
//!
//! Seeded users, temporary placement logs and deterministic placement
//! sequences.

use place_protocol::CanvasSpec;
use place_storage::{FilePlacementStore, LocalDirectory, Placement, Role};
use std::path::Path;
use tempfile::TempDir;

/// Secret used to sign tokens in tests.
pub const TEST_SECRET: &[u8] = b"place-testkit-secret-0123456789";

/// A small canvas that keeps snapshots readable in assertions.
pub const SMALL_CANVAS: CanvasSpec = CanvasSpec::new(16, 16, 8);

/// Names seeded by [`test_directory`], with their roles.
///
/// Ids are assigned in this order starting at 1.
pub const TEST_USERS: [(&str, Role); 4] = [
    ("alice", Role::User),
    ("bob", Role::User),
    ("mod", Role::Moderator),
    ("admin", Role::Admin),
];

/// An in-memory directory holding [`TEST_USERS`].
pub fn test_directory() -> LocalDirectory {
    let directory = LocalDirectory::in_memory();
    for (name, role) in TEST_USERS {
        directory
            .add_user(name, role)
            .expect("Failed to seed test user");
    }
    directory
}

/// A file-backed placement log in a temporary directory.
pub struct TempCanvas {
    store: FilePlacementStore,
    dir: TempDir,
}

impl TempCanvas {
    /// Creates an empty log. Appends are not synced to keep tests fast.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store = FilePlacementStore::open_with_sync(dir.path(), false)
            .expect("Failed to open placement log");
        Self { store, dir }
    }

    /// The open store.
    pub fn store(&self) -> &FilePlacementStore {
        &self.store
    }

    /// The log directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Closes the store and opens the same directory again.
    pub fn reopen(self) -> Self {
        let Self { store, dir } = self;
        drop(store);
        let store = FilePlacementStore::open_with_sync(dir.path(), false)
            .expect("Failed to reopen placement log");
        Self { store, dir }
    }
}

impl Default for TempCanvas {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a temporary placement log.
pub fn with_temp_canvas<F, R>(f: F) -> R
where
    F: FnOnce(&FilePlacementStore) -> R,
{
    let canvas = TempCanvas::new();
    f(canvas.store())
}

/// `count` placements spread over `spec`, cycling through users and colors.
///
/// Timestamps start at 1.0 and increase by one per placement.
pub fn sample_placements(spec: CanvasSpec, users: &[&str], count: usize) -> Vec<Placement> {
    let width = usize::from(spec.width);
    let height = usize::from(spec.height);
    (0..count)
        .map(|i| {
            // Stride so consecutive placements land on different rows
            let cell = (i * 7) % (width * height);
            let user = if users.is_empty() { "" } else { users[i % users.len()] };
            Placement::at(
                (i + 1) as f64,
                user,
                (cell % width) as u16,
                (cell / width) as u16,
                (i % usize::from(spec.palette_size.max(1))) as u8,
            )
        })
        .collect()
}
