//! Placement store trait definition.

use crate::error::StorageResult;
use crate::placement::Placement;

/// The append-only placement log consumed by the canvas server.
///
/// Stores keep placements in append order. "Most recent" always means
/// "appended last", which is also chronological because the server
/// serializes writes.
///
/// # Invariants
///
/// - `append` and `append_batch` never reorder or mutate earlier placements
/// - `latest_per_coordinate` returns exactly one placement per coordinate
///   that has any history, namely the last one appended
/// - `last_at` agrees with `latest_per_coordinate` for every coordinate
/// - `delete_user` removes history; the next-most-recent placement at each
///   affected coordinate becomes the latest again
/// - Stores must be `Send + Sync`; callers may use them from many worker
///   threads without external locking
///
/// # Implementors
///
/// - [`super::InMemoryPlacementStore`] - For testing
/// - [`super::FilePlacementStore`] - For persistent storage
pub trait PlacementStore: Send + Sync {
    /// Appends one placement.
    ///
    /// # Errors
    ///
    /// Returns an error if the placement cannot be persisted.
    fn append(&self, placement: &Placement) -> StorageResult<()>;

    /// Appends several placements as one write.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be persisted.
    fn append_batch(&self, placements: &[Placement]) -> StorageResult<()>;

    /// Returns the most recent placement of every coordinate with history,
    /// ordered by row then column.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn latest_per_coordinate(&self) -> StorageResult<Vec<Placement>>;

    /// Returns the most recent placement at one coordinate.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn last_at(&self, x: u16, y: u16) -> StorageResult<Option<Placement>>;

    /// Deletes every placement written by `user`.
    ///
    /// Returns the number of placements removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be rewritten.
    fn delete_user(&self, user: &str) -> StorageResult<usize>;

    /// Returns the number of placements in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn len(&self) -> StorageResult<usize>;

    /// Returns true if the log holds no placements.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}
