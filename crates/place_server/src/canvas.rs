//! Cached view of the current canvas.
//!
//! The cache derives the color and last painter of every pixel from the
//! placement store and keeps the result until the next accepted write.
//! A single mutex guards the cached snapshot: rebuilds happen under it so
//! concurrent readers of a cold cache wait for one rebuild instead of
//! racing, and writes hold it across append and invalidation so a reader
//! never caches a view older than an acknowledged write.
//!
//! Every method here blocks on storage and is meant to be called through
//! [`WorkerPool::run`](crate::WorkerPool::run).

use crate::error::ServerResult;
use parking_lot::Mutex;
use place_protocol::{users_line, CanvasSpec, Rect};
use place_storage::{now_seconds, Placement, PlacementStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// The current color and painter of every pixel.
#[derive(Debug)]
pub struct CanvasSnapshot {
    spec: CanvasSpec,
    colors: Arc<[u8]>,
    painters: Vec<String>,
    users_line: Arc<str>,
}

impl CanvasSnapshot {
    /// Builds a snapshot from the latest placement of each coordinate.
    ///
    /// Placements outside the canvas are skipped.
    pub fn from_latest(spec: CanvasSpec, latest: &[Placement]) -> Self {
        let mut colors = vec![0u8; spec.pixel_count()];
        let mut painters = vec![String::new(); spec.pixel_count()];

        for placement in latest {
            let Some(index) = spec.index(placement.x, placement.y) else {
                debug!(
                    x = placement.x,
                    y = placement.y,
                    "skipping placement outside the canvas"
                );
                continue;
            };
            colors[index] = placement.color;
            painters[index].clone_from(&placement.user);
        }

        let users_line = users_line(&painters).into();
        Self {
            spec,
            colors: colors.into(),
            painters,
            users_line,
        }
    }

    /// Canvas geometry.
    pub fn spec(&self) -> CanvasSpec {
        self.spec
    }

    /// Colors in linear index order; this is the binary snapshot frame.
    pub fn colors(&self) -> &Arc<[u8]> {
        &self.colors
    }

    /// Painter names in linear index order.
    pub fn painters(&self) -> &[String] {
        &self.painters
    }

    /// The pre-rendered `USERS ...` frame.
    pub fn users_line(&self) -> &Arc<str> {
        &self.users_line
    }

    /// Color at `(x, y)`.
    pub fn color_at(&self, x: u16, y: u16) -> Option<u8> {
        self.spec.index(x, y).map(|i| self.colors[i])
    }

    /// Painter at `(x, y)`; empty for unpainted or cleared pixels.
    pub fn painter_at(&self, x: u16, y: u16) -> Option<&str> {
        self.spec.index(x, y).map(|i| self.painters[i].as_str())
    }
}

/// Lazily rebuilt canvas over a [`PlacementStore`].
pub struct CanvasCache {
    spec: CanvasSpec,
    store: Arc<dyn PlacementStore>,
    snapshot: Mutex<Option<Arc<CanvasSnapshot>>>,
    rebuilds: AtomicU64,
}

impl CanvasCache {
    /// Creates a cold cache.
    pub fn new(spec: CanvasSpec, store: Arc<dyn PlacementStore>) -> Self {
        Self {
            spec,
            store,
            snapshot: Mutex::new(None),
            rebuilds: AtomicU64::new(0),
        }
    }

    /// Canvas geometry.
    pub fn spec(&self) -> CanvasSpec {
        self.spec
    }

    /// The underlying placement store.
    pub fn store(&self) -> &Arc<dyn PlacementStore> {
        &self.store
    }

    /// Returns the current snapshot, rebuilding it if the cache is cold.
    ///
    /// Callers arriving during a rebuild wait for it and share its result.
    ///
    /// # Errors
    ///
    /// Returns the store error if the rebuild fails; the cache stays cold.
    pub fn snapshot(&self) -> ServerResult<Arc<CanvasSnapshot>> {
        self.with_snapshot(Arc::clone)
    }

    /// Runs `f` on the current snapshot while holding the cache lock.
    ///
    /// No write can land between the snapshot being taken and `f`
    /// returning, so anything `f` publishes is ordered before the
    /// broadcasts of later writes.
    ///
    /// # Errors
    ///
    /// Returns the store error if the rebuild fails; `f` is not called.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&Arc<CanvasSnapshot>) -> R) -> ServerResult<R> {
        let mut cached = self.snapshot.lock();
        if let Some(snapshot) = cached.as_ref() {
            return Ok(f(snapshot));
        }

        let latest = self.store.latest_per_coordinate()?;
        let snapshot = Arc::new(CanvasSnapshot::from_latest(self.spec, &latest));
        let pass = self.rebuilds.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(pixels = latest.len(), pass, "rebuilt canvas snapshot");

        Ok(f(&*cached.insert(snapshot)))
    }

    /// Discards the cached snapshot.
    pub fn invalidate(&self) {
        self.snapshot.lock().take();
    }

    /// Returns true if no snapshot is cached.
    pub fn is_cold(&self) -> bool {
        self.snapshot.lock().is_none()
    }

    /// Number of rebuilds performed so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    /// The most recent placement at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub fn last_pixel(&self, x: u16, y: u16) -> ServerResult<Option<Placement>> {
        Ok(self.store.last_at(x, y)?)
    }

    /// Appends one placement stamped now and invalidates the cache.
    ///
    /// # Errors
    ///
    /// Returns the store error; the cache is invalidated either way.
    pub fn place(&self, user: &str, x: u16, y: u16, color: u8) -> ServerResult<Placement> {
        let placement = Placement::new(user, x, y, color);
        let mut cached = self.snapshot.lock();
        cached.take();
        self.store.append(&placement)?;
        Ok(placement)
    }

    /// Resets every pixel of `rect` to color 0 with no painter.
    ///
    /// All cells share one timestamp and are appended as one batch.
    /// Returns the number of cells written.
    ///
    /// # Errors
    ///
    /// Returns the store error; the cache is invalidated either way.
    pub fn clear_rect(&self, rect: Rect) -> ServerResult<usize> {
        let timestamp = now_seconds();
        let batch: Vec<Placement> = rect
            .cells()
            .map(|(x, y)| Placement::at(timestamp, "", x, y, 0))
            .collect();

        let mut cached = self.snapshot.lock();
        cached.take();
        self.store.append_batch(&batch)?;
        info!(
            x1 = rect.x1,
            y1 = rect.y1,
            x2 = rect.x2,
            y2 = rect.y2,
            cells = batch.len(),
            "cleared rectangle"
        );
        Ok(batch.len())
    }

    /// Deletes every placement painted by `name`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns the store error; the cache is invalidated either way.
    pub fn clear_user(&self, name: &str) -> ServerResult<usize> {
        let mut cached = self.snapshot.lock();
        cached.take();
        let removed = self.store.delete_user(name)?;
        info!(user = name, removed, "cleared user placements");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use place_storage::{InMemoryPlacementStore, StorageResult};
    use std::sync::atomic::AtomicBool;
    use std::sync::Barrier;
    use std::time::Duration;

    const SPEC: CanvasSpec = CanvasSpec::new(10, 10, 16);

    fn cache_with(placements: Vec<Placement>) -> CanvasCache {
        CanvasCache::new(
            SPEC,
            Arc::new(InMemoryPlacementStore::with_placements(placements)),
        )
    }

    #[test]
    fn empty_canvas_defaults() {
        let cache = cache_with(Vec::new());
        assert!(cache.is_cold());

        let snapshot = cache.snapshot().unwrap();
        assert_eq!(snapshot.colors().len(), 100);
        assert!(snapshot.colors().iter().all(|&c| c == 0));
        assert!(snapshot.painters().iter().all(String::is_empty));
        assert_eq!(snapshot.users_line().len(), "USERS ".len() + 99);
        assert!(!cache.is_cold());
    }

    #[test]
    fn latest_placement_wins() {
        let cache = cache_with(vec![
            Placement::at(1.0, "alice", 5, 5, 3),
            Placement::at(2.0, "bob", 5, 5, 7),
            Placement::at(3.0, "alice", 1, 0, 2),
        ]);

        let snapshot = cache.snapshot().unwrap();
        assert_eq!(snapshot.color_at(5, 5), Some(7));
        assert_eq!(snapshot.painter_at(5, 5), Some("bob"));
        assert_eq!(snapshot.colors()[1], 2);
        assert!(snapshot.users_line().starts_with("USERS  alice "));
    }

    #[test]
    fn out_of_range_rows_are_skipped() {
        let cache = cache_with(vec![
            Placement::at(1.0, "alice", 50, 50, 3),
            Placement::at(1.0, "alice", 2, 2, 4),
        ]);
        let snapshot = cache.snapshot().unwrap();
        assert_eq!(snapshot.color_at(2, 2), Some(4));
        assert_eq!(snapshot.colors().iter().filter(|&&c| c != 0).count(), 1);
    }

    #[test]
    fn snapshot_is_cached_until_write() {
        let cache = cache_with(Vec::new());
        cache.snapshot().unwrap();
        cache.snapshot().unwrap();
        assert_eq!(cache.rebuild_count(), 1);

        cache.place("alice", 5, 5, 3).unwrap();
        assert!(cache.is_cold());

        let snapshot = cache.snapshot().unwrap();
        assert_eq!(snapshot.color_at(5, 5), Some(3));
        assert_eq!(cache.rebuild_count(), 2);
    }

    #[test]
    fn clear_rect_then_snapshot() {
        let cache = cache_with(Vec::new());
        cache.place("alice", 5, 5, 3).unwrap();
        assert_eq!(cache.snapshot().unwrap().color_at(5, 5), Some(3));

        let rect = SPEC.checked_rect(0, 0, 9, 9).unwrap();
        assert_eq!(cache.clear_rect(rect).unwrap(), 100);

        let snapshot = cache.snapshot().unwrap();
        assert_eq!(snapshot.color_at(5, 5), Some(0));
        assert_eq!(snapshot.painter_at(5, 5), Some(""));
        assert_eq!(cache.store().len().unwrap(), 101);

        let cleared = cache.last_pixel(5, 5).unwrap().unwrap();
        assert!(cleared.is_system());
    }

    #[test]
    fn clear_user_falls_back_to_previous_placement() {
        let cache = cache_with(vec![
            Placement::at(1.0, "bob", 3, 3, 2),
            Placement::at(2.0, "mallory", 3, 3, 9),
            Placement::at(3.0, "mallory", 4, 4, 9),
        ]);
        assert_eq!(cache.snapshot().unwrap().color_at(3, 3), Some(9));

        assert_eq!(cache.clear_user("mallory").unwrap(), 2);
        let snapshot = cache.snapshot().unwrap();
        assert_eq!(snapshot.color_at(3, 3), Some(2));
        assert_eq!(snapshot.painter_at(3, 3), Some("bob"));
        assert_eq!(snapshot.color_at(4, 4), Some(0));
        assert_eq!(snapshot.painter_at(4, 4), Some(""));
    }

    struct SlowStore {
        inner: InMemoryPlacementStore,
    }

    impl PlacementStore for SlowStore {
        fn append(&self, placement: &Placement) -> StorageResult<()> {
            self.inner.append(placement)
        }

        fn append_batch(&self, placements: &[Placement]) -> StorageResult<()> {
            self.inner.append_batch(placements)
        }

        fn latest_per_coordinate(&self) -> StorageResult<Vec<Placement>> {
            std::thread::sleep(Duration::from_millis(50));
            self.inner.latest_per_coordinate()
        }

        fn last_at(&self, x: u16, y: u16) -> StorageResult<Option<Placement>> {
            self.inner.last_at(x, y)
        }

        fn delete_user(&self, user: &str) -> StorageResult<usize> {
            self.inner.delete_user(user)
        }

        fn len(&self) -> StorageResult<usize> {
            self.inner.len()
        }
    }

    #[test]
    fn concurrent_cold_reads_rebuild_once() {
        let store = SlowStore {
            inner: InMemoryPlacementStore::with_placements(vec![Placement::at(
                1.0, "alice", 1, 1, 5,
            )]),
        };
        let cache = Arc::new(CanvasCache::new(SPEC, Arc::new(store)));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.snapshot().unwrap()
                })
            })
            .collect();

        let snapshots: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.rebuild_count(), 1);
        for snapshot in &snapshots {
            assert!(Arc::ptr_eq(snapshot, &snapshots[0]));
            assert_eq!(snapshot.color_at(1, 1), Some(5));
        }
    }

    struct FailingStore;

    impl PlacementStore for FailingStore {
        fn append(&self, _: &Placement) -> StorageResult<()> {
            Ok(())
        }

        fn append_batch(&self, _: &[Placement]) -> StorageResult<()> {
            Ok(())
        }

        fn latest_per_coordinate(&self) -> StorageResult<Vec<Placement>> {
            Err(place_storage::StorageError::InvalidRecord("broken".into()))
        }

        fn last_at(&self, _: u16, _: u16) -> StorageResult<Option<Placement>> {
            Ok(None)
        }

        fn delete_user(&self, _: &str) -> StorageResult<usize> {
            Ok(0)
        }

        fn len(&self) -> StorageResult<usize> {
            Ok(0)
        }
    }

    #[test]
    fn failed_rebuild_is_not_cached() {
        let cache = CanvasCache::new(SPEC, Arc::new(FailingStore));
        assert!(cache.snapshot().is_err());
        assert!(cache.is_cold());
        assert_eq!(cache.rebuild_count(), 0);
    }

    #[test]
    fn writes_wait_for_snapshot_readers() {
        let cache = Arc::new(cache_with(Vec::new()));
        let placed = Arc::new(AtomicBool::new(false));

        let seen = cache
            .with_snapshot(|snapshot| {
                let writer = {
                    let cache = Arc::clone(&cache);
                    let placed = Arc::clone(&placed);
                    std::thread::spawn(move || {
                        cache.place("alice", 5, 5, 3).unwrap();
                        placed.store(true, Ordering::SeqCst);
                    })
                };
                std::thread::sleep(Duration::from_millis(50));
                assert!(!placed.load(Ordering::SeqCst));
                (snapshot.color_at(5, 5), writer)
            })
            .unwrap();

        let (color, writer) = seen;
        assert_eq!(color, Some(0));
        writer.join().unwrap();
        assert!(placed.load(Ordering::SeqCst));
        assert_eq!(cache.snapshot().unwrap().color_at(5, 5), Some(3));
    }

    #[test]
    fn failed_rebuild_skips_callback() {
        let cache = CanvasCache::new(SPEC, Arc::new(FailingStore));
        let mut called = false;
        assert!(cache.with_snapshot(|_| called = true).is_err());
        assert!(!called);
    }
}
