//! File-backed placement log for persistent storage.
//!
//! ```text
//! <log_dir>/
//! ├─ LOCK              # Advisory lock for single-writer
//! └─ placements.log    # CRC-framed placement records
//! ```

use crate::error::{StorageError, StorageResult};
use crate::index::LogIndex;
use crate::placement::Placement;
use crate::record::{decode_record, encode_record, RecordRead};
use crate::store::PlacementStore;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the placement log within the log directory.
pub const LOG_FILE: &str = "placements.log";
/// Name of the advisory lock file within the log directory.
pub const LOCK_FILE: &str = "LOCK";
/// Temporary file used while rewriting the log.
const LOG_TEMP: &str = "placements.log.tmp";

/// A file-backed placement store.
///
/// Every placement is framed and appended to `placements.log`; the log is
/// replayed into memory on open so queries never touch the disk.
///
/// # Durability
///
/// - Each append is flushed; with `sync_on_append` it is also `sync_data`'d
///   before the call returns
/// - A torn or corrupt tail found on open is truncated away
/// - `delete_user` rewrites the log with write-then-rename
///
/// # Thread Safety
///
/// The log directory is held under an exclusive `fs2` lock, so only one
/// process can write it. Within the process the store is `Send + Sync`.
///
/// # Example
///
/// ```no_run
/// use place_storage::{FilePlacementStore, Placement, PlacementStore};
/// use std::path::Path;
///
/// let store = FilePlacementStore::open(Path::new("canvas-data")).unwrap();
/// store.append(&Placement::new("alice", 3, 4, 12)).unwrap();
/// ```
#[derive(Debug)]
pub struct FilePlacementStore {
    dir: PathBuf,
    /// Append handle. Held while mirroring into `index` so both see the same order.
    log: Mutex<File>,
    index: RwLock<LogIndex>,
    sync_on_append: bool,
    _lock_file: File,
}

impl FilePlacementStore {
    /// Opens or creates a placement log in `dir`, syncing every append.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, another process
    /// holds the lock, or the log cannot be read.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        Self::open_with_sync(dir, true)
    }

    /// Opens or creates a placement log, choosing whether appends are synced.
    ///
    /// # Errors
    ///
    /// See [`FilePlacementStore::open`].
    pub fn open_with_sync(dir: &Path, sync_on_append: bool) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(dir.to_path_buf()));
        }

        let log_path = dir.join(LOG_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&log_path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let (placements, valid_len, problem) = replay(&data);
        if valid_len < data.len() {
            warn!(
                path = %log_path.display(),
                valid_len,
                total = data.len(),
                problem = problem.as_deref().unwrap_or("torn tail"),
                "truncating damaged placement log tail"
            );
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
        }

        let mut index = LogIndex::new();
        index.extend(placements);
        info!(path = %log_path.display(), placements = index.len(), "opened placement log");

        Ok(Self {
            dir: dir.to_path_buf(),
            log: Mutex::new(file),
            index: RwLock::new(index),
            sync_on_append,
            _lock_file: lock_file,
        })
    }

    /// Returns the log directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path to the log file.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    /// Returns a copy of the full log, oldest first.
    #[must_use]
    pub fn placements(&self) -> Vec<Placement> {
        self.index.read().placements().to_vec()
    }

    fn write_records(&self, file: &mut File, placements: &[Placement]) -> StorageResult<()> {
        let mut buf = Vec::new();
        for placement in placements {
            buf.extend_from_slice(&encode_record(placement)?);
        }
        file.write_all(&buf)?;
        file.flush()?;
        if self.sync_on_append {
            file.sync_data()?;
        }
        Ok(())
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        // NTFS journals metadata; directory fsync is not available
        Ok(())
    }
}

impl PlacementStore for FilePlacementStore {
    fn append(&self, placement: &Placement) -> StorageResult<()> {
        self.append_batch(std::slice::from_ref(placement))
    }

    fn append_batch(&self, placements: &[Placement]) -> StorageResult<()> {
        if placements.is_empty() {
            return Ok(());
        }
        let mut file = self.log.lock();
        self.write_records(&mut file, placements)?;
        self.index.write().extend(placements.iter().cloned());
        Ok(())
    }

    fn latest_per_coordinate(&self) -> StorageResult<Vec<Placement>> {
        Ok(self.index.read().latest_per_coordinate())
    }

    fn last_at(&self, x: u16, y: u16) -> StorageResult<Option<Placement>> {
        Ok(self.index.read().last_at(x, y))
    }

    fn delete_user(&self, user: &str) -> StorageResult<usize> {
        let mut file = self.log.lock();
        let mut index = self.index.write();

        let kept = index.without_user(user);
        let removed = index.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let temp_path = self.dir.join(LOG_TEMP);
        let log_path = self.log_path();
        {
            let mut temp = File::create(&temp_path)?;
            let mut buf = Vec::new();
            for placement in &kept {
                buf.extend_from_slice(&encode_record(placement)?);
            }
            temp.write_all(&buf)?;
            temp.sync_all()?;
        }
        fs::rename(&temp_path, &log_path)?;
        self.sync_directory()?;

        *file = OpenOptions::new().read(true).append(true).open(&log_path)?;
        index.replace(kept);

        debug!(user, removed, "rewrote placement log without user");
        Ok(removed)
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.index.read().len())
    }
}

/// Decodes every valid record at the front of `data`.
///
/// Returns the placements, the length of the valid prefix, and a description
/// of the first corrupt record if one stopped the scan.
fn replay(data: &[u8]) -> (Vec<Placement>, usize, Option<String>) {
    let mut placements = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        match decode_record(&data[offset..]) {
            RecordRead::Complete(placement, used) => {
                placements.push(placement);
                offset += used;
            }
            RecordRead::Incomplete => return (placements, offset, None),
            RecordRead::Corrupt(message) => return (placements, offset, Some(message)),
        }
    }

    (placements, offset, None)
}

/// Result of scanning a placement log without opening it for writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogReport {
    /// Number of valid records.
    pub records: usize,
    /// Length of the valid prefix in bytes.
    pub valid_bytes: u64,
    /// Total file length in bytes.
    pub total_bytes: u64,
    /// The first corruption encountered, if any.
    pub first_error: Option<String>,
}

impl LogReport {
    /// Returns true if every byte of the file belongs to a valid record.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.valid_bytes == self.total_bytes
    }
}

/// Scans a placement log file and reports how much of it is valid.
///
/// This does not take the directory lock and never modifies the file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn verify_log(path: &Path) -> StorageResult<LogReport> {
    let data = fs::read(path)?;
    let (placements, valid_len, problem) = replay(&data);

    let first_error = match problem {
        Some(message) => Some(StorageError::corrupted(valid_len as u64, message).to_string()),
        None if valid_len < data.len() => Some(
            StorageError::corrupted(valid_len as u64, "truncated record").to_string(),
        ),
        None => None,
    };

    Ok(LogReport {
        records: placements.len(),
        valid_bytes: valid_len as u64,
        total_bytes: data.len() as u64,
        first_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let store = FilePlacementStore::open(dir.path()).unwrap();
        assert!(store.is_empty().unwrap());
        assert!(store.log_path().exists());
        assert_eq!(store.dir(), dir.path());
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();

        {
            let store = FilePlacementStore::open(dir.path()).unwrap();
            store.append(&Placement::at(1.0, "alice", 5, 5, 3)).unwrap();
            store.append(&Placement::at(2.0, "bob", 5, 5, 9)).unwrap();
        }

        let store = FilePlacementStore::open(dir.path()).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        let last = store.last_at(5, 5).unwrap().unwrap();
        assert_eq!((last.user.as_str(), last.color), ("bob", 9));
    }

    #[test]
    fn file_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _store = FilePlacementStore::open(dir.path()).unwrap();

        let result = FilePlacementStore::open(dir.path());
        assert!(matches!(result, Err(StorageError::Locked(_))));
    }

    #[test]
    fn file_torn_tail_is_truncated() {
        let dir = tempdir().unwrap();
        {
            let store = FilePlacementStore::open(dir.path()).unwrap();
            store.append(&Placement::at(1.0, "alice", 1, 1, 1)).unwrap();
        }

        let log_path = dir.path().join(LOG_FILE);
        let good_len = fs::metadata(&log_path).unwrap().len();
        let partial = encode_record(&Placement::at(2.0, "bob", 2, 2, 2)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
            file.write_all(&partial[..partial.len() / 2]).unwrap();
        }

        let report = verify_log(&log_path).unwrap();
        assert_eq!(report.records, 1);
        assert!(!report.is_clean());

        let store = FilePlacementStore::open(dir.path()).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(fs::metadata(&log_path).unwrap().len(), good_len);
    }

    #[test]
    fn file_delete_user_rewrites_log() {
        let dir = tempdir().unwrap();
        {
            let store = FilePlacementStore::open(dir.path()).unwrap();
            store.append(&Placement::at(1.0, "alice", 0, 0, 1)).unwrap();
            store.append(&Placement::at(2.0, "mallory", 0, 0, 2)).unwrap();
            assert_eq!(store.delete_user("mallory").unwrap(), 1);
            store.append(&Placement::at(3.0, "alice", 1, 0, 4)).unwrap();
        }

        let store = FilePlacementStore::open(dir.path()).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.last_at(0, 0).unwrap().unwrap().color, 1);
        assert!(!dir.path().join(LOG_TEMP).exists());
    }

    #[test]
    fn file_batch_append() {
        let dir = tempdir().unwrap();
        let store = FilePlacementStore::open_with_sync(dir.path(), false).unwrap();
        let batch: Vec<_> = (0..10u16)
            .map(|x| Placement::at(5.0, "", x, 3, 0))
            .collect();
        store.append_batch(&batch).unwrap();
        store.append_batch(&[]).unwrap();

        let report = verify_log(&store.log_path()).unwrap();
        assert_eq!(report.records, 10);
        assert!(report.is_clean());
        assert!(report.first_error.is_none());
    }
}
