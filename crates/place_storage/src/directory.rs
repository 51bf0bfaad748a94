//! User directory: identity, permissions, ban state and placement counters.

use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Stable user identifier.
pub type UserId = u64;

/// Permission tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular painter.
    #[default]
    User,
    /// May clear, ban, change the cooldown and erase users.
    Moderator,
    /// Everything a moderator can do.
    Admin,
}

impl Role {
    /// Returns true for moderator and above.
    #[must_use]
    pub fn can_moderate(self) -> bool {
        self >= Role::Moderator
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        })
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "mod" | "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A user as known to the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable identifier.
    pub id: UserId,
    /// Display name, used as the painter name in placements.
    pub name: String,
    /// Permission tier.
    #[serde(default)]
    pub role: Role,
    /// Whether the user is banned from placing.
    #[serde(default)]
    pub banned: bool,
    /// Time of the last accepted placement, in seconds since the Unix epoch.
    #[serde(default)]
    pub last_placement: f64,
    /// Number of accepted placements.
    #[serde(default)]
    pub blocks_placed: u64,
}

impl UserRecord {
    /// Creates a regular user with no history.
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: Role::User,
            banned: false,
            last_placement: 0.0,
            blocks_placed: 0,
        }
    }

    /// Sets the role.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Returns true for moderator and above.
    #[must_use]
    pub fn can_moderate(&self) -> bool {
        self.role.can_moderate()
    }

    /// Returns true if `now` falls inside the cooldown window after the last placement.
    #[must_use]
    pub fn in_cooldown(&self, now: f64, cooldown_secs: u64) -> bool {
        now - self.last_placement < cooldown_secs as f64
    }

    /// Returns true if the user may place a pixel at `now`.
    #[must_use]
    pub fn can_place(&self, now: f64, cooldown_secs: u64) -> bool {
        !self.banned && !self.in_cooldown(now, cooldown_secs)
    }

    /// Unix time in milliseconds at which the cooldown window closes.
    #[must_use]
    pub fn cooldown_ends_ms(&self, cooldown_secs: u64) -> u64 {
        ((self.last_placement + cooldown_secs as f64) * 1000.0) as u64
    }

    /// Records an accepted placement at `timestamp`.
    pub fn note_placement(&mut self, timestamp: f64) {
        self.last_placement = timestamp;
        self.blocks_placed += 1;
    }
}

/// Lookup and persistence of user records.
///
/// Token verification is not part of this trait; the server maps tokens to
/// a [`UserId`] first and then asks the directory for the record.
pub trait UserDirectory: Send + Sync {
    /// Returns the user with `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn get(&self, id: UserId) -> StorageResult<Option<UserRecord>>;

    /// Returns the user whose name matches `name`, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn find_by_name(&self, name: &str) -> StorageResult<Option<UserRecord>>;

    /// Bumps the placement counter and last-placement time of `id`.
    ///
    /// Returns the updated record, or `None` if the user does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    fn record_placement(&self, id: UserId, timestamp: f64) -> StorageResult<Option<UserRecord>>;

    /// Sets the ban flag of `id`. Returns false if the user does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    fn set_banned(&self, id: UserId, banned: bool) -> StorageResult<bool>;
}

/// A user directory kept in memory and optionally mirrored to a JSON file.
///
/// Every mutation rewrites the file with write-then-rename, so a crash
/// leaves either the old or the new contents.
#[derive(Debug, Default)]
pub struct LocalDirectory {
    users: RwLock<BTreeMap<UserId, UserRecord>>,
    path: Option<PathBuf>,
}

impl LocalDirectory {
    /// Creates an empty directory that is never persisted.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a directory backed by the JSON file at `path`.
    ///
    /// A missing file yields an empty directory; the file is created on
    /// the first mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut users = BTreeMap::new();
        if path.exists() {
            let data = fs::read(path)?;
            if !data.is_empty() {
                let records: Vec<UserRecord> = serde_json::from_slice(&data)?;
                for record in records {
                    users.insert(record.id, record);
                }
            }
        }
        info!(path = %path.display(), users = users.len(), "opened user directory");
        Ok(Self {
            users: RwLock::new(users),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates a user with the next free id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DuplicateUser`] if the name is taken.
    pub fn add_user(&self, name: &str, role: Role) -> StorageResult<UserRecord> {
        let mut users = self.users.write();
        if users.values().any(|u| u.name.eq_ignore_ascii_case(name)) {
            return Err(StorageError::DuplicateUser(name.to_string()));
        }
        let id = users.keys().next_back().map_or(1, |last| last + 1);
        let record = UserRecord::new(id, name).with_role(role);
        users.insert(id, record.clone());
        self.save(&users)?;
        Ok(record)
    }

    /// Inserts or replaces a record as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    pub fn insert(&self, record: UserRecord) -> StorageResult<()> {
        let mut users = self.users.write();
        users.insert(record.id, record);
        self.save(&users)
    }

    /// Returns every record, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<UserRecord> {
        self.users.read().values().cloned().collect()
    }

    fn save(&self, users: &BTreeMap<UserId, UserRecord>) -> StorageResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let records: Vec<&UserRecord> = users.values().collect();
        let data = serde_json::to_vec_pretty(&records)?;

        let mut temp_path = path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

impl UserDirectory for LocalDirectory {
    fn get(&self, id: UserId) -> StorageResult<Option<UserRecord>> {
        Ok(self.users.read().get(&id).cloned())
    }

    fn find_by_name(&self, name: &str) -> StorageResult<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    fn record_placement(&self, id: UserId, timestamp: f64) -> StorageResult<Option<UserRecord>> {
        let mut users = self.users.write();
        let Some(record) = users.get_mut(&id) else {
            return Ok(None);
        };
        record.note_placement(timestamp);
        let updated = record.clone();
        self.save(&users)?;
        Ok(Some(updated))
    }

    fn set_banned(&self, id: UserId, banned: bool) -> StorageResult<bool> {
        let mut users = self.users.write();
        let Some(record) = users.get_mut(&id) else {
            return Ok(false);
        };
        record.banned = banned;
        self.save(&users)?;
        Ok(true)
    }
}
