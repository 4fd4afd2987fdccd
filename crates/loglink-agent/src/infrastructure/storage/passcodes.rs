//! Persisted passcode records for protected peers.
//!
//! The store maps a peer's display name to the passcode that last worked for
//! it, so reconnecting to a protected server does not re-prompt the user.
//! Records are written to `passcodes.toml` next to the agent config:
//! - Windows:  `%APPDATA%\LogLink\passcodes.toml`
//! - Linux:    `~/.config/loglink/passcodes.toml`
//! - macOS:    `~/Library/Application Support/LogLink/passcodes.toml`
//!
//! A corrupt or unreadable file degrades to "no stored passcodes" with a
//! warning; a damaged store must never block a connect attempt.  Writes are
//! serialized by the internal mutex.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::infrastructure::storage::platform_config_dir;

/// Error type for passcode persistence operations.
///
/// Only *writes* can surface errors; reads always degrade to `None`.
#[derive(Debug, Error)]
pub enum PasscodeStoreError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing passcode store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The records could not be serialized to TOML.
    #[error("failed to serialize passcode store: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// On-disk schema.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PasscodeFile {
    /// Peer display name → passcode.
    #[serde(default)]
    passcodes: HashMap<String, String>,
}

/// Persistent passcode store.
pub struct PasscodeStore {
    path: PathBuf,
    records: Mutex<HashMap<String, String>>,
}

impl PasscodeStore {
    /// Opens the store at `path`, reading any existing records.
    ///
    /// A missing file starts empty; a corrupt file is logged and treated as
    /// empty rather than failing the caller.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<PasscodeFile>(&content) {
                Ok(file) => file.passcodes,
                Err(e) => {
                    warn!("passcode store at {} is corrupt ({e}); starting empty", path.display());
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!("could not read passcode store at {} ({e}); starting empty", path.display());
                HashMap::new()
            }
        };
        Self {
            path,
            records: Mutex::new(records),
        }
    }

    /// Opens the store at the platform-default location.
    ///
    /// # Errors
    ///
    /// Returns [`PasscodeStoreError::NoPlatformConfigDir`] when the platform
    /// config directory cannot be determined from the environment.
    pub fn open_default() -> Result<Self, PasscodeStoreError> {
        let dir = platform_config_dir().ok_or(PasscodeStoreError::NoPlatformConfigDir)?;
        Ok(Self::open(dir.join("passcodes.toml")))
    }

    /// Returns the stored passcode for `name`, if any.
    pub fn get(&self, name: &str) -> Option<String> {
        self.records.lock().ok()?.get(name).cloned()
    }

    /// Stores (or replaces) the passcode for `name` and persists to disk.
    ///
    /// # Errors
    ///
    /// Returns [`PasscodeStoreError::Io`] or [`PasscodeStoreError::Serialize`]
    /// when the file cannot be written.  The in-memory record is updated
    /// either way, so the current process can still reconnect.
    pub fn set(&self, name: &str, passcode: &str) -> Result<(), PasscodeStoreError> {
        let snapshot = {
            let mut records = match self.records.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            records.insert(name.to_string(), passcode.to_string());
            records.clone()
        };
        self.persist(snapshot)
    }

    /// Removes the record for `name` (user-driven forget) and persists.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`PasscodeStore::set`].
    pub fn remove(&self, name: &str) -> Result<(), PasscodeStoreError> {
        let snapshot = {
            let mut records = match self.records.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            records.remove(name);
            records.clone()
        };
        self.persist(snapshot)
    }

    /// The file this store reads from and writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, records: HashMap<String, String>) -> Result<(), PasscodeStoreError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| PasscodeStoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(&PasscodeFile { passcodes: records })?;
        std::fs::write(&self.path, content).map_err(|source| PasscodeStoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("loglink_passcodes_{tag}_{}.toml", std::process::id()))
    }

    #[test]
    fn test_get_returns_none_when_empty() {
        let path = temp_store_path("empty");
        let store = PasscodeStore::open(&path);
        assert_eq!(store.get("Office Mac"), None);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let path = temp_store_path("roundtrip");
        let store = PasscodeStore::open(&path);
        store.set("Office Mac", "hunter2").unwrap();
        assert_eq!(store.get("Office Mac"), Some("hunter2".to_string()));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_records_survive_reopen() {
        let path = temp_store_path("reopen");
        {
            let store = PasscodeStore::open(&path);
            store.set("studio", "s3cret").unwrap();
        }
        let reopened = PasscodeStore::open(&path);
        assert_eq!(reopened.get("studio"), Some("s3cret".to_string()));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_corrupt_file_degrades_to_empty() {
        let path = temp_store_path("corrupt");
        std::fs::write(&path, "[[[ not valid toml").unwrap();
        let store = PasscodeStore::open(&path);
        assert_eq!(store.get("anything"), None);

        // The store must still accept new records after degradation.
        store.set("fresh", "pass").unwrap();
        assert_eq!(store.get("fresh"), Some("pass".to_string()));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_set_replaces_existing_record() {
        let path = temp_store_path("replace");
        let store = PasscodeStore::open(&path);
        store.set("peer", "old").unwrap();
        store.set("peer", "new").unwrap();
        assert_eq!(store.get("peer"), Some("new".to_string()));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_remove_forgets_record() {
        let path = temp_store_path("remove");
        let store = PasscodeStore::open(&path);
        store.set("peer", "pass").unwrap();
        store.remove("peer").unwrap();
        assert_eq!(store.get("peer"), None);

        let reopened = PasscodeStore::open(&path);
        assert_eq!(reopened.get("peer"), None);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_removing_one_peer_keeps_others() {
        let path = temp_store_path("keep_others");
        let store = PasscodeStore::open(&path);
        store.set("a", "pass-a").unwrap();
        store.set("b", "pass-b").unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.get("b"), Some("pass-b".to_string()));
        std::fs::remove_file(&path).ok();
    }
}
