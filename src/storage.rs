//! Durable client-side storage for the auth record.
//!
//! SYSTEM CONTEXT
//! ==============
//! The auth store persists `{ is_logged_in, session }` so a restart can
//! rehydrate without a login round trip. Backends are synchronous: the record
//! is a few hundred bytes and is written only on login/logout.
//!
//! ERROR HANDLING
//! ==============
//! A record that exists but fails to parse is reported as
//! `StorageError::Corrupt` so callers can discard it instead of failing
//! start-up. Plain I/O failures surface as `StorageError::Io`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::session::Session;

// =============================================================================
// RECORD
// =============================================================================

/// The durable auth record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAuth {
    pub is_logged_in: bool,
    #[serde(default)]
    pub session: Option<Session>,
}

impl PersistedAuth {
    #[must_use]
    pub fn logged_in(session: Session) -> Self {
        Self { is_logged_in: true, session: Some(session) }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session record is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
    #[error("session record could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("session storage lock poisoned")]
    Poisoned,
}

// =============================================================================
// BACKENDS
// =============================================================================

/// Backend for the persisted auth record.
pub trait SessionStorage: Send + Sync {
    /// Read the record. `Ok(None)` means nothing has been stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or the record is corrupt.
    fn load(&self) -> Result<Option<PersistedAuth>, StorageError>;

    /// Replace the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    fn save(&self, record: &PersistedAuth) -> Result<(), StorageError>;

    /// Remove the record. Clearing an empty backend is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn clear(&self) -> Result<(), StorageError>;
}

fn decode(raw: &str) -> Result<PersistedAuth, StorageError> {
    serde_json::from_str(raw).map_err(StorageError::Corrupt)
}

fn encode(record: &PersistedAuth) -> Result<String, StorageError> {
    serde_json::to_string_pretty(record).map_err(StorageError::Encode)
}

/// JSON file on disk. Writes go through a sibling temp file and a rename so a
/// crash never leaves a half-written record behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<PersistedAuth>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => decode(&raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &PersistedAuth) -> Result<(), StorageError> {
        let raw = encode(record)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.temp_path();
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process backend. Holds the encoded JSON so reads exercise the same
/// decode path as the file backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    raw: Mutex<Option<String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the backend with raw text, valid or not.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { raw: Mutex::new(Some(raw.into())) }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.lock().map(|raw| raw.is_none()).unwrap_or(true)
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<PersistedAuth>, StorageError> {
        let raw = self.raw.lock().map_err(|_| StorageError::Poisoned)?;
        raw.as_deref().map(decode).transpose()
    }

    fn save(&self, record: &PersistedAuth) -> Result<(), StorageError> {
        let encoded = encode(record)?;
        *self.raw.lock().map_err(|_| StorageError::Poisoned)? = Some(encoded);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.raw.lock().map_err(|_| StorageError::Poisoned)? = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
