//! Device trust token storage.
//!
//! The trust token is the only state that outlives a verification session.
//! It is read once at trust-check time and written whenever a method yields a
//! fresh token. Backends: a durable file store keyed by device, and an
//! in-memory store for tests and ephemeral hosts.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{AcidError, Result};

/// Persistent store for the long-lived opaque device-trust token.
pub trait DeviceTrustStore: Send + Sync {
    /// The stored token, if any.
    fn load(&self) -> Option<String>;

    /// Persist a fresh token, replacing any previous one.
    fn save(&self, token: &str) -> Result<()>;
}

/// In-memory token store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryTrustStore {
    token: Mutex<Option<String>>,
}

impl MemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl DeviceTrustStore for MemoryTrustStore {
    fn load(&self) -> Option<String> {
        self.token.lock().expect("trust store poisoned").clone()
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.token.lock().expect("trust store poisoned") = Some(token.to_string());
        Ok(())
    }
}

/// File-backed token store keyed by device.
pub struct FileTrustStore {
    path: PathBuf,
}

impl FileTrustStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the conventional per-user location
    /// (`$ACID_DATA_DIR` or `~/.acid-check/trusted_device_token`).
    pub fn from_env() -> Self {
        let dir = std::env::var("ACID_DATA_DIR")
            .map(PathBuf::from)
            .ok()
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".acid-check")))
            .unwrap_or_else(|| PathBuf::from(".acid-check"));
        Self {
            path: dir.join("trusted_device_token"),
        }
    }
}

impl DeviceTrustStore for FileTrustStore {
    fn load(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    None
                } else {
                    Some(token.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read trust token");
                None
            }
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AcidError::Storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        std::fs::write(&self.path, token).map_err(|e| {
            AcidError::Storage(format!("Failed to write {}: {e}", self.path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryTrustStore::new();
        assert!(store.load().is_none());
        store.save("tok-1").unwrap();
        assert_eq!(store.load().as_deref(), Some("tok-1"));
        store.save("tok-2").unwrap();
        assert_eq!(store.load().as_deref(), Some("tok-2"));
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrustStore::new(dir.path().join("nested/trusted_device_token"));
        assert!(store.load().is_none());
        store.save("device-abc").unwrap();
        assert_eq!(store.load().as_deref(), Some("device-abc"));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trusted_device_token");
        FileTrustStore::new(&path).save("persisted").unwrap();
        assert_eq!(FileTrustStore::new(&path).load().as_deref(), Some("persisted"));
    }

    #[test]
    fn test_file_store_empty_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trusted_device_token");
        std::fs::write(&path, "  \n").unwrap();
        assert!(FileTrustStore::new(&path).load().is_none());
    }
}
