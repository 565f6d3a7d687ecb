//! Persistence for credentials and the current access token.
//!
//! Six string values make up a session. They are written together on login
//! and removed together on logout, so a store never holds a token without
//! the credentials that produced it.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur when reading or writing a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Session file could not be read or written.
    #[error("session file I/O error: {0}")]
    Io(#[from] io::Error),

    /// Session file is not a JSON object of strings.
    #[error("session file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Keys of the persisted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    /// Smaregi contract ID.
    ContractId,
    /// App client ID.
    ClientId,
    /// App client secret.
    ClientSecret,
    /// `dev` or `prod`.
    Environment,
    /// Current access token.
    AccessToken,
    /// Token expiry as Unix milliseconds.
    TokenExpiresAt,
}

impl StorageKey {
    /// Every key, in a stable order.
    pub const ALL: [Self; 6] = [
        Self::ContractId,
        Self::ClientId,
        Self::ClientSecret,
        Self::Environment,
        Self::AccessToken,
        Self::TokenExpiresAt,
    ];

    /// Persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContractId => "smaregi_contract_id",
            Self::ClientId => "smaregi_client_id",
            Self::ClientSecret => "smaregi_client_secret",
            Self::Environment => "smaregi_environment",
            Self::AccessToken => "smaregi_access_token",
            Self::TokenExpiresAt => "smaregi_token_expires_at",
        }
    }
}

/// Key-value persistence for the session.
pub trait CredentialStore: Send {
    /// Read a value.
    fn get(&self, key: StorageKey) -> Option<String>;

    /// Write several values in one step.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be written.
    fn set_many(&mut self, entries: Vec<(StorageKey, String)>) -> Result<(), StoreError>;

    /// Remove several values in one step.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be written.
    fn remove_many(&mut self, keys: &[StorageKey]) -> Result<(), StoreError>;

    /// Remove the whole session.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be written.
    fn clear(&mut self) -> Result<(), StoreError> {
        self.remove_many(&StorageKey::ALL)
    }
}

/// In-memory store, for tests and short-lived embeddings.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<StorageKey, String>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.entries.get(&key).cloned()
    }

    fn set_many(&mut self, entries: Vec<(StorageKey, String)>) -> Result<(), StoreError> {
        self.entries.extend(entries);
        Ok(())
    }

    fn remove_many(&mut self, keys: &[StorageKey]) -> Result<(), StoreError> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }
}

/// JSON file store keyed by the persisted names.
///
/// The file is rewritten on every change and deleted once empty. On Unix it
/// is kept at mode `0600` because it holds the client secret. A change that
/// cannot be written is not applied.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open a session file, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    /// Location of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `entries` to disk, deleting the file when there is nothing left.
    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        let json = serde_json::to_vec_pretty(entries)?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        // `mode` only applies on creation
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(&json)?;
        Ok(())
    }

    /// Persist `entries`, replacing the in-memory copy only once the write
    /// has succeeded.
    fn commit(&mut self, entries: BTreeMap<String, String>) -> Result<(), StoreError> {
        self.flush(&entries)?;
        self.entries = entries;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.entries.get(key.as_str()).cloned()
    }

    fn set_many(&mut self, entries: Vec<(StorageKey, String)>) -> Result<(), StoreError> {
        let mut next = self.entries.clone();
        next.extend(
            entries
                .into_iter()
                .map(|(key, value)| (key.as_str().to_string(), value)),
        );
        self.commit(next)
    }

    fn remove_many(&mut self, keys: &[StorageKey]) -> Result<(), StoreError> {
        let mut next = self.entries.clone();
        for key in keys {
            next.remove(key.as_str());
        }
        self.commit(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "display-toggle-{name}-{}.json",
            std::process::id()
        ))
    }

    #[test]
    fn test_storage_key_names() {
        let names: Vec<&str> = StorageKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "smaregi_contract_id",
                "smaregi_client_id",
                "smaregi_client_secret",
                "smaregi_environment",
                "smaregi_access_token",
                "smaregi_token_expires_at",
            ]
        );
    }

    #[test]
    fn test_memory_store_clear_removes_everything() {
        let mut store = MemoryStore::new();
        store
            .set_many(
                StorageKey::ALL
                    .iter()
                    .map(|key| (*key, "v".to_string()))
                    .collect(),
            )
            .unwrap();
        assert_eq!(store.get(StorageKey::ClientSecret).as_deref(), Some("v"));

        store.clear().unwrap();
        assert!(StorageKey::ALL.iter().all(|key| store.get(*key).is_none()));
    }

    #[test]
    fn test_file_store_persists_between_opens() {
        let path = temp_path("persist");
        let _ = std::fs::remove_file(&path);

        let mut store = FileStore::open(&path).unwrap();
        store
            .set_many(vec![
                (StorageKey::ContractId, "skaa0001".to_string()),
                (StorageKey::TokenExpiresAt, "1700000000000".to_string()),
            ])
            .unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(StorageKey::ContractId).as_deref(), Some("skaa0001"));

        let raw: BTreeMap<String, String> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(raw.contains_key("smaregi_token_expires_at"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_store_clear_deletes_file() {
        let path = temp_path("clear");
        let mut store = FileStore::open(&path).unwrap();
        store
            .set_many(vec![(StorageKey::AccessToken, "tok".to_string())])
            .unwrap();
        assert!(path.exists());

        store.clear().unwrap();
        assert!(!path.exists());
        assert!(store.get(StorageKey::AccessToken).is_none());
    }

    #[test]
    fn test_file_store_failed_write_keeps_previous_state() {
        let mut store = FileStore::open("/nonexistent-display-toggle-dir/session.json").unwrap();

        let err = store
            .set_many(vec![(StorageKey::AccessToken, "tok".to_string())])
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(store.get(StorageKey::AccessToken).is_none());
    }

    #[test]
    fn test_file_store_failed_clear_keeps_session() {
        let path = temp_path("stuck");
        let _ = std::fs::remove_dir(&path);
        let mut store = FileStore::open(&path).unwrap();
        store
            .set_many(vec![(StorageKey::AccessToken, "tok".to_string())])
            .unwrap();

        // A directory in place of the file makes the delete fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.clear().is_err());
        assert_eq!(store.get(StorageKey::AccessToken).as_deref(), Some("tok"));

        std::fs::remove_dir(&path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_tightens_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_path("perms");
        std::fs::write(&path, b"{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let mut store = FileStore::open(&path).unwrap();
        store
            .set_many(vec![(StorageKey::ClientSecret, "secret".to_string())])
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let path = temp_path("corrupt");
        std::fs::write(&path, b"not json").unwrap();

        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));

        std::fs::remove_file(&path).unwrap();
    }
}
