//! Durable storage for the bearer token between sessions.
//!
//! Both backends persist the same JSON record:
//! `{"scopes": [...], "token": "...", "expires_at": "<RFC 3339>"}`.
//! Nothing here runs automatically; the caller decides when to save and load.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const KEYRING_SERVICE_NAME: &str = "graphmail-credentials";
pub const KEYRING_USERNAME: &str = "default_user";

/// Snapshot of an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub scopes: Vec<String>,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub fn new(scopes: Vec<String>, token: impl Into<String>) -> Self {
        Self {
            scopes,
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    fn decode(raw: &str, location: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(raw).map_err(|e| Error::corrupt(location, e))?;
        if record.token.is_empty() {
            return Err(Error::corrupt(location, "token is empty"));
        }
        if record.scopes.is_empty() {
            return Err(Error::corrupt(location, "no scopes recorded for token"));
        }
        Ok(record)
    }
}

pub trait CredentialStore: Send + Sync {
    fn save(&self, record: &CredentialRecord) -> Result<()>;

    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<CredentialRecord>>;

    /// Removes the stored record. Returns whether one existed.
    fn clear(&self) -> Result<bool>;

    /// Human-readable location for messages.
    fn location(&self) -> String;
}

/// JSON file on disk, written atomically with owner-only permissions.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, record: &CredentialRecord) -> Result<()> {
        let location = self.location();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::persistence(&location, e))?;
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| Error::persistence(&location, e))?;

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json).map_err(|e| Error::persistence(&location, e))?;
        set_owner_only(&tmp_path).map_err(|e| Error::persistence(&location, e))?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::persistence(&location, e));
        }

        debug!(path = %self.path.display(), scopes = record.scopes.len(), "stored credential record");
        Ok(())
    }

    fn load(&self) -> Result<Option<CredentialRecord>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no credential record on disk");
                return Ok(None);
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(Error::corrupt(self.location(), e));
            }
            Err(e) => return Err(Error::persistence(self.location(), e)),
        };

        let record = CredentialRecord::decode(&raw, &self.location())?;
        debug!(path = %self.path.display(), "loaded credential record");
        Ok(Some(record))
    }

    fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::persistence(self.location(), e)),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

// Define a trait for Keyring operations to allow mocking
#[cfg_attr(test, mockall::automock)]
pub trait KeyringEntry: Send + Sync {
    fn get_password(&self) -> std::result::Result<String, keyring::Error>;
    fn set_password(&self, password: &str) -> std::result::Result<(), keyring::Error>;
    fn delete_password(&self) -> std::result::Result<(), keyring::Error>;
}

// Implement the trait for the real keyring::Entry
impl KeyringEntry for Entry {
    fn get_password(&self) -> std::result::Result<String, keyring::Error> {
        self.get_password()
    }
    fn set_password(&self, password: &str) -> std::result::Result<(), keyring::Error> {
        self.set_password(password)
    }
    fn delete_password(&self) -> std::result::Result<(), keyring::Error> {
        self.delete_password()
    }
}

/// The same record kept as the password of an OS keyring entry.
pub struct KeyringCredentialStore<K: KeyringEntry = Entry> {
    entry: K,
}

impl KeyringCredentialStore<Entry> {
    pub fn open() -> Result<Self> {
        let entry = Entry::new(KEYRING_SERVICE_NAME, KEYRING_USERNAME)
            .map_err(|e| Error::persistence(keyring_location(), e))?;
        Ok(Self { entry })
    }
}

impl<K: KeyringEntry> KeyringCredentialStore<K> {
    pub fn with_entry(entry: K) -> Self {
        Self { entry }
    }
}

fn keyring_location() -> String {
    format!("keyring:{KEYRING_SERVICE_NAME}/{KEYRING_USERNAME}")
}

impl<K: KeyringEntry> CredentialStore for KeyringCredentialStore<K> {
    fn save(&self, record: &CredentialRecord) -> Result<()> {
        let json =
            serde_json::to_string(record).map_err(|e| Error::persistence(keyring_location(), e))?;
        self.entry
            .set_password(&json)
            .map_err(|e| Error::persistence(keyring_location(), e))?;
        debug!(location = %keyring_location(), "stored credential record");
        Ok(())
    }

    fn load(&self) -> Result<Option<CredentialRecord>> {
        let raw = match self.entry.get_password() {
            Ok(raw) => raw,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(keyring::Error::BadEncoding(_)) => {
                return Err(Error::corrupt(keyring_location(), "password is not valid UTF-8"));
            }
            Err(e) => return Err(Error::persistence(keyring_location(), e)),
        };
        CredentialRecord::decode(&raw, &keyring_location()).map(Some)
    }

    fn clear(&self) -> Result<bool> {
        match self.entry.delete_password() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(Error::persistence(keyring_location(), e)),
        }
    }

    fn location(&self) -> String {
        keyring_location()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> CredentialRecord {
        CredentialRecord::new(
            vec!["User.Read".to_string(), "Mail.Read".to_string()],
            "eyJ0eXAiOiJKV1Qi.sample",
        )
        .with_expires_at(Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn save_then_load_returns_same_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("pri").join("tokens.json"));

        store.save(&sample_record()).unwrap();
        let loaded = store.load().unwrap().expect("record should exist");

        assert_eq!(loaded, sample_record());
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn save_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("tokens.json"));

        store.save(&sample_record()).unwrap();
        let newer = CredentialRecord::new(vec!["Mail.Send".to_string()], "second");
        store.save(&newer).unwrap();

        assert_eq!(store.load().unwrap(), Some(newer));
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn load_malformed_file_is_corrupt_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, "{\"graph_scopes\": \"User.Read\"").unwrap();

        let err = FileCredentialStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::CorruptRecord { .. }), "got {err:?}");
    }

    #[test]
    fn load_record_with_empty_token_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, r#"{"scopes": ["User.Read"], "token": ""}"#).unwrap();

        let err = FileCredentialStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::CorruptRecord { .. }));
    }

    #[test]
    fn save_to_unwritable_location_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "plain file").unwrap();

        let store = FileCredentialStore::new(blocker.join("tokens.json"));
        let err = store.save(&sample_record()).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("tokens.json"));
        store.save(&sample_record()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn clear_reports_whether_record_existed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("tokens.json"));
        assert!(!store.clear().unwrap());

        store.save(&sample_record()).unwrap();
        assert!(store.clear().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn keyring_save_writes_json_record() {
        let mut entry = MockKeyringEntry::new();
        let expected = serde_json::to_string(&sample_record()).unwrap();
        entry
            .expect_set_password()
            .withf(move |password: &str| password == expected)
            .times(1)
            .returning(|_| Ok(()));

        KeyringCredentialStore::with_entry(entry)
            .save(&sample_record())
            .unwrap();
    }

    #[test]
    fn keyring_without_entry_loads_none() {
        let mut entry = MockKeyringEntry::new();
        entry
            .expect_get_password()
            .returning(|| Err(keyring::Error::NoEntry));

        let store = KeyringCredentialStore::with_entry(entry);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn keyring_garbage_is_corrupt_record() {
        let mut entry = MockKeyringEntry::new();
        entry
            .expect_get_password()
            .returning(|| Ok("not json".to_string()));

        let err = KeyringCredentialStore::with_entry(entry).load().unwrap_err();
        assert!(matches!(err, Error::CorruptRecord { .. }));
    }

    #[test]
    fn keyring_round_trip() {
        let mut entry = MockKeyringEntry::new();
        let stored = serde_json::to_string(&sample_record()).unwrap();
        entry
            .expect_get_password()
            .returning(move || Ok(stored.clone()));

        let loaded = KeyringCredentialStore::with_entry(entry).load().unwrap();
        assert_eq!(loaded, Some(sample_record()));
    }

    #[test]
    fn keyring_clear_without_entry_is_false() {
        let mut entry = MockKeyringEntry::new();
        entry
            .expect_delete_password()
            .times(1)
            .returning(|| Err(keyring::Error::NoEntry));

        assert!(!KeyringCredentialStore::with_entry(entry).clear().unwrap());
    }
}
