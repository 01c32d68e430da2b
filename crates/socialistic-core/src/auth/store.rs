//! Persistent key-value storage for session credentials.
//!
//! Three keys are stored: the access token, the refresh token, and a
//! JSON snapshot of the last known user. They are always cleared together.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{AuthResponse, User};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Keychain service name for the keyring backend
const SERVICE_NAME: &str = "socialistic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    AccessToken,
    RefreshToken,
    User,
}

impl StoreKey {
    pub const ALL: [StoreKey; 3] = [StoreKey::AccessToken, StoreKey::RefreshToken, StoreKey::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::AccessToken => "token",
            StoreKey::RefreshToken => "refreshToken",
            StoreKey::User => "user",
        }
    }
}

/// Opaque durable key-value storage.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: StoreKey) -> Result<Option<String>>;
    fn set(&self, key: StoreKey, value: &str) -> Result<()>;
    fn remove(&self, key: StoreKey) -> Result<()>;
}

// ============================================================================
// Backends
// ============================================================================

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<StoreKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(values.get(&key).cloned())
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("memory store lock poisoned"))?;
        values.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("memory store lock poisoned"))?;
        values.remove(&key);
        Ok(())
    }
}

/// JSON file in the cache directory, rewritten on every change.
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the session file under `cache_dir`.
    pub fn open(cache_dir: &Path) -> Result<Self> {
        let path = cache_dir.join(SESSION_FILE);
        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read session file")?;
            match serde_json::from_str(&contents) {
                Ok(values) => values,
                Err(e) => {
                    warn!(error = %e, "Session file is corrupt, starting without a session");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        debug!(?path, keys = values.len(), "Session file opened");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if values.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove session file")?;
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")?;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|_| anyhow!("session file lock poisoned"))?;
        Ok(values.get(key.as_str()).cloned())
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("session file lock poisoned"))?;
        values.insert(key.as_str().to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("session file lock poisoned"))?;
        if values.remove(key.as_str()).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}

/// OS keychain, one entry per key.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: StoreKey) -> Result<Entry> {
        Entry::new(&self.service, key.as_str()).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for KeyringStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read session value from keychain"),
        }
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store session value in keychain")
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session value from keychain"),
        }
    }
}

// ============================================================================
// Typed facade
// ============================================================================

/// Everything persisted about the current session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Typed access to a [`SessionStore`]. Clone is cheap.
#[derive(Clone)]
pub struct SessionStorage {
    store: Arc<dyn SessionStore>,
}

impl SessionStorage {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        self.store.get(StoreKey::AccessToken)
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.store.get(StoreKey::RefreshToken)
    }

    /// Last persisted user snapshot. An unreadable snapshot counts as absent.
    pub fn user(&self) -> Result<Option<User>> {
        let Some(raw) = self.store.get(StoreKey::User)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "Stored user snapshot is unreadable");
                Ok(None)
            }
        }
    }

    pub fn load(&self) -> Result<Session> {
        Ok(Session {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
            user: self.user()?,
        })
    }

    pub fn set_access_token(&self, token: &str) -> Result<()> {
        self.store.set(StoreKey::AccessToken, token)
    }

    pub fn set_refresh_token(&self, token: &str) -> Result<()> {
        self.store.set(StoreKey::RefreshToken, token)
    }

    pub fn save_user(&self, user: &User) -> Result<()> {
        let json = serde_json::to_string(user).context("Failed to serialize user snapshot")?;
        self.store.set(StoreKey::User, &json)
    }

    /// Persist the token pair and user from a login or register response.
    pub fn save_login(&self, auth: &AuthResponse) -> Result<()> {
        self.store.set(StoreKey::AccessToken, &auth.tokens.access)?;
        self.store.set(StoreKey::RefreshToken, &auth.tokens.refresh)?;
        self.save_user(&auth.user)
    }

    /// Remove all three keys. Every key is attempted; the first failure is returned.
    pub fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for key in StoreKey::ALL {
            if let Err(e) = self.store.remove(key) {
                warn!(key = key.as_str(), error = %e, "Failed to clear session key");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
