//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! API endpoint, session storage backend, request timeout, and the last
//! used login email.
//!
//! Configuration is stored at `~/.config/socialistic/config.json`.
//! `SOCIALISTIC_API_URL` and `SOCIALISTIC_STORAGE` override the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::client::DEFAULT_TIMEOUT_SECS;
use crate::auth::{FileStore, KeyringStore, MemoryStore, SessionStorage};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "socialistic";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// API used when nothing is configured (local development server).
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

pub const API_URL_ENV: &str = "SOCIALISTIC_API_URL";
pub const STORAGE_ENV: &str = "SOCIALISTIC_STORAGE";

/// Where session credentials are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `session.json` in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Not persisted
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub storage: StorageBackend,
    pub request_timeout_secs: Option<u64>,
    pub last_email: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment overrides. Invalid values are logged and ignored.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = Some(url);
            }
        }
        if let Ok(storage) = std::env::var(STORAGE_ENV) {
            match storage.parse() {
                Ok(backend) => self.storage = backend,
                Err(e) => warn!(error = %e, "Ignoring {}", STORAGE_ENV),
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn api_base_url(&self) -> String {
        self.api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
            .filter(|&secs| secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    /// Open the configured session store.
    pub fn open_storage(&self) -> Result<SessionStorage> {
        let storage = match self.storage {
            StorageBackend::File => {
                let cache_dir = self.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
                SessionStorage::new(Arc::new(FileStore::open(&cache_dir)?))
            }
            StorageBackend::Keyring => SessionStorage::new(Arc::new(KeyringStore::new())),
            StorageBackend::Memory => SessionStorage::new(Arc::new(MemoryStore::new())),
        };
        Ok(storage)
    }
}
