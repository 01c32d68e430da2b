use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{Page, Post, ProgrammingLanguage};

/// Consider cache stale after 1 hour.
const CACHE_STALE_MINUTES: i64 = 60;

const LANGUAGES_CACHE: &str = "programming_languages";
const FEED_CACHE: &str = "feed";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    /// Human readable age: "just now", "12m ago", "3h ago", "2d ago".
    pub fn age_display(&self) -> String {
        match self.age_minutes() {
            // Negative ages come from clock skew
            m if m < 1 => "just now".to_string(),
            m if m < 60 => format!("{}m ago", m),
            m if m < 1440 => format!("{}h ago", (m + 30) / 60),
            m => format!("{}d ago", (m + 720) / 1440),
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

/// JSON files under the cache directory, one per cached item.
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(self.cache_path(name), contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        debug!(cache = name, "Cache updated");
        Ok(())
    }

    // ===== Programming languages =====

    pub fn load_languages(&self) -> Result<Option<CachedData<Vec<ProgrammingLanguage>>>> {
        self.load(LANGUAGES_CACHE)
    }

    pub fn save_languages(&self, languages: &[ProgrammingLanguage]) -> Result<()> {
        self.save(LANGUAGES_CACHE, &languages)
    }

    /// Cached languages if present and fresh.
    pub fn fresh_languages(&self) -> Option<Vec<ProgrammingLanguage>> {
        match self.load_languages() {
            Ok(Some(cached)) if !cached.is_stale() => Some(cached.data),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "Failed to load language cache");
                None
            }
        }
    }

    // ===== Feed =====

    pub fn load_feed(&self) -> Result<Option<CachedData<Page<Post>>>> {
        self.load(FEED_CACHE)
    }

    pub fn save_feed(&self, page: &Page<Post>) -> Result<()> {
        self.save(FEED_CACHE, page)
    }

    /// Remove everything cached. Used on logout so the next user starts clean.
    pub fn clear(&self) -> Result<()> {
        for name in [LANGUAGES_CACHE, FEED_CACHE] {
            let path = self.cache_path(name);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove cache file: {}", name))?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
