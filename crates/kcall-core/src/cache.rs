//! Persisted address cache
//!
//! Saves resolved kernel addresses to a file and reuses them on later runs,
//! skipping the resolution cascade while the running kernel is unchanged.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::locator::{CacheEntry, KernelFunctionLocator, ResolutionSource};

/// Kernel release identifier on Linux.
pub const OSRELEASE_PATH: &str = "/proc/sys/kernel/osrelease";

/// Cache file format version; files with another version are ignored.
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressCache {
    pub format_version: u32,
    /// Kernel release the addresses were resolved on (e.g. "5.10.198-android12-9")
    pub kernel_release: String,
    pub entries: BTreeMap<String, CacheEntry>,
    pub created_at: DateTime<Utc>,
}

impl AddressCache {
    pub fn new<S: Into<String>>(kernel_release: S) -> Self {
        Self {
            format_version: CACHE_FORMAT_VERSION,
            kernel_release: kernel_release.into(),
            entries: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Snapshot every address the locator has resolved.
    pub fn from_locator<S: Into<String>>(kernel_release: S, locator: &KernelFunctionLocator) -> Self {
        let mut cache = Self::new(kernel_release);
        cache.entries.extend(locator.cached_entries());
        cache
    }

    /// Load cache from a specific path
    ///
    /// Missing or corrupt files yield `None`.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();

        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                debug!("Address cache not found or unreadable: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<AddressCache>(&content) {
            Ok(cache) => {
                debug!(
                    "Loaded address cache: release={}, entries={}, created_at={}",
                    cache.kernel_release,
                    cache.entries.len(),
                    cache.created_at
                );
                Some(cache)
            }
            Err(e) => {
                warn!("Failed to parse address cache {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)?;
        info!(
            "Saved {} cached addresses to {}",
            self.entries.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Check the cache was written for `kernel_release` and is recent enough
    pub fn is_valid_for(&self, kernel_release: &str, max_age: Duration) -> bool {
        if self.format_version != CACHE_FORMAT_VERSION {
            debug!(
                "Address cache format mismatch: cached={}, current={}",
                self.format_version, CACHE_FORMAT_VERSION
            );
            return false;
        }

        if self.kernel_release != kernel_release {
            debug!(
                "Kernel release mismatch: cached={}, current={}",
                self.kernel_release, kernel_release
            );
            return false;
        }

        let age = self.age();
        if age > max_age {
            debug!("Address cache expired: age={}s", age.as_secs());
            return false;
        }

        true
    }

    /// Copy entries into the locator cache.
    ///
    /// Entries outside the locator's bounds (or every entry, before the
    /// locator is initialized) are skipped. Returns the number primed.
    pub fn prime(&self, locator: &KernelFunctionLocator) -> usize {
        let mut primed = 0;
        for (name, entry) in &self.entries {
            if !locator.is_valid_address(entry.address) {
                debug!("Skipping cached {} at 0x{:X}: outside kernel range", name, entry.address);
                continue;
            }
            locator.insert_entry(
                name,
                CacheEntry {
                    source: ResolutionSource::Persisted,
                    ..*entry
                },
            );
            primed += 1;
        }
        primed
    }
}

/// Current kernel release, if readable.
pub fn current_kernel_release() -> Option<String> {
    fs::read_to_string(OSRELEASE_PATH)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Load `path` and prime `locator` if the cache matches the running kernel.
pub fn try_prime_from_path<P: AsRef<Path>>(
    path: P,
    kernel_release: &str,
    max_age: Duration,
    locator: &KernelFunctionLocator,
) -> usize {
    let Some(cache) = AddressCache::load_from_path(path) else {
        return 0;
    };

    if !cache.is_valid_for(kernel_release, max_age) {
        return 0;
    }

    let primed = cache.prime(locator);
    info!(
        "Using {} cached addresses (release: {}, age: {}s)",
        primed,
        cache.kernel_release,
        cache.age().as_secs()
    );
    primed
}
