//! Kernel function locator.
//!
//! Resolves a function name to a kernel address through an ordered cascade:
//!
//! 1. the in-process cache,
//! 2. the privilege backend's symbol lookup,
//! 3. the textual symbol table,
//! 4. a signature scan (reserved, reports `NotImplemented`).
//!
//! Every address that leaves a strategy is checked against the kernel bounds
//! before it is cached. Failures are never cached, so a later call retries
//! the whole cascade.
//!
//! ## Example
//!
//! ```ignore
//! use kcall_core::{KernelFunctionLocator, KcallConfig, SignaturePattern};
//!
//! let locator = KernelFunctionLocator::new(None, &KcallConfig::default());
//! locator.initialize()?;
//!
//! let pattern = SignaturePattern::from_hex("FD 7B ?? A9", None);
//! let commit_creds = locator.locate("commit_creds", &pattern)?;
//! ```

mod bounds;
mod resolver;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::PrivilegeBackend;
use crate::config::KcallConfig;
use crate::error::{Error, Result};
use crate::pattern::SignaturePattern;
use crate::symbols::SymbolSource;

pub use bounds::*;
pub use resolver::*;

/// A resolved address together with how and when it was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub address: u64,
    pub resolved_at: DateTime<Utc>,
    pub source: ResolutionSource,
}

impl CacheEntry {
    pub fn new(address: u64, source: ResolutionSource) -> Self {
        Self {
            address,
            resolved_at: Utc::now(),
            source,
        }
    }
}

/// Observable per-name resolution state.
///
/// A failed resolution returns the name to `Unresolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    Resolving,
    Resolved(u64),
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Resolving,
    Resolved(CacheEntry),
}

pub struct KernelFunctionLocator {
    symbols: SymbolSource,
    fallback_bounds: KernelBounds,
    bounds: OnceLock<KernelBounds>,
    resolvers: Vec<Box<dyn SymbolResolver>>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl KernelFunctionLocator {
    /// Standard cascade: backend (when given), symbol table, signature scan.
    pub fn new(backend: Option<Arc<dyn PrivilegeBackend>>, config: &KcallConfig) -> Self {
        let symbols = config.symbol_source();
        let mut resolvers: Vec<Box<dyn SymbolResolver>> = Vec::new();
        if let Some(backend) = backend {
            resolvers.push(Box::new(BackendResolver::new(backend)));
        }
        resolvers.push(Box::new(SymbolTableResolver::new(symbols.clone())));
        resolvers.push(Box::new(SignatureScanResolver));

        Self::with_resolvers(symbols, config.fallback_bounds, resolvers)
    }

    /// Locator with a custom strategy list.
    ///
    /// `symbols` is only used by [`initialize`](Self::initialize) to derive
    /// the kernel bounds.
    pub fn with_resolvers(
        symbols: SymbolSource,
        fallback_bounds: KernelBounds,
        resolvers: Vec<Box<dyn SymbolResolver>>,
    ) -> Self {
        Self {
            symbols,
            fallback_bounds,
            bounds: OnceLock::new(),
            resolvers,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Establish the kernel address bounds. Later calls are no-ops.
    pub fn initialize(&self) -> Result<()> {
        if self.bounds.get().is_some() {
            return Ok(());
        }

        let derived = match self.symbols.address_range() {
            Ok(Some((min, max))) if max > min => Some(KernelBounds::from_range(min, max)),
            Ok(_) => {
                warn!("Symbol listing has no usable addresses, using default kernel range");
                None
            }
            Err(e) => {
                warn!("Symbol listing unavailable ({}), using default kernel range", e);
                None
            }
        };

        let bounds = *self
            .bounds
            .get_or_init(|| derived.unwrap_or(self.fallback_bounds));
        info!("Kernel address range: {}", bounds);
        Ok(())
    }

    pub fn bounds(&self) -> Option<KernelBounds> {
        self.bounds.get().copied()
    }

    pub fn kernel_base(&self) -> u64 {
        self.bounds().map_or(0, |b| b.base)
    }

    pub fn kernel_size(&self) -> u64 {
        self.bounds().map_or(0, |b| b.size)
    }

    /// Whether `address` lies inside the kernel bounds.
    ///
    /// Always false before initialization.
    pub fn is_valid_address(&self, address: u64) -> bool {
        self.bounds.get().is_some_and(|b| b.contains(address))
    }

    /// Resolve `name`, consulting the cache first.
    pub fn locate(&self, name: &str, pattern: &SignaturePattern) -> Result<u64> {
        let bounds = self
            .bounds()
            .ok_or(Error::NotInitialized("KernelFunctionLocator"))?;

        if let Some(address) = self.cached(name) {
            debug!("{}: cache hit 0x{:X}", name, address);
            return Ok(address);
        }

        if !pattern.is_valid() {
            return Err(Error::InvalidPattern(format!(
                "pattern for '{}' is empty or all wildcards",
                name
            )));
        }

        self.begin_resolving(name);

        for resolver in &self.resolvers {
            let source = resolver.source();
            match resolver.try_resolve(name, pattern, &bounds) {
                Ok(address) if bounds.contains(address) => {
                    let entry = self.finish_resolved(name, CacheEntry::new(address, source));
                    info!("{}: resolved 0x{:X} via {}", name, entry.address, entry.source);
                    return Ok(entry.address);
                }
                Ok(address) => {
                    debug!(
                        "{}: {} returned 0x{:X} outside {}, ignoring",
                        name, source, address, bounds
                    );
                }
                Err(e) => {
                    debug!("{}: {} failed: {}", name, source, e);
                }
            }
        }

        self.abandon_resolving(name);
        Err(Error::NotFound(format!(
            "Function '{}' not found (tried {} strategies)",
            name,
            self.resolvers.len()
        )))
    }

    /// Insert an address directly, replacing any previous entry.
    pub fn cache_address(&self, name: &str, address: u64) {
        self.insert_entry(name, CacheEntry::new(address, ResolutionSource::Manual));
    }

    pub(crate) fn insert_entry(&self, name: &str, entry: CacheEntry) {
        self.lock_slots()
            .insert(name.to_string(), Slot::Resolved(entry));
    }

    pub fn cached(&self, name: &str) -> Option<u64> {
        self.cached_entry(name).map(|entry| entry.address)
    }

    pub fn cached_entry(&self, name: &str) -> Option<CacheEntry> {
        match self.lock_slots().get(name) {
            Some(Slot::Resolved(entry)) => Some(*entry),
            _ => None,
        }
    }

    /// Snapshot of every resolved entry, sorted by name.
    pub fn cached_entries(&self) -> Vec<(String, CacheEntry)> {
        let mut entries: Vec<(String, CacheEntry)> = self
            .lock_slots()
            .iter()
            .filter_map(|(name, slot)| match slot {
                Slot::Resolved(entry) => Some((name.clone(), *entry)),
                Slot::Resolving => None,
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn state(&self, name: &str) -> ResolutionState {
        match self.lock_slots().get(name) {
            Some(Slot::Resolved(entry)) => ResolutionState::Resolved(entry.address),
            Some(Slot::Resolving) => ResolutionState::Resolving,
            None => ResolutionState::Unresolved,
        }
    }

    fn begin_resolving(&self, name: &str) {
        self.lock_slots()
            .entry(name.to_string())
            .or_insert(Slot::Resolving);
    }

    /// Record a result unless another caller resolved the name first.
    fn finish_resolved(&self, name: &str, entry: CacheEntry) -> CacheEntry {
        let mut slots = self.lock_slots();
        let slot = slots.entry(name.to_string()).or_insert(Slot::Resolving);
        match slot {
            Slot::Resolved(existing) => *existing,
            Slot::Resolving => {
                *slot = Slot::Resolved(entry);
                entry
            }
        }
    }

    fn abandon_resolving(&self, name: &str) {
        let mut slots = self.lock_slots();
        if matches!(slots.get(name), Some(Slot::Resolving)) {
            slots.remove(name);
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}
