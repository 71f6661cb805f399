//! Resolution strategies consulted by the locator, in order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::KernelBounds;
use crate::backend::PrivilegeBackend;
use crate::error::{Error, Result};
use crate::pattern::SignaturePattern;
use crate::symbols::SymbolSource;

/// Where a cached address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionSource {
    Backend,
    SymbolTable,
    SignatureScan,
    /// Inserted directly through `cache_address`.
    Manual,
    /// Loaded from a persisted cache file.
    Persisted,
}

/// One step of the resolution cascade.
///
/// Implementations report failure through `Err`; the locator logs and
/// swallows those errors and moves to the next strategy. A returned address
/// is re-checked against the kernel bounds before it is cached.
pub trait SymbolResolver: Send + Sync {
    fn source(&self) -> ResolutionSource;

    fn try_resolve(&self, name: &str, pattern: &SignaturePattern, bounds: &KernelBounds)
    -> Result<u64>;
}

/// Asks the privilege backend's own symbol lookup.
pub struct BackendResolver {
    backend: Arc<dyn PrivilegeBackend>,
}

impl BackendResolver {
    pub fn new(backend: Arc<dyn PrivilegeBackend>) -> Self {
        Self { backend }
    }
}

impl SymbolResolver for BackendResolver {
    fn source(&self) -> ResolutionSource {
        ResolutionSource::Backend
    }

    fn try_resolve(
        &self,
        name: &str,
        _pattern: &SignaturePattern,
        bounds: &KernelBounds,
    ) -> Result<u64> {
        if !self.backend.is_available() {
            return Err(Error::BackendUnavailable(self.backend.name().to_string()));
        }

        match self.backend.lookup_symbol(name) {
            0 => Err(Error::NotFound(format!(
                "'{}' not found via {}",
                name,
                self.backend.name()
            ))),
            address if !bounds.contains(address) => Err(Error::invalid_address(
                address,
                format!("{} returned an address outside the kernel", self.backend.name()),
            )),
            address => Ok(address),
        }
    }
}

/// Exact-name search through a textual symbol listing.
pub struct SymbolTableResolver {
    source: SymbolSource,
}

impl SymbolTableResolver {
    pub fn new(source: SymbolSource) -> Self {
        Self { source }
    }
}

impl SymbolResolver for SymbolTableResolver {
    fn source(&self) -> ResolutionSource {
        ResolutionSource::SymbolTable
    }

    fn try_resolve(
        &self,
        name: &str,
        _pattern: &SignaturePattern,
        bounds: &KernelBounds,
    ) -> Result<u64> {
        self.source
            .find(name, |address| bounds.contains(address))?
            .map(|entry| entry.address)
            .ok_or_else(|| Error::NotFound(format!("'{}' not found in symbol table", name)))
    }
}

/// Placeholder for scanning live kernel text with the caller's pattern.
///
/// There is no primitive for reading the whole kernel image, so this step
/// always reports [`Error::NotImplemented`].
pub struct SignatureScanResolver;

impl SymbolResolver for SignatureScanResolver {
    fn source(&self) -> ResolutionSource {
        ResolutionSource::SignatureScan
    }

    fn try_resolve(
        &self,
        name: &str,
        pattern: &SignaturePattern,
        _bounds: &KernelBounds,
    ) -> Result<u64> {
        Err(Error::NotImplemented(format!(
            "signature scan of kernel memory for '{}' [{}]",
            name, pattern
        )))
    }
}
