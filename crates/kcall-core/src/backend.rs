//! Privilege backends.
//!
//! A backend is whatever grants elevated access to kernel memory and symbols
//! (a root provider library, a driver, a test double). The locator and the
//! call bridge receive a backend handle at construction time; nothing in this
//! crate keeps global backend state.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};

pub trait PrivilegeBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Resolve a kernel symbol; 0 means "not found".
    fn lookup_symbol(&self, name: &str) -> u64;

    fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>>;

    /// Returns the number of bytes written.
    fn write_memory(&self, address: u64, data: &[u8]) -> Result<usize>;

    /// Backend-specific setup before a sequence of privileged calls.
    fn prepare_call_context(&self) -> Result<()> {
        Ok(())
    }

    /// Reverts [`PrivilegeBackend::prepare_call_context`].
    fn cleanup_call_context(&self) {}
}

/// Backends in fixed preference order.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    providers: Vec<Arc<dyn PrivilegeBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider; earlier registrations are preferred.
    pub fn register(&mut self, provider: Arc<dyn PrivilegeBackend>) -> &mut Self {
        self.providers.push(provider);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// First provider that reports itself available.
    pub fn select(&self) -> Result<Arc<dyn PrivilegeBackend>> {
        for provider in &self.providers {
            if provider.is_available() {
                debug!("Selected privilege backend '{}'", provider.name());
                return Ok(Arc::clone(provider));
            }
            debug!("Privilege backend '{}' is not available", provider.name());
        }

        Err(Error::BackendUnavailable(if self.providers.is_empty() {
            "no backends registered".to_string()
        } else {
            format!("none of [{}] is available", self.names().join(", "))
        }))
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    #[test]
    fn test_select_first_available() {
        let mut registry = BackendRegistry::new();
        registry
            .register(Arc::new(MockBackend::unavailable("magisk")))
            .register(Arc::new(MockBackend::new("skroot")))
            .register(Arc::new(MockBackend::new("fallback")));

        let selected = registry.select().unwrap();
        assert_eq!(selected.name(), "skroot");
        assert_eq!(registry.names(), vec!["magisk", "skroot", "fallback"]);
    }

    #[test]
    fn test_select_none_available() {
        let mut registry = BackendRegistry::new();
        registry.register(Arc::new(MockBackend::unavailable("magisk")));

        let Err(err) = registry.select() else {
            panic!("expected BackendUnavailable");
        };
        assert!(matches!(err, Error::BackendUnavailable(_)));
        assert!(err.to_string().contains("magisk"));
    }

    #[test]
    fn test_select_empty_registry() {
        let registry = BackendRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(registry.select(), Err(Error::BackendUnavailable(_))));
    }

    struct SymbolsOnly;

    impl PrivilegeBackend for SymbolsOnly {
        fn name(&self) -> &str {
            "symbols-only"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn lookup_symbol(&self, _name: &str) -> u64 {
            0
        }

        fn read_memory(&self, address: u64, _len: usize) -> Result<Vec<u8>> {
            Err(Error::invalid_address(address, "reads unsupported"))
        }

        fn write_memory(&self, address: u64, _data: &[u8]) -> Result<usize> {
            Err(Error::invalid_address(address, "writes unsupported"))
        }
    }

    #[test]
    fn test_default_context_hooks_are_noops() {
        let backend = SymbolsOnly;
        assert!(backend.prepare_call_context().is_ok());
        backend.cleanup_call_context();
    }

    #[test]
    fn test_mock_memory_roundtrip() {
        let backend = MockBackend::new("mem");
        assert_eq!(backend.write_memory(0x1000, &[1, 2, 3]).unwrap(), 3);
        assert_eq!(backend.read_memory(0x1000, 3).unwrap(), vec![1, 2, 3]);
        assert!(backend.read_memory(0x1002, 2).is_err());
    }
}
