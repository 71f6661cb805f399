//! Library configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::locator::KernelBounds;
use crate::pattern::FunctionSignature;
use crate::symbols::{DEFAULT_KALLSYMS_PATH, SymbolSource};

/// Persisted caches older than this are ignored (24 hours).
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct KcallConfig {
    /// Where kernel symbols are read from
    pub symbols: SymbolSource,
    /// Bounds used when the symbol listing yields no usable range
    pub fallback_bounds: KernelBounds,
    /// Persisted address cache; `None` disables it
    pub cache_path: Option<PathBuf>,
    pub cache_max_age: Duration,
    /// Known signatures, keyed by function name
    pub signatures: Vec<FunctionSignature>,
}

impl Default for KcallConfig {
    fn default() -> Self {
        Self {
            symbols: SymbolSource::file(DEFAULT_KALLSYMS_PATH),
            fallback_bounds: KernelBounds::default(),
            cache_path: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            signatures: Vec::new(),
        }
    }
}

impl KcallConfig {
    /// Create a new configuration builder
    pub fn builder() -> KcallConfigBuilder {
        KcallConfigBuilder::default()
    }

    pub fn symbol_source(&self) -> SymbolSource {
        self.symbols.clone()
    }

    pub fn signature(&self, name: &str) -> Option<&FunctionSignature> {
        self.signatures.iter().find(|s| s.name == name)
    }
}

/// Builder for KcallConfig
#[derive(Debug, Clone, Default)]
pub struct KcallConfigBuilder {
    symbols: Option<SymbolSource>,
    fallback_bounds: Option<KernelBounds>,
    cache_path: Option<PathBuf>,
    cache_max_age: Option<Duration>,
    signatures: Vec<FunctionSignature>,
}

impl KcallConfigBuilder {
    /// Read symbols from a kallsyms-format file
    pub fn kallsyms_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.symbols = Some(SymbolSource::File(path.into()));
        self
    }

    /// Use an in-memory symbol listing
    pub fn symbol_text<S: Into<String>>(mut self, text: S) -> Self {
        self.symbols = Some(SymbolSource::text(text));
        self
    }

    /// Disable the symbol table entirely
    pub fn no_symbols(mut self) -> Self {
        self.symbols = Some(SymbolSource::None);
        self
    }

    pub fn fallback_bounds(mut self, bounds: KernelBounds) -> Self {
        self.fallback_bounds = Some(bounds);
        self
    }

    pub fn cache_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn cache_max_age(mut self, age: Duration) -> Self {
        self.cache_max_age = Some(age);
        self
    }

    pub fn signature(mut self, signature: FunctionSignature) -> Self {
        self.signatures.push(signature);
        self
    }

    pub fn signatures<I: IntoIterator<Item = FunctionSignature>>(mut self, signatures: I) -> Self {
        self.signatures.extend(signatures);
        self
    }

    /// Build the configuration
    pub fn build(self) -> KcallConfig {
        let default = KcallConfig::default();
        KcallConfig {
            symbols: self.symbols.unwrap_or(default.symbols),
            fallback_bounds: self.fallback_bounds.unwrap_or(default.fallback_bounds),
            cache_path: self.cache_path.or(default.cache_path),
            cache_max_age: self.cache_max_age.unwrap_or(default.cache_max_age),
            signatures: self.signatures,
        }
    }
}
