//! TOML configuration file.
//!
//! ```toml
//! kallsyms_path = "/proc/kallsyms"
//! cache_path = "/data/local/tmp/kcall-cache.json"
//! cache_max_age_secs = 86400
//! kernel_base = "0xFFFFFF8000000000"
//! kernel_size = "0x100000000"
//!
//! [[signatures]]
//! name = "commit_creds"
//! pattern = "FD 7B ?? A9 FD 03 00 91"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use kcall_core::{FunctionSignature, KcallConfig, KernelBounds};
use serde::Deserialize;

use crate::commands::hex_utils::parse_hex_address;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub kallsyms_path: Option<PathBuf>,
    pub cache_path: Option<PathBuf>,
    pub cache_max_age_secs: Option<u64>,
    /// Hex strings; TOML integers cannot hold kernel addresses
    pub kernel_base: Option<String>,
    pub kernel_size: Option<String>,
    pub signatures: Vec<FunctionSignature>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Merge into a library configuration; `kallsyms` overrides the file.
    pub fn into_config(self, kallsyms: Option<PathBuf>) -> Result<KcallConfig> {
        let mut builder = KcallConfig::builder().signatures(self.signatures);

        if let Some(path) = kallsyms.or(self.kallsyms_path) {
            builder = builder.kallsyms_path(path);
        }
        if let Some(path) = self.cache_path {
            builder = builder.cache_path(path);
        }
        if let Some(secs) = self.cache_max_age_secs {
            builder = builder.cache_max_age(Duration::from_secs(secs));
        }

        let defaults = KernelBounds::default();
        let base = self
            .kernel_base
            .as_deref()
            .map(parse_hex_address)
            .transpose()
            .context("kernel_base")?
            .unwrap_or(defaults.base);
        let size = self
            .kernel_size
            .as_deref()
            .map(parse_hex_address)
            .transpose()
            .context("kernel_size")?
            .unwrap_or(defaults.size);

        Ok(builder.fallback_bounds(KernelBounds::new(base, size)).build())
    }
}

/// Load the config file if given, then apply command-line overrides.
pub fn load(path: Option<&Path>, kallsyms: Option<PathBuf>) -> Result<KcallConfig> {
    let file = match path {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    file.into_config(kallsyms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kcall_core::SymbolSource;
    use tempfile::TempDir;

    #[test]
    fn test_load_full_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kcall.toml");
        fs::write(
            &path,
            r#"
kallsyms_path = "/data/local/tmp/kallsyms.txt"
cache_path = "/data/local/tmp/cache.json"
cache_max_age_secs = 60
kernel_base = "0xFFFFFFC008000000"
kernel_size = "0x4000000"

[[signatures]]
name = "commit_creds"
pattern = "FD 7B ?? A9"
alignment = 4
"#,
        )
        .unwrap();

        let config = load(Some(&path), None).unwrap();
        assert_eq!(config.symbols, SymbolSource::file("/data/local/tmp/kallsyms.txt"));
        assert_eq!(config.cache_max_age, Duration::from_secs(60));
        assert_eq!(
            config.fallback_bounds,
            KernelBounds::new(0xFFFF_FFC0_0800_0000, 0x400_0000)
        );
        let signature = config.signature("commit_creds").unwrap();
        assert!(signature.to_pattern().is_valid());
    }

    #[test]
    fn test_command_line_overrides_kallsyms() {
        let file = FileConfig {
            kallsyms_path: Some(PathBuf::from("/from/file")),
            ..Default::default()
        };
        let config = file.into_config(Some(PathBuf::from("/from/cli"))).unwrap();
        assert_eq!(config.symbols, SymbolSource::file("/from/cli"));
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load(None, None).unwrap();
        assert_eq!(config.fallback_bounds, KernelBounds::default());
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn test_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kcall.toml");

        fs::write(&path, "kernel_base = \"not-hex\"\n").unwrap();
        assert!(load(Some(&path), None).is_err());

        fs::write(&path, "unknown_key = 1\n").unwrap();
        assert!(load(Some(&path), None).is_err());

        assert!(load(Some(&dir.path().join("missing.toml")), None).is_err());
    }
}
