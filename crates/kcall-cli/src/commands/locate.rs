//! `bounds` and `locate` commands.

use anyhow::{Result, bail};
use kcall_core::{
    AddressCache, KcallConfig, KernelFunctionLocator, SignaturePattern, current_kernel_release,
    try_prime_from_path,
};
use owo_colors::OwoColorize;
use tracing::warn;

/// Run the bounds command
pub fn bounds(config: &KcallConfig) -> Result<()> {
    let locator = KernelFunctionLocator::new(None, config);
    locator.initialize()?;

    println!("Kernel base: 0x{:X}", locator.kernel_base());
    println!("Kernel size: 0x{:X}", locator.kernel_size());
    println!("Kernel end:  0x{:X}", locator.kernel_base().saturating_add(locator.kernel_size()));

    Ok(())
}

/// Run the locate command
pub fn locate(config: &KcallConfig, name: &str, pattern: Option<&str>) -> Result<()> {
    let pattern = match (pattern, config.signature(name)) {
        (Some(hex), _) => SignaturePattern::from_hex(hex, None),
        (None, Some(signature)) => signature.to_pattern(),
        (None, None) => bail!(
            "No signature configured for '{}'; pass --pattern or add one to the config file",
            name
        ),
    };

    let locator = KernelFunctionLocator::new(None, config);
    locator.initialize()?;

    let release = current_kernel_release();
    if let (Some(path), Some(release)) = (&config.cache_path, &release) {
        try_prime_from_path(path, release, config.cache_max_age, &locator);
    }

    let address = locator.locate(name, &pattern)?;
    let source = locator
        .cached_entry(name)
        .map(|entry| entry.source.to_string())
        .unwrap_or_default();
    println!(
        "{} = {} ({})",
        name,
        format!("0x{:X}", address).green(),
        source.dimmed()
    );

    if let Some(path) = &config.cache_path {
        match &release {
            Some(release) => AddressCache::from_locator(release.as_str(), &locator).save_to_path(path)?,
            None => warn!("Kernel release unknown, not saving address cache"),
        }
    }

    Ok(())
}
