//! Scan command implementation.
//!
//! Searches a file (a kernel image, a dump of kernel text) for a byte
//! signature and prints the matching addresses.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use kcall_core::{SignaturePattern, scan_at};
use owo_colors::OwoColorize;

pub struct ScanOptions<'a> {
    pub pattern: &'a str,
    pub mask: Option<&'a str>,
    pub alignment: usize,
    pub base: u64,
    pub limit: usize,
}

/// Run the scan command
pub fn run(path: &Path, options: &ScanOptions<'_>) -> Result<()> {
    let pattern =
        SignaturePattern::from_hex(options.pattern, options.mask).with_alignment(options.alignment);
    if !pattern.is_valid() {
        bail!(
            "Pattern '{}' is empty, malformed or all wildcards",
            options.pattern
        );
    }

    let buffer = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let matches = scan_at(&buffer, options.base, &pattern)?;

    println!(
        "Pattern [{}] in {} ({} bytes, alignment {}):",
        pattern,
        path.display(),
        buffer.len(),
        pattern.alignment()
    );

    if matches.is_empty() {
        println!("  {}", "no matches".yellow());
        return Ok(());
    }

    for address in matches.iter().take(options.limit) {
        println!("  {}", format!("0x{:X}", address).green());
    }
    if matches.len() > options.limit {
        println!("  ... {} more", matches.len() - options.limit);
    }
    println!("{} matches", matches.len());

    Ok(())
}
