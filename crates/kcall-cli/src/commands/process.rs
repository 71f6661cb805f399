//! `maps` and `pid` commands.

use anyhow::Result;
use kcall_core::{MemoryRegion, find_process_by_name, is_process_alive, read_maps};
use owo_colors::OwoColorize;

/// Run the maps command
pub fn maps(pid: u32, filter: Option<&str>) -> Result<()> {
    let regions = read_maps(pid)?;
    let shown: Vec<&MemoryRegion> = regions
        .iter()
        .filter(|region| filter.is_none_or(|f| region.path.contains(f)))
        .collect();

    for region in &shown {
        let permissions = if region.is_executable() {
            region.permissions.red().to_string()
        } else if region.is_writable() {
            region.permissions.yellow().to_string()
        } else {
            region.permissions.clone()
        };
        println!(
            "{:016X}-{:016X} {} {:>10X} {}",
            region.start,
            region.end,
            permissions,
            region.size(),
            region.path
        );
    }
    println!("{} of {} regions", shown.len(), regions.len());

    Ok(())
}

/// Run the pid command
pub fn pid(name: &str) -> Result<()> {
    let pid = find_process_by_name(name)?;
    let state = if is_process_alive(pid) { "alive" } else { "exited" };
    println!("{} {}", pid, state.dimmed());
    Ok(())
}
