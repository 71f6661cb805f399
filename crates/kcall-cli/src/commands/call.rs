//! Call command implementation.
//!
//! Branches into a kernel address with the given arguments. A wrong address
//! or signature crashes the process (or the device), so the command refuses
//! to run without `--yes`.

use anyhow::{Result, bail};
use kcall_core::{KcallConfig, KernelCaller, KernelFunctionLocator};
use owo_colors::OwoColorize;
use tracing::warn;

use super::hex_utils::{parse_hex_address, parse_u64};

/// Run the call command
pub fn run(config: &KcallConfig, address: &str, args: &[String], confirmed: bool) -> Result<()> {
    let address = parse_hex_address(address)?;
    let args = args
        .iter()
        .map(|arg| parse_u64(arg))
        .collect::<Result<Vec<_>>>()?;

    let locator = KernelFunctionLocator::new(None, config);
    locator.initialize()?;
    if !locator.is_valid_address(address) {
        warn!(
            "0x{:X} is outside the kernel range {}",
            address,
            locator.bounds().unwrap_or_default()
        );
    }

    if !confirmed {
        bail!(
            "Refusing to call 0x{:X} without --yes (a bad address terminates the process)",
            address
        );
    }

    let caller = KernelCaller::new(None);
    caller.initialize()?;

    let _context = caller.context()?;
    // SAFETY: the user confirmed the target; there is no way to verify it
    let result = unsafe { caller.call(address, &args)? };

    println!("0x{:X} returned {}", address, format!("0x{:X}", result).green());
    Ok(())
}
