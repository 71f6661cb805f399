//! Code synthesis commands: `jump`, `trampoline`, `patch-size` and `offset`.

use anyhow::Result;
use kcall_core::codegen::BRANCH_RANGE;
use kcall_core::{JumpKind, branch_target, jump_bytes, jump_kind, minimum_patch_size, trampoline_bytes};
use owo_colors::OwoColorize;

use super::hex_utils::{format_hex_address, format_hex_bytes, parse_hex_address, parse_hex_bytes};

/// Run the jump command
pub fn jump(from: &str, to: &str) -> Result<()> {
    let from_addr = parse_hex_address(from)?;
    let to_addr = parse_hex_address(to)?;

    let kind = jump_kind(from_addr, to_addr);
    let bytes = jump_bytes(from_addr, to_addr);

    println!(
        "Jump {} -> {}: {} ({} bytes)",
        format_hex_address(from_addr),
        format_hex_address(to_addr),
        kind.to_string().cyan(),
        bytes.len()
    );
    println!("  {}", format_hex_bytes(&bytes).green());
    print_words(&bytes);

    if kind == JumpKind::Short {
        let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if let Some(target) = branch_target(from_addr, word) {
            println!("  decodes to B {}", format_hex_address(target));
        }
    }

    Ok(())
}

/// Run the trampoline command
pub fn trampoline(original: &str, return_address: &str) -> Result<()> {
    let original = parse_hex_bytes(original)?;
    let return_addr = parse_hex_address(return_address)?;

    let bytes = trampoline_bytes(&original, return_addr);

    println!(
        "Trampoline ({} original + {} jump bytes) returning to {}:",
        original.len(),
        bytes.len() - original.len(),
        format_hex_address(return_addr)
    );
    println!("  {}", format_hex_bytes(&original).dimmed());
    println!("  {}", format_hex_bytes(&bytes[original.len()..]).green());

    Ok(())
}

/// Run the patch-size command
pub fn patch_size(requested: usize) -> Result<()> {
    println!("{}", minimum_patch_size(requested));
    Ok(())
}

/// Run the offset command
pub fn offset(from: &str, to: &str) -> Result<()> {
    let from_addr = parse_hex_address(from)?;
    let to_addr = parse_hex_address(to)?;
    let distance = i128::from(to_addr) - i128::from(from_addr);
    let kind = jump_kind(from_addr, to_addr);

    println!(
        "{} -> {}: {} ({})",
        format_hex_address(from_addr),
        format_hex_address(to_addr),
        signed_hex(distance).cyan(),
        distance
    );
    println!("  {} jump, {} bytes", kind, kind.size());
    if kind == JumpKind::Short {
        let range = i128::from(BRANCH_RANGE);
        let headroom = if distance < 0 { range + distance } else { range - 1 - distance };
        println!("  {} bytes left before B is out of range", headroom);
    }
    if distance % 4 != 0 {
        println!("  {}", "not instruction aligned".yellow());
    }

    Ok(())
}

fn signed_hex(value: i128) -> String {
    if value < 0 {
        format!("-0x{:X}", value.unsigned_abs())
    } else {
        format!("+0x{:X}", value)
    }
}

fn print_words(bytes: &[u8]) {
    for (i, chunk) in bytes.chunks(4).enumerate() {
        if chunk.len() == 4 {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            println!("  +{:02}: {:08X}", i * 4, word);
        }
    }
}
