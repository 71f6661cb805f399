//! ARM64 branch and trampoline synthesis.
//!
//! Two jump forms are emitted:
//!
//! ```text
//! short (4 bytes):  B     #imm26            ; target within +/-128 MiB
//! long (16 bytes):  LDR   X16, #8
//!                   BR    X16
//!                   .quad <target>
//! ```
//!
//! All functions are free of state and write into caller-owned buffers.

use strum::Display;

use crate::error::{Error, Result};

/// Width of every ARM64 instruction.
pub const INSTRUCTION_WIDTH: usize = 4;

/// Size of the short `B imm26` form.
pub const SHORT_JUMP_SIZE: usize = 4;

/// Size of the `LDR X16, #8; BR X16; .quad target` form.
pub const LONG_JUMP_SIZE: usize = 16;

/// Largest jump this module ever emits.
pub const MAX_JUMP_SIZE: usize = LONG_JUMP_SIZE;

/// Reach of `B imm26`: the displacement must lie in `[-BRANCH_RANGE, BRANCH_RANGE)`.
pub const BRANCH_RANGE: i64 = 0x800_0000;

const B_OPCODE: u32 = 0x1400_0000;
const B_IMM26_MASK: u32 = 0x03FF_FFFF;
/// `LDR X16, #8`
const LDR_X16_LITERAL: u32 = 0x5800_0050;
/// `BR X16`
const BR_X16: u32 = 0xD61F_0200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum JumpKind {
    /// Single relative `B` instruction.
    Short,
    /// Literal load into X16 followed by `BR X16`.
    Long,
}

impl JumpKind {
    pub fn size(self) -> usize {
        match self {
            JumpKind::Short => SHORT_JUMP_SIZE,
            JumpKind::Long => LONG_JUMP_SIZE,
        }
    }
}

/// Signed displacement from `from` to `to`, with two's-complement wrap.
fn displacement(from: u64, to: u64) -> i64 {
    to.wrapping_sub(from) as i64
}

/// Which encoding [`generate_jump`] will pick for this pair of addresses.
pub fn jump_kind(from: u64, to: u64) -> JumpKind {
    if (-BRANCH_RANGE..BRANCH_RANGE).contains(&displacement(from, to)) {
        JumpKind::Short
    } else {
        JumpKind::Long
    }
}

/// Encode a jump placed at `from` that lands on `to` into `out`.
///
/// Returns the number of bytes written (4 or 16). Fails with
/// [`Error::InvalidInput`] if `out` cannot hold the selected form.
pub fn generate_jump(from: u64, to: u64, out: &mut [u8]) -> Result<usize> {
    let kind = jump_kind(from, to);
    ensure_capacity(out, kind.size())?;

    match kind {
        JumpKind::Short => {
            let offset = displacement(from, to);
            let insn = B_OPCODE | (((offset >> 2) as u32) & B_IMM26_MASK);
            out[..4].copy_from_slice(&insn.to_le_bytes());
        }
        JumpKind::Long => {
            out[..4].copy_from_slice(&LDR_X16_LITERAL.to_le_bytes());
            out[4..8].copy_from_slice(&BR_X16.to_le_bytes());
            out[8..16].copy_from_slice(&to.to_le_bytes());
        }
    }

    Ok(kind.size())
}

/// Build a trampoline: `original` verbatim followed by a jump to `return_address`.
///
/// The appended jump is encoded as if it sat at address 0, i.e. relative to
/// the trampoline start rather than to where the copied bytes end. Returns
/// `original.len()` plus the jump size.
pub fn generate_trampoline(original: &[u8], return_address: u64, out: &mut [u8]) -> Result<usize> {
    let jump_size = jump_kind(0, return_address).size();
    ensure_capacity(out, original.len() + jump_size)?;

    out[..original.len()].copy_from_slice(original);
    let written = generate_jump(0, return_address, &mut out[original.len()..])?;
    Ok(original.len() + written)
}

/// Number of bytes to relocate before an inline hook can be installed.
///
/// Rounds up to whole instructions, never below the long jump size.
pub fn minimum_patch_size(requested: usize) -> usize {
    requested
        .checked_next_multiple_of(INSTRUCTION_WIDTH)
        .unwrap_or(usize::MAX - (usize::MAX % INSTRUCTION_WIDTH))
        .max(LONG_JUMP_SIZE)
}

/// Owned variant of [`generate_jump`].
pub fn jump_bytes(from: u64, to: u64) -> Vec<u8> {
    let mut out = [0u8; MAX_JUMP_SIZE];
    let len = match generate_jump(from, to, &mut out) {
        Ok(len) => len,
        // The stack buffer always fits the largest form
        Err(_) => 0,
    };
    out[..len].to_vec()
}

/// Owned variant of [`generate_trampoline`].
pub fn trampoline_bytes(original: &[u8], return_address: u64) -> Vec<u8> {
    let mut out = vec![0u8; original.len() + MAX_JUMP_SIZE];
    let len = generate_trampoline(original, return_address, &mut out).unwrap_or(0);
    out.truncate(len);
    out
}

/// Decode a `B imm26` word placed at `from` back into its target.
///
/// Returns `None` for any other instruction.
pub fn branch_target(from: u64, word: u32) -> Option<u64> {
    if word & !B_IMM26_MASK != B_OPCODE {
        return None;
    }
    // Sign-extend the 26-bit word displacement
    let imm = ((word & B_IMM26_MASK) << 6) as i32 >> 6;
    Some(from.wrapping_add_signed(i64::from(imm) << 2))
}

fn ensure_capacity(out: &[u8], needed: usize) -> Result<()> {
    if out.len() < needed {
        return Err(Error::InvalidInput(format!(
            "output buffer too small: need {} bytes, have {}",
            needed,
            out.len()
        )));
    }
    Ok(())
}
