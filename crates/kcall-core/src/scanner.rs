//! Signature scanning over in-memory buffers.
//!
//! The scanner is stateless. Candidate offsets are produced with `memchr` on
//! the first fixed byte of the pattern, then filtered by alignment and the
//! full masked comparison.

use memchr::memchr_iter;
use tracing::trace;

use crate::error::{Error, Result};
use crate::pattern::SignaturePattern;

/// Find every aligned offset in `buffer` where `pattern` matches.
///
/// Offsets are relative to the start of the buffer and returned in ascending
/// order. An empty result is a successful scan.
pub fn scan(buffer: Option<&[u8]>, pattern: &SignaturePattern) -> Result<Vec<usize>> {
    let buffer = buffer.ok_or_else(|| Error::InvalidInput("Buffer is absent".to_string()))?;
    check_inputs(buffer, pattern)?;

    let size = pattern.size();
    let alignment = pattern.alignment();
    let last = buffer.len() - size;
    // A valid pattern always has at least one fixed byte
    let anchor = pattern.first_fixed().unwrap_or(0);
    let needle = pattern.bytes()[anchor];

    let haystack = &buffer[anchor..=last + anchor];
    let results: Vec<usize> = memchr_iter(needle, haystack)
        .filter(|offset| offset % alignment == 0)
        .filter(|&offset| pattern.matches(&buffer[offset..offset + size]))
        .collect();

    trace!(
        "Scanned {} bytes for [{}]: {} matches",
        buffer.len(),
        pattern,
        results.len()
    );
    Ok(results)
}

/// First match of `pattern` in `buffer`.
///
/// Always agrees with `scan(..)[0]`; fails with [`Error::NotFound`] when
/// `scan` would return nothing.
pub fn scan_first(buffer: Option<&[u8]>, pattern: &SignaturePattern) -> Result<usize> {
    scan(buffer, pattern)?
        .first()
        .copied()
        .ok_or_else(|| Error::NotFound("Pattern not found in buffer".to_string()))
}

/// Like [`scan`], but reports absolute addresses for a buffer that was read
/// from `base_address`.
pub fn scan_at(buffer: &[u8], base_address: u64, pattern: &SignaturePattern) -> Result<Vec<u64>> {
    Ok(scan(Some(buffer), pattern)?
        .into_iter()
        .map(|offset| base_address.wrapping_add(offset as u64))
        .collect())
}

fn check_inputs(buffer: &[u8], pattern: &SignaturePattern) -> Result<()> {
    if !pattern.is_valid() {
        return Err(Error::InvalidPattern(
            "pattern is empty or has no fixed bytes".to_string(),
        ));
    }
    if pattern.size() > buffer.len() {
        return Err(Error::PatternTooLarge {
            pattern: pattern.size(),
            buffer: buffer.len(),
        });
    }
    Ok(())
}
