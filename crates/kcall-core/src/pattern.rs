//! Byte signatures with per-byte masks.
//!
//! Patterns use the usual IDA-style notation: whitespace-separated hex bytes,
//! `??` for a wildcard.
//!
//! ```
//! use kcall_core::SignaturePattern;
//!
//! let pattern = SignaturePattern::from_hex("1F 20 03 D5 ?? ?? ?? ?? C0 03 5F D6", None);
//! assert!(pattern.is_valid());
//! assert_eq!(pattern.size(), 12);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// ARM64 instructions are 4 bytes wide; signatures are matched on that grid.
pub const DEFAULT_ALIGNMENT: usize = 4;

/// A byte template with a relevance mask and an alignment constraint.
///
/// A pattern that failed to parse is represented by the empty pattern
/// rather than an error, so callers can build patterns unconditionally and
/// check [`SignaturePattern::is_valid`] at the point of use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePattern {
    bytes: Vec<u8>,
    mask: Vec<bool>,
    alignment: usize,
}

impl Default for SignaturePattern {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            mask: Vec::new(),
            alignment: DEFAULT_ALIGNMENT,
        }
    }
}

impl SignaturePattern {
    /// Build a pattern from raw bytes and mask.
    ///
    /// Mismatched lengths produce the empty pattern.
    pub fn new(bytes: Vec<u8>, mask: Vec<bool>) -> Self {
        if bytes.len() != mask.len() {
            return Self::default();
        }
        Self {
            bytes,
            mask,
            alignment: DEFAULT_ALIGNMENT,
        }
    }

    /// Parse a pattern from hex notation.
    ///
    /// `??` in `hex` yields a zero byte that is not compared. A non-empty
    /// `mask` string replaces the inferred mask entirely: each token is a hex
    /// byte and any nonzero value means "must match".
    pub fn from_hex(hex: &str, mask: Option<&str>) -> Self {
        let mut bytes = Vec::new();
        let mut inferred = Vec::new();

        for token in hex.split_whitespace() {
            if token == "??" {
                bytes.push(0);
                inferred.push(false);
                continue;
            }
            match parse_hex_byte(token) {
                Some(value) => {
                    bytes.push(value);
                    inferred.push(true);
                }
                None => return Self::default(),
            }
        }

        let mask = match mask.filter(|m| !m.trim().is_empty()) {
            Some(mask) => {
                let mut explicit = Vec::new();
                for token in mask.split_whitespace() {
                    match parse_hex_byte(token) {
                        Some(value) => explicit.push(value != 0),
                        None => return Self::default(),
                    }
                }
                explicit
            }
            None => inferred,
        };

        Self::new(bytes, mask)
    }

    /// Return a copy matched on a different alignment grid.
    ///
    /// An alignment of zero is treated as 1 (every offset).
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment.max(1);
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.bytes.is_empty()
            && self.bytes.len() == self.mask.len()
            && self.mask.iter().any(|&m| m)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Whether `window` (at least `size()` bytes) satisfies every masked byte.
    pub fn matches(&self, window: &[u8]) -> bool {
        if window.len() < self.bytes.len() {
            return false;
        }
        self.bytes
            .iter()
            .zip(&self.mask)
            .zip(window)
            .all(|((expected, &must_match), actual)| !must_match || expected == actual)
    }

    /// Index of the first byte that must match, if any.
    pub(crate) fn first_fixed(&self) -> Option<usize> {
        self.mask.iter().position(|&m| m)
    }
}

impl fmt::Display for SignaturePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (byte, must_match) in self.bytes.iter().zip(&self.mask) {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            if *must_match {
                write!(f, "{:02X}", byte)?;
            } else {
                f.write_str("??")?;
            }
        }
        Ok(())
    }
}

fn parse_hex_byte(token: &str) -> Option<u8> {
    if token.is_empty() || token.len() > 2 {
        return None;
    }
    u8::from_str_radix(token, 16).ok()
}

/// A named signature as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<usize>,
}

impl FunctionSignature {
    pub fn to_pattern(&self) -> SignaturePattern {
        let pattern = SignaturePattern::from_hex(&self.pattern, self.mask.as_deref());
        match self.alignment {
            Some(alignment) => pattern.with_alignment(alignment),
            None => pattern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_pattern() {
        let pattern = SignaturePattern::from_hex("1F 20 03 D5", None);
        assert_eq!(pattern.bytes(), &[0x1F, 0x20, 0x03, 0xD5]);
        assert_eq!(pattern.mask(), &[true, true, true, true]);
        assert_eq!(pattern.alignment(), 4);
        assert!(pattern.is_valid());
    }

    #[test]
    fn test_parse_pattern_with_wildcards() {
        let pattern = SignaturePattern::from_hex("1F 20 ?? D5", None);
        assert_eq!(pattern.bytes()[2], 0);
        assert_eq!(pattern.mask(), &[true, true, false, true]);
        assert!(pattern.is_valid());
    }

    #[test]
    fn test_all_wildcards_is_invalid() {
        let pattern = SignaturePattern::from_hex("?? ?? ?? ??", None);
        assert_eq!(pattern.size(), 4);
        assert!(!pattern.is_valid());
    }

    #[test]
    fn test_mask_string_overrides_wildcards() {
        let pattern = SignaturePattern::from_hex(
            "1F 20 03 D5 00 00 00 00 C0 03 5F D6",
            Some("FF FF FF FF 00 00 00 00 FF FF FF FF"),
        );
        assert!(pattern.is_valid());
        assert_eq!(&pattern.mask()[..4], &[true; 4]);
        assert_eq!(&pattern.mask()[4..8], &[false; 4]);

        // Explicit mask can also re-enable a "??" position (compared against 0)
        let pattern = SignaturePattern::from_hex("?? 20", Some("01 00"));
        assert_eq!(pattern.mask(), &[true, false]);
    }

    #[test]
    fn test_invalid_tokens_yield_empty_pattern() {
        assert_eq!(SignaturePattern::from_hex("1F ZZ", None).size(), 0);
        assert_eq!(SignaturePattern::from_hex("1F 200", None).size(), 0);
        assert_eq!(SignaturePattern::from_hex("1F 20", Some("FF XX")).size(), 0);
        assert!(!SignaturePattern::from_hex("", None).is_valid());
    }

    #[test]
    fn test_mask_length_mismatch_yields_empty_pattern() {
        let pattern = SignaturePattern::from_hex("1F 20 03", Some("FF FF"));
        assert_eq!(pattern.size(), 0);
        assert!(pattern.mask().is_empty());
        assert!(!pattern.is_valid());
    }

    #[test]
    fn test_empty_mask_string_is_ignored() {
        let pattern = SignaturePattern::from_hex("1F ?? 03", Some("   "));
        assert_eq!(pattern.mask(), &[true, false, true]);
    }

    #[test]
    fn test_display_roundtrip() {
        let pattern = SignaturePattern::from_hex("48 8d ?? ff", None);
        assert_eq!(pattern.to_string(), "48 8D ?? FF");
        assert_eq!(SignaturePattern::from_hex(&pattern.to_string(), None), pattern);
    }

    #[test]
    fn test_with_alignment_zero_becomes_one() {
        let pattern = SignaturePattern::from_hex("AA", None).with_alignment(0);
        assert_eq!(pattern.alignment(), 1);
    }

    #[test]
    fn test_function_signature_to_pattern() {
        let sig = FunctionSignature {
            name: "do_nothing".to_string(),
            pattern: "1F 20 03 D5 ?? ?? ?? ??".to_string(),
            mask: None,
            alignment: Some(8),
        };
        let pattern = sig.to_pattern();
        assert!(pattern.is_valid());
        assert_eq!(pattern.alignment(), 8);
    }
}
