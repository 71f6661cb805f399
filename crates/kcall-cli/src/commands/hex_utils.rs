//! Hex parsing and formatting shared by the commands.

use anyhow::{Result, bail};

/// Parse a hex address string (with or without 0x prefix).
pub fn parse_hex_address(s: &str) -> Result<u64> {
    let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16).map_err(|e| anyhow::anyhow!("Invalid hex address '{}': {}", s, e))
}

/// Parse an integer argument: hex with a 0x prefix, decimal otherwise.
pub fn parse_u64(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.starts_with("0x") || s.starts_with("0X") {
        return parse_hex_address(s);
    }
    s.parse()
        .map_err(|e| anyhow::anyhow!("Invalid integer '{}': {}", s, e))
}

/// Parse a byte string such as `"1F 20 03 D5"` or `"1F2003D5"`.
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>> {
    let digits: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let digits = digits.trim_start_matches("0x");

    if !digits.is_ascii() {
        bail!("Non-hex characters in '{}'", s);
    }
    if digits.len() % 2 != 0 {
        bail!("Odd number of hex digits in '{}'", s);
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| anyhow::anyhow!("Invalid hex byte '{}': {}", &digits[i..i + 2], e))
        })
        .collect()
}

/// Format an address as a hex string with 0x prefix.
pub fn format_hex_address(addr: u64) -> String {
    format!("0x{:X}", addr)
}

pub fn format_hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_address() {
        assert_eq!(parse_hex_address("0x1000").unwrap(), 0x1000);
        assert_eq!(parse_hex_address("0X1000").unwrap(), 0x1000);
        assert_eq!(parse_hex_address("ffffffc0081a2b40").unwrap(), 0xFFFF_FFC0_081A_2B40);
        assert!(parse_hex_address("0xZZZ").is_err());
        assert!(parse_hex_address("").is_err());
    }

    #[test]
    fn test_parse_u64() {
        assert_eq!(parse_u64("42").unwrap(), 42);
        assert_eq!(parse_u64("0x2A").unwrap(), 42);
        assert!(parse_u64("2A").is_err());
    }

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(parse_hex_bytes("1F 20 03 D5").unwrap(), vec![0x1F, 0x20, 0x03, 0xD5]);
        assert_eq!(parse_hex_bytes("1f2003d5").unwrap(), vec![0x1F, 0x20, 0x03, 0xD5]);
        assert_eq!(parse_hex_bytes("").unwrap(), Vec::<u8>::new());
        assert!(parse_hex_bytes("1F 2").is_err());
        assert!(parse_hex_bytes("GG").is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_hex_address(0xDEADBEEF), "0xDEADBEEF");
        assert_eq!(format_hex_address(0), "0x0");
        assert_eq!(format_hex_bytes(&[0x50, 0x00, 0x00, 0x58]), "50 00 00 58");
    }
}
