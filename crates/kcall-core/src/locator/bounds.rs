use std::fmt;

use serde::{Deserialize, Serialize};

/// Start of the ARM64 kernel half with 39-bit virtual addresses.
pub const DEFAULT_KERNEL_BASE: u64 = 0xFFFF_FF80_0000_0000;

/// Default window size when no symbol listing is readable (4 GiB).
pub const DEFAULT_KERNEL_SIZE: u64 = 0x1_0000_0000;

/// Slack added past the highest listed symbol so that the last function's
/// body is still inside the range.
pub const RANGE_PADDING: u64 = 0x1000;

/// Half-open kernel address window `[base, base + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelBounds {
    pub base: u64,
    pub size: u64,
}

impl Default for KernelBounds {
    fn default() -> Self {
        Self {
            base: DEFAULT_KERNEL_BASE,
            size: DEFAULT_KERNEL_SIZE,
        }
    }
}

impl KernelBounds {
    pub fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    /// Bounds spanning the lowest and highest observed symbol.
    pub fn from_range(min: u64, max: u64) -> Self {
        let size = max.saturating_sub(min).saturating_add(RANGE_PADDING);
        Self { base: min, size }
    }

    pub fn contains(&self, address: u64) -> bool {
        self.size != 0 && address >= self.base && address - self.base < self.size
    }

    /// One past the last valid address, saturating at `u64::MAX`.
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }
}

impl fmt::Display for KernelBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:X}-0x{:X} ({:#x} bytes)",
            self.base,
            self.end(),
            self.size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_edges() {
        let bounds = KernelBounds::new(0xFFFF_FFC0_0800_0000, 0x200_0000);
        assert!(!bounds.contains(bounds.base - 1));
        assert!(bounds.contains(bounds.base));
        assert!(bounds.contains(bounds.base + bounds.size - 1));
        assert!(!bounds.contains(bounds.base + bounds.size));
        assert!(!bounds.contains(0x1000));
    }

    #[test]
    fn test_zero_size_contains_nothing() {
        let bounds = KernelBounds::new(0xFFFF_FF80_0000_0000, 0);
        assert!(!bounds.contains(0xFFFF_FF80_0000_0000));
    }

    #[test]
    fn test_contains_near_top_of_address_space() {
        let bounds = KernelBounds::new(u64::MAX - 0xFF, 0x1000);
        assert!(bounds.contains(u64::MAX));
        assert_eq!(bounds.end(), u64::MAX);
    }

    #[test]
    fn test_from_range_adds_padding() {
        let bounds = KernelBounds::from_range(0xFFFF_FFC0_0800_0000, 0xFFFF_FFC0_0A00_0000);
        assert_eq!(bounds.base, 0xFFFF_FFC0_0800_0000);
        assert_eq!(bounds.size, 0x200_0000 + RANGE_PADDING);
        assert!(bounds.contains(0xFFFF_FFC0_0A00_0000));
    }

    #[test]
    fn test_default_bounds() {
        let bounds = KernelBounds::default();
        assert_eq!(bounds.base, 0xFFFF_FF80_0000_0000);
        assert_eq!(bounds.size, 0x1_0000_0000);
    }

    #[test]
    fn test_bounds_property_sweep() {
        let bounds = KernelBounds::new(0xFFFF_FFC0_0000_0000, 0x4000_0000);
        let samples = [
            0u64,
            bounds.base - 0x1000,
            bounds.base - 1,
            bounds.base,
            bounds.base + 0x1234,
            bounds.end() - 1,
            bounds.end(),
            u64::MAX,
        ];
        for address in samples {
            let expected = bounds.base <= address && (address as u128) < bounds.base as u128 + bounds.size as u128;
            assert_eq!(bounds.contains(address), expected, "address {:#x}", address);
        }
    }
}
