//! CLI command implementations.

pub mod call;
pub mod hex_utils;
pub mod hexdump;
pub mod locate;
pub mod memory;
pub mod process;
pub mod scan;
pub mod synth;
