//! Hexdump command implementation.
//!
//! Dumps bytes from a file (for example a kernel image or a memory dump) in
//! traditional hexdump format, labelled with the address they would have
//! when loaded at `base`.
//!
//! # Output Format
//!
//! ```text
//! 0xFFFFFFC008000000: 4D 5A 40 FA FF 7F 7F 14  00 00 00 00 00 00 00 00  |MZ@.............|
//! ```

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};

const BYTES_PER_LINE: usize = 16;

/// Run the hexdump command
pub fn run(path: &Path, offset: u64, size: usize, base: u64, ascii: bool) -> Result<()> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    file.seek(SeekFrom::Start(offset))?;

    let mut bytes = Vec::with_capacity(size);
    file.take(size as u64).read_to_end(&mut bytes)?;

    println!(
        "Hexdump of {} at offset 0x{:X} ({} bytes):",
        path.display(),
        offset,
        bytes.len()
    );
    println!();

    for line in format_lines(&bytes, base.wrapping_add(offset), ascii) {
        println!("{}", line);
    }

    Ok(())
}

pub fn format_lines(bytes: &[u8], start: u64, ascii: bool) -> Vec<String> {
    bytes
        .chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(i, chunk)| format_line(chunk, start.wrapping_add((i * BYTES_PER_LINE) as u64), ascii))
        .collect()
}

fn format_line(chunk: &[u8], address: u64, ascii: bool) -> String {
    let mut line = format!("0x{:X}: ", address);

    for j in 0..BYTES_PER_LINE {
        if j == 8 {
            line.push(' ');
        }
        match chunk.get(j) {
            Some(byte) => line.push_str(&format!("{:02X} ", byte)),
            None => line.push_str("   "),
        }
    }

    if ascii {
        line.push_str(" |");
        for byte in chunk {
            line.push(if (0x20..0x7F).contains(byte) { *byte as char } else { '.' });
        }
        for _ in chunk.len()..BYTES_PER_LINE {
            line.push(' ');
        }
        line.push('|');
    }

    line
}
