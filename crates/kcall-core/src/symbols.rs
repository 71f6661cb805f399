//! Kernel symbol listings (`/proc/kallsyms`, `System.map`).
//!
//! Each line has the form `<hex-address> <type> <name> [\[module\]]`.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Default location of the live kernel symbol table.
pub const DEFAULT_KALLSYMS_PATH: &str = "/proc/kallsyms";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub address: u64,
    pub kind: char,
    pub name: String,
    pub module: Option<String>,
}

impl SymbolEntry {
    /// Text (code) symbols are reported with type `t`/`T`.
    pub fn is_function(&self) -> bool {
        matches!(self.kind, 't' | 'T' | 'w' | 'W')
    }
}

/// Parse one listing line. Returns `None` for blank or malformed lines.
pub fn parse_line(line: &str) -> Option<SymbolEntry> {
    let mut parts = line.split_whitespace();
    let address = parse_address(parts.next()?)?;

    let mut kind_chars = parts.next()?.chars();
    let kind = kind_chars.next()?;
    if kind_chars.next().is_some() {
        return None;
    }

    let name = parts.next()?.to_string();
    let module = parts
        .next()
        .map(|m| m.trim_start_matches('[').trim_end_matches(']').to_string());

    Some(SymbolEntry {
        address,
        kind,
        name,
        module,
    })
}

fn parse_address(token: &str) -> Option<u64> {
    let token = token.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(token, 16).ok()
}

/// Where a symbol listing comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSource {
    /// Read the file on every query (the live table can change as modules load).
    File(PathBuf),
    /// In-memory listing.
    Text(String),
    /// No listing available.
    None,
}

impl Default for SymbolSource {
    fn default() -> Self {
        SymbolSource::File(PathBuf::from(DEFAULT_KALLSYMS_PATH))
    }
}

impl SymbolSource {
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        SymbolSource::File(path.as_ref().to_path_buf())
    }

    pub fn text<S: Into<String>>(text: S) -> Self {
        SymbolSource::Text(text.into())
    }

    fn open(&self) -> Result<Option<Box<dyn BufRead + '_>>> {
        match self {
            SymbolSource::File(path) => {
                let file = File::open(path)?;
                Ok(Some(Box::new(BufReader::new(file))))
            }
            SymbolSource::Text(text) => Ok(Some(Box::new(Cursor::new(text.as_bytes())))),
            SymbolSource::None => Ok(None),
        }
    }

    /// Smallest and largest nonzero address in the listing.
    ///
    /// Only the address column is required; lines whose first token is not
    /// hex are skipped. Returns `None` when no nonzero address exists, which
    /// is what an unprivileged reader sees when `kptr_restrict` zeroes the
    /// table.
    pub fn address_range(&self) -> Result<Option<(u64, u64)>> {
        let Some(reader) = self.open()? else {
            return Ok(None);
        };

        let mut range: Option<(u64, u64)> = None;
        for line in lossy_lines(reader) {
            let Some(address) = line.split_whitespace().next().and_then(parse_address) else {
                continue;
            };
            if address == 0 {
                continue;
            }
            range = Some(match range {
                Some((min, max)) => (min.min(address), max.max(address)),
                None => (address, address),
            });
        }

        debug!("Symbol listing address range: {:X?}", range);
        Ok(range)
    }

    /// First entry named exactly `name` whose address satisfies `accept`.
    pub fn find<F>(&self, name: &str, accept: F) -> Result<Option<SymbolEntry>>
    where
        F: Fn(u64) -> bool,
    {
        let Some(reader) = self.open()? else {
            return Ok(None);
        };

        Ok(lossy_lines(reader)
            .filter_map(|line| parse_line(&line))
            .find(|entry| entry.name == name && accept(entry.address)))
    }

    /// All parseable entries.
    pub fn entries(&self) -> Result<Vec<SymbolEntry>> {
        let Some(reader) = self.open()? else {
            return Ok(Vec::new());
        };

        Ok(lossy_lines(reader)
            .filter_map(|line| parse_line(&line))
            .collect())
    }
}

/// Lines decoded lossily, so one non-UTF-8 name does not end the listing.
fn lossy_lines<'a>(reader: Box<dyn BufRead + 'a>) -> impl Iterator<Item = String> + 'a {
    reader
        .split(b'\n')
        .map_while(std::result::Result::ok)
        .map(|line| String::from_utf8_lossy(&line).into_owned())
}
