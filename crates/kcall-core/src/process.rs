//! Linux procfs helpers: process lookup and memory maps.

use std::fs;
use std::path::Path;

use tracing::{debug, trace};

use crate::error::{Error, Result};

pub const PROC_ROOT: &str = "/proc";

/// One line of `/proc/<pid>/maps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    /// Four-character permission string, e.g. `r-xp`
    pub permissions: String,
    /// Backing file or pseudo-name (`[stack]`); empty for anonymous mappings
    pub path: String,
}

impl MemoryRegion {
    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_readable(&self) -> bool {
        self.permission(0, 'r')
    }

    pub fn is_writable(&self) -> bool {
        self.permission(1, 'w')
    }

    pub fn is_executable(&self) -> bool {
        self.permission(2, 'x')
    }

    pub fn is_private(&self) -> bool {
        self.permission(3, 'p')
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end
    }

    fn permission(&self, index: usize, flag: char) -> bool {
        self.permissions.chars().nth(index) == Some(flag)
    }
}

/// Parse the contents of a maps file. Malformed lines are skipped.
pub fn parse_maps(text: &str) -> Vec<MemoryRegion> {
    text.lines().filter_map(parse_maps_line).collect()
}

fn parse_maps_line(line: &str) -> Option<MemoryRegion> {
    // 7f7d8c000000-7f7d8c021000 r--p 00000000 08:01 1234567 /path/to/file
    let mut fields = line.split_whitespace();
    let (start, end) = fields.next()?.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    if start >= end {
        return None;
    }
    let permissions = fields.next().unwrap_or_default().to_string();

    // offset, device, inode
    let path = fields.nth(3).unwrap_or_default().to_string();

    Some(MemoryRegion {
        start,
        end,
        permissions,
        path,
    })
}

pub fn read_maps(pid: u32) -> Result<Vec<MemoryRegion>> {
    read_maps_in(PROC_ROOT, pid)
}

pub fn read_maps_in<P: AsRef<Path>>(proc_root: P, pid: u32) -> Result<Vec<MemoryRegion>> {
    let path = proc_root.as_ref().join(pid.to_string()).join("maps");
    let text = fs::read_to_string(&path)?;
    let regions = parse_maps(&text);
    debug!("Read {} regions from {}", regions.len(), path.display());
    Ok(regions)
}

/// First process whose command line contains `name`.
pub fn find_process_by_name(name: &str) -> Result<u32> {
    find_process_in(PROC_ROOT, name)
}

pub fn find_process_in<P: AsRef<Path>>(proc_root: P, name: &str) -> Result<u32> {
    if name.is_empty() {
        return Err(Error::InvalidInput("process name is empty".to_string()));
    }

    let mut pids: Vec<u32> = fs::read_dir(proc_root.as_ref())?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
        .collect();
    pids.sort_unstable();

    for pid in pids {
        let cmdline_path = proc_root.as_ref().join(pid.to_string()).join("cmdline");
        let Ok(raw) = fs::read(&cmdline_path) else {
            continue;
        };

        // Arguments are NUL-separated
        let cmdline: String = String::from_utf8_lossy(&raw).replace('\0', " ");
        if cmdline.contains(name) {
            trace!("Matched pid {} cmdline {:?}", pid, cmdline.trim_end());
            return Ok(pid);
        }
    }

    Err(Error::NotFound(format!("Process '{}' not found", name)))
}

pub fn is_process_alive(pid: u32) -> bool {
    is_process_alive_in(PROC_ROOT, pid)
}

pub fn is_process_alive_in<P: AsRef<Path>>(proc_root: P, pid: u32) -> bool {
    proc_root.as_ref().join(pid.to_string()).exists()
}

/// Whether `address` falls inside any mapped region of `pid`.
pub fn is_valid_address(pid: u32, address: u64) -> bool {
    is_valid_address_in(PROC_ROOT, pid, address)
}

pub fn is_valid_address_in<P: AsRef<Path>>(proc_root: P, pid: u32, address: u64) -> bool {
    match read_maps_in(proc_root, pid) {
        Ok(regions) => regions.iter().any(|region| region.contains(address)),
        Err(e) => {
            debug!("Cannot read maps of pid {}: {}", pid, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MAPS: &str = "\
5a1c2f0000-5a1c2f4000 r--p 00000000 fd:05 1048 /system/bin/app_process64
5a1c2f4000-5a1c2f8000 r-xp 00003000 fd:05 1048 /system/bin/app_process64
7b4e000000-7b4e021000 rw-p 00000000 00:00 0
7ffc3c5e0000-7ffc3c601000 rw-p 00000000 00:00 0                          [stack]
garbage line
7b4f000000-7b4e000000 r--p 00000000 00:00 0
7b50000000-7b50000000 r--p 00000000 00:00 0
";

    #[test]
    fn test_parse_maps() {
        let regions = parse_maps(MAPS);
        assert_eq!(regions.len(), 4);

        let text = &regions[1];
        assert_eq!(text.start, 0x5a1c2f4000);
        assert_eq!(text.end, 0x5a1c2f8000);
        assert_eq!(text.size(), 0x4000);
        assert!(text.is_readable());
        assert!(!text.is_writable());
        assert!(text.is_executable());
        assert!(text.is_private());
        assert_eq!(text.path, "/system/bin/app_process64");

        assert_eq!(regions[2].path, "");
        assert_eq!(regions[3].path, "[stack]");
    }

    #[test]
    fn test_empty_or_inverted_ranges_skipped() {
        let regions = parse_maps(MAPS);
        assert!(regions.iter().all(|region| region.start < region.end));
        assert!(!regions.iter().any(|region| region.contains(0x7b4e800000)));
        assert!(parse_maps("2000-1000 r--p 00000000 00:00 0").is_empty());
    }

    #[test]
    fn test_region_contains() {
        let region = &parse_maps(MAPS)[0];
        assert!(region.contains(0x5a1c2f0000));
        assert!(region.contains(0x5a1c2f3fff));
        assert!(!region.contains(0x5a1c2f4000));
    }

    fn fake_proc() -> TempDir {
        let dir = TempDir::new().unwrap();
        for (pid, cmdline) in [(1u32, "/init\0"), (812, "zygote64\0--start-system-server\0"), (4410, "com.example.app\0")] {
            let proc_dir = dir.path().join(pid.to_string());
            fs::create_dir(&proc_dir).unwrap();
            fs::write(proc_dir.join("cmdline"), cmdline).unwrap();
        }
        fs::write(dir.path().join("4410").join("maps"), MAPS).unwrap();
        fs::create_dir(dir.path().join("self")).unwrap();
        dir
    }

    #[test]
    fn test_find_process_in() {
        let proc_root = fake_proc();
        assert_eq!(find_process_in(proc_root.path(), "zygote64").unwrap(), 812);
        assert_eq!(find_process_in(proc_root.path(), "example").unwrap(), 4410);
        assert!(
            find_process_in(proc_root.path(), "surfaceflinger")
                .unwrap_err()
                .is_not_found()
        );
        assert!(matches!(
            find_process_in(proc_root.path(), ""),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_read_maps_in() {
        let proc_root = fake_proc();
        assert_eq!(read_maps_in(proc_root.path(), 4410).unwrap().len(), 4);
        assert!(read_maps_in(proc_root.path(), 1).unwrap_err().is_not_found());
    }

    #[test]
    fn test_is_valid_address_in() {
        let proc_root = fake_proc();
        assert!(is_valid_address_in(proc_root.path(), 4410, 0x5a1c2f4100));
        assert!(is_valid_address_in(proc_root.path(), 4410, 0x7ffc3c600fff));
        assert!(!is_valid_address_in(proc_root.path(), 4410, 0x5a1c2f8000));
        assert!(!is_valid_address_in(proc_root.path(), 4410, 0x7b4e800000));
        // no maps file
        assert!(!is_valid_address_in(proc_root.path(), 812, 0x5a1c2f4100));
        assert!(!is_valid_address_in(proc_root.path(), 9999, 0x5a1c2f4100));
    }

    #[test]
    fn test_is_process_alive_in() {
        let proc_root = fake_proc();
        assert!(is_process_alive_in(proc_root.path(), 812));
        assert!(!is_process_alive_in(proc_root.path(), 9999));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
        assert!(!read_maps(std::process::id()).unwrap().is_empty());
    }
}
