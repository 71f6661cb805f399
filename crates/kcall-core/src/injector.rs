//! Memory reads and writes against the kernel or another process.
//!
//! Kernel memory goes through the privilege backend. Process memory goes
//! through `/proc/<pid>/mem` after the address is checked against the
//! process maps.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use strum::Display;
use tracing::{debug, warn};

use crate::backend::PrivilegeBackend;
use crate::error::{Error, Result};
use crate::process::{self, PROC_ROOT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Read,
    Write,
}

/// One entry of a batch. Reads fill `data`; writes send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryOperation {
    pub kind: OperationKind,
    pub address: u64,
    /// Requested length for reads; payload length for writes
    pub size: usize,
    pub data: Vec<u8>,
    /// Bytes actually transferred
    pub transferred: usize,
    pub success: bool,
    pub error: Option<String>,
}

impl MemoryOperation {
    pub fn read(address: u64, size: usize) -> Self {
        Self {
            kind: OperationKind::Read,
            address,
            size,
            data: Vec::new(),
            transferred: 0,
            success: false,
            error: None,
        }
    }

    pub fn write(address: u64, data: Vec<u8>) -> Self {
        Self {
            kind: OperationKind::Write,
            address,
            size: data.len(),
            data,
            transferred: 0,
            success: false,
            error: None,
        }
    }

    fn fail(&mut self, message: String) {
        self.success = false;
        self.error = Some(message);
    }
}

pub struct MemoryInjector {
    backend: Option<Arc<dyn PrivilegeBackend>>,
    proc_root: PathBuf,
}

impl MemoryInjector {
    pub fn new(backend: Option<Arc<dyn PrivilegeBackend>>) -> Self {
        Self::with_proc_root(backend, PROC_ROOT)
    }

    pub fn with_proc_root<P: Into<PathBuf>>(
        backend: Option<Arc<dyn PrivilegeBackend>>,
        proc_root: P,
    ) -> Self {
        Self {
            backend,
            proc_root: proc_root.into(),
        }
    }

    fn backend(&self) -> Result<&Arc<dyn PrivilegeBackend>> {
        self.backend.as_ref().ok_or_else(|| {
            Error::BackendUnavailable("kernel memory access needs a privilege backend".to_string())
        })
    }

    pub fn read_kernel_memory(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let backend = self.backend()?;
        debug!("Kernel read {} bytes at 0x{:X} via {}", size, address, backend.name());
        backend.read_memory(address, size)
    }

    pub fn write_kernel_memory(&self, address: u64, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let backend = self.backend()?;
        debug!("Kernel write {} bytes at 0x{:X} via {}", data.len(), address, backend.name());
        backend.write_memory(address, data)
    }

    pub fn read_memory(&self, pid: u32, address: u64, size: usize) -> Result<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        self.check_target(pid, address)?;
        self.read_mem_file(pid, address, size)
    }

    pub fn write_memory(&self, pid: u32, address: u64, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        self.check_target(pid, address)?;
        self.write_mem_file(pid, address, data)
    }

    /// Run every operation against `pid`, recording each outcome in place.
    ///
    /// Fails as a whole only when the process does not exist.
    pub fn batch_operations(&self, pid: u32, operations: &mut [MemoryOperation]) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }
        if !process::is_process_alive_in(&self.proc_root, pid) {
            return Err(missing_process(pid));
        }

        let regions = process::read_maps_in(&self.proc_root, pid).unwrap_or_default();
        for op in operations.iter_mut() {
            if !regions.iter().any(|region| region.contains(op.address)) {
                op.fail(format!("Invalid address 0x{:X}", op.address));
                continue;
            }

            let outcome = match op.kind {
                OperationKind::Read => self.read_mem_file(pid, op.address, op.size).map(|bytes| {
                    let n = bytes.len();
                    op.data = bytes;
                    n
                }),
                OperationKind::Write => self.write_mem_file(pid, op.address, &op.data),
            };
            match outcome {
                Ok(n) => {
                    op.transferred = n;
                    op.success = true;
                    op.error = None;
                }
                Err(e) => {
                    warn!("{} at 0x{:X} in pid {} failed: {}", op.kind, op.address, pid, e);
                    op.fail(e.to_string());
                }
            }
        }

        let failed = operations.iter().filter(|op| !op.success).count();
        debug!("Batch of {} on pid {}: {} failed", operations.len(), pid, failed);
        Ok(())
    }

    fn check_target(&self, pid: u32, address: u64) -> Result<()> {
        if !process::is_process_alive_in(&self.proc_root, pid) {
            return Err(missing_process(pid));
        }
        if !process::is_valid_address_in(&self.proc_root, pid, address) {
            return Err(Error::invalid_address(
                address,
                format!("not mapped in pid {}", pid),
            ));
        }
        Ok(())
    }

    fn mem_path(&self, pid: u32) -> PathBuf {
        self.proc_root.join(pid.to_string()).join("mem")
    }

    #[cfg(unix)]
    fn read_mem_file(&self, pid: u32, address: u64, size: usize) -> Result<Vec<u8>> {
        use std::os::unix::fs::FileExt;

        let file = OpenOptions::new().read(true).open(self.mem_path(pid))?;
        let mut buffer = vec![0u8; size];
        file.read_exact_at(&mut buffer, address)?;
        Ok(buffer)
    }

    #[cfg(unix)]
    fn write_mem_file(&self, pid: u32, address: u64, data: &[u8]) -> Result<usize> {
        use std::os::unix::fs::FileExt;

        let file = OpenOptions::new().write(true).open(self.mem_path(pid))?;
        file.write_all_at(data, address)?;
        Ok(data.len())
    }

    #[cfg(not(unix))]
    fn read_mem_file(&self, _pid: u32, _address: u64, _size: usize) -> Result<Vec<u8>> {
        Err(Error::NotImplemented("process memory access".to_string()))
    }

    #[cfg(not(unix))]
    fn write_mem_file(&self, _pid: u32, _address: u64, _data: &[u8]) -> Result<usize> {
        Err(Error::NotImplemented("process memory access".to_string()))
    }
}

fn missing_process(pid: u32) -> Error {
    Error::NotFound(format!("Target process {} does not exist", pid))
}
