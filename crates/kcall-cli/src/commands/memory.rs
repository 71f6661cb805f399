//! `read` and `write` commands.
//!
//! With `--pid` the target is a process, accessed through procfs. Without
//! it the target is kernel memory, which needs a privilege backend; none
//! ship with the CLI, so kernel access reports the backend as unavailable.

use anyhow::{Result, bail};
use kcall_core::{MemoryInjector, MemoryOperation, OperationKind};
use owo_colors::OwoColorize;

use super::hex_utils::{parse_hex_address, parse_hex_bytes};
use super::hexdump::format_lines;

/// Run the read command
pub fn read(pid: Option<u32>, addresses: &[String], size: usize) -> Result<()> {
    let addresses = addresses
        .iter()
        .map(|a| parse_hex_address(a))
        .collect::<Result<Vec<_>>>()?;
    let injector = MemoryInjector::new(None);

    let Some(pid) = pid else {
        for address in addresses {
            let bytes = injector.read_kernel_memory(address, size)?;
            print_dump(address, &bytes);
        }
        return Ok(());
    };

    let mut ops: Vec<MemoryOperation> = addresses
        .into_iter()
        .map(|address| MemoryOperation::read(address, size))
        .collect();
    injector.batch_operations(pid, &mut ops)?;

    for op in &ops {
        println!("{}", summary(op));
        if op.success {
            print_dump(op.address, &op.data);
        }
    }
    report_failures(&ops)
}

/// Run the write command
pub fn write(pid: Option<u32>, address: &str, bytes: &str) -> Result<()> {
    let address = parse_hex_address(address)?;
    let data = parse_hex_bytes(bytes)?;
    let injector = MemoryInjector::new(None);

    let Some(pid) = pid else {
        let written = injector.write_kernel_memory(address, &data)?;
        println!("Wrote {} bytes at 0x{:X}", written, address);
        return Ok(());
    };

    let mut ops = vec![MemoryOperation::write(address, data)];
    injector.batch_operations(pid, &mut ops)?;
    println!("{}", summary(&ops[0]));
    report_failures(&ops)
}

fn print_dump(address: u64, bytes: &[u8]) {
    for line in format_lines(bytes, address, true) {
        println!("  {}", line);
    }
}

fn summary(op: &MemoryOperation) -> String {
    let head = format!("{} 0x{:X} ({} bytes)", op.kind, op.address, op.size);
    match (&op.error, op.kind) {
        (Some(error), _) => format!("{}: {}", head, error.red()),
        (None, OperationKind::Read) => format!("{}: {}", head, "ok".green()),
        (None, OperationKind::Write) => {
            format!("{}: {}", head, format!("{} written", op.transferred).green())
        }
    }
}

fn report_failures(ops: &[MemoryOperation]) -> Result<()> {
    let failed = ops.iter().filter(|op| !op.success).count();
    if failed > 0 {
        bail!("{} of {} operations failed", failed, ops.len());
    }
    Ok(())
}
