mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::hex_utils::parse_hex_address;

#[derive(Parser)]
#[command(name = "kcall", version)]
#[command(about = "Locate, patch and call ARM64 kernel functions")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "KCALL_CONFIG")]
    config: Option<PathBuf>,

    /// Symbol listing to use instead of /proc/kallsyms
    #[arg(long, global = true)]
    kallsyms: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search a file for a byte signature
    Scan {
        #[arg(short, long)]
        file: PathBuf,
        /// Hex bytes, "??" for wildcards (e.g. "FD 7B ?? A9")
        #[arg(short, long)]
        pattern: String,
        /// Explicit mask ("FF" fixed, "00" wildcard per byte)
        #[arg(short, long)]
        mask: Option<String>,
        #[arg(short, long, default_value_t = 4)]
        alignment: usize,
        /// Address of the first byte of the file
        #[arg(short, long, default_value = "0")]
        base: String,
        #[arg(short, long, default_value_t = 32)]
        limit: usize,
    },
    /// Encode a jump from one address to another
    Jump {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Build a trampoline from relocated bytes and a return address
    Trampoline {
        /// Original instruction bytes in hex
        #[arg(long)]
        original: String,
        #[arg(long = "return")]
        return_address: String,
    },
    /// Bytes to relocate for an inline hook
    PatchSize { requested: usize },
    /// Show the kernel address range
    Bounds,
    /// Resolve a kernel function address
    Locate {
        name: String,
        /// Signature to use instead of the configured one
        #[arg(short, long)]
        pattern: Option<String>,
    },
    /// Call a kernel function (requires root)
    Call {
        address: String,
        /// Up to six integer arguments, decimal or 0x-prefixed hex
        args: Vec<String>,
        /// Confirm the call
        #[arg(long)]
        yes: bool,
    },
    /// List the memory regions of a process
    Maps {
        pid: u32,
        /// Only show regions whose path contains this string
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Find a process by command line
    Pid { name: String },
    /// Dump bytes from a file
    Hexdump {
        #[arg(short, long)]
        file: PathBuf,
        /// File offset (hex)
        #[arg(short, long, default_value = "0")]
        offset: String,
        #[arg(short, long, default_value_t = 256)]
        size: usize,
        /// Address of the first byte of the file
        #[arg(short, long, default_value = "0")]
        base: String,
        #[arg(long)]
        no_ascii: bool,
    },
    /// Signed distance between two addresses and the jump it needs
    Offset { from: String, to: String },
    /// Read memory from a process, or from the kernel without --pid
    Read {
        /// One or more addresses (hex)
        #[arg(required = true)]
        addresses: Vec<String>,
        #[arg(short, long, default_value_t = 16)]
        size: usize,
        #[arg(short, long)]
        pid: Option<u32>,
    },
    /// Write bytes to a process, or to the kernel without --pid
    Write {
        address: String,
        /// Hex bytes (e.g. "1F 20 03 D5")
        bytes: String,
        #[arg(short, long)]
        pid: Option<u32>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let directive = if args.verbose { "kcall=debug" } else { "kcall=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = config::load(args.config.as_deref(), args.kallsyms)?;
    debug!("Configuration: {:?}", config);

    match args.command {
        Command::Scan {
            file,
            pattern,
            mask,
            alignment,
            base,
            limit,
        } => commands::scan::run(
            &file,
            &commands::scan::ScanOptions {
                pattern: &pattern,
                mask: mask.as_deref(),
                alignment,
                base: parse_hex_address(&base)?,
                limit,
            },
        ),
        Command::Jump { from, to } => commands::synth::jump(&from, &to),
        Command::Trampoline {
            original,
            return_address,
        } => commands::synth::trampoline(&original, &return_address),
        Command::PatchSize { requested } => commands::synth::patch_size(requested),
        Command::Bounds => commands::locate::bounds(&config),
        Command::Locate { name, pattern } => {
            commands::locate::locate(&config, &name, pattern.as_deref())
        }
        Command::Call { address, args, yes } => commands::call::run(&config, &address, &args, yes),
        Command::Maps { pid, filter } => commands::process::maps(pid, filter.as_deref()),
        Command::Pid { name } => commands::process::pid(&name),
        Command::Hexdump {
            file,
            offset,
            size,
            base,
            no_ascii,
        } => commands::hexdump::run(
            &file,
            parse_hex_address(&offset)?,
            size,
            parse_hex_address(&base)?,
            !no_ascii,
        ),
        Command::Offset { from, to } => commands::synth::offset(&from, &to),
        Command::Read {
            addresses,
            size,
            pid,
        } => commands::memory::read(pid, &addresses, size),
        Command::Write {
            address,
            bytes,
            pid,
        } => commands::memory::write(pid, &address, &bytes),
    }
}
