//! # kcall-core
//!
//! Core library for locating and calling kernel functions on ARM64 Android.
//!
//! This crate provides:
//! - Byte signatures with wildcards and a masked scanner
//! - ARM64 jump and trampoline synthesis
//! - Kernel function lookup through privilege backends and `/proc/kallsyms`,
//!   with a persisted address cache
//! - A call bridge that invokes a kernel address with up to six arguments
//! - Kernel and process memory reads and writes
//! - Linux procfs helpers
//!
//! ## Example
//!
//! ```ignore
//! use kcall_core::prelude::*;
//!
//! let config = KcallConfig::default();
//! let locator = KernelFunctionLocator::new(None, &config);
//! locator.initialize()?;
//! let address = locator.locate("commit_creds", &SignaturePattern::from_hex("FD 7B ?? A9", None))?;
//!
//! let caller = KernelCaller::new(None);
//! caller.initialize()?;
//! let result = unsafe { caller.call(address, &[0])? };
//! ```

pub mod backend;
pub mod bridge;
pub mod cache;
pub mod codegen;
pub mod config;
pub mod error;
pub mod injector;
pub mod locator;
#[cfg(test)]
pub(crate) mod mock;
pub mod pattern;
pub mod prelude;
pub mod process;
pub mod scanner;
pub mod symbols;

pub use backend::{BackendRegistry, PrivilegeBackend};
pub use bridge::{
    CallContext, CallInvoker, KernelCaller, MAX_CALL_ARGS, NativeInvoker, PrivilegeCheck, RootCheck,
};
pub use cache::{AddressCache, current_kernel_release, try_prime_from_path};
pub use codegen::{
    JumpKind, LONG_JUMP_SIZE, MAX_JUMP_SIZE, SHORT_JUMP_SIZE, branch_target, generate_jump,
    generate_trampoline, jump_bytes, jump_kind, minimum_patch_size, trampoline_bytes,
};
pub use config::{KcallConfig, KcallConfigBuilder};
pub use error::{Error, Result};
pub use injector::{MemoryInjector, MemoryOperation, OperationKind};
pub use locator::{
    BackendResolver, CacheEntry, KernelBounds, KernelFunctionLocator, ResolutionSource,
    ResolutionState, SignatureScanResolver, SymbolResolver, SymbolTableResolver,
};
pub use pattern::{FunctionSignature, SignaturePattern};
pub use process::{
    MemoryRegion, find_process_by_name, is_process_alive, is_valid_address, parse_maps, read_maps,
};
pub use scanner::{scan, scan_at, scan_first};
pub use symbols::{SymbolEntry, SymbolSource};
