//! Privileged call bridge.
//!
//! Invokes a function at a raw address with up to six 64-bit arguments in
//! the AAPCS64 integer registers (x0-x5) and returns x0. There is no
//! recovery from a fault inside the callee: the process dies with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::backend::PrivilegeBackend;
use crate::error::{Error, Result};

/// Integer argument registers available for a call.
pub const MAX_CALL_ARGS: usize = 6;

/// Transfers control to an address with a full register set.
pub trait CallInvoker: Send + Sync {
    /// # Safety
    ///
    /// `address` must be the entry point of a function with a compatible
    /// signature that is executable from this context.
    unsafe fn invoke(&self, address: u64, args: [u64; MAX_CALL_ARGS]) -> u64;
}

/// Calls the address directly with the C calling convention.
pub struct NativeInvoker;

type RawFunction = extern "C" fn(u64, u64, u64, u64, u64, u64) -> u64;

impl CallInvoker for NativeInvoker {
    unsafe fn invoke(&self, address: u64, args: [u64; MAX_CALL_ARGS]) -> u64 {
        // SAFETY: upheld by the caller of `invoke`
        let function: RawFunction = unsafe { std::mem::transmute(address as usize) };
        function(args[0], args[1], args[2], args[3], args[4], args[5])
    }
}

/// Confirms the process holds the privilege needed to make calls.
pub trait PrivilegeCheck: Send + Sync {
    fn check(&self) -> Result<()>;
}

/// Requires an effective UID of 0.
pub struct RootCheck;

impl PrivilegeCheck for RootCheck {
    #[cfg(unix)]
    fn check(&self) -> Result<()> {
        // SAFETY: geteuid has no preconditions
        let uid = unsafe { libc::geteuid() };
        if uid != 0 {
            return Err(Error::PermissionDenied(format!(
                "Root privilege required (current UID: {})",
                uid
            )));
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn check(&self) -> Result<()> {
        Err(Error::PermissionDenied(
            "Root privilege check unsupported on this platform".to_string(),
        ))
    }
}

pub struct KernelCaller {
    backend: Option<Arc<dyn PrivilegeBackend>>,
    invoker: Box<dyn CallInvoker>,
    privilege: Box<dyn PrivilegeCheck>,
    privileged: AtomicBool,
    init_lock: Mutex<()>,
    call_lock: Mutex<()>,
}

impl KernelCaller {
    /// Native invoker guarded by the root check.
    pub fn new(backend: Option<Arc<dyn PrivilegeBackend>>) -> Self {
        Self::with_parts(backend, Box::new(NativeInvoker), Box::new(RootCheck))
    }

    pub fn with_parts(
        backend: Option<Arc<dyn PrivilegeBackend>>,
        invoker: Box<dyn CallInvoker>,
        privilege: Box<dyn PrivilegeCheck>,
    ) -> Self {
        Self {
            backend,
            invoker,
            privilege,
            privileged: AtomicBool::new(false),
            init_lock: Mutex::new(()),
            call_lock: Mutex::new(()),
        }
    }

    /// Confirm privilege. Later calls are no-ops.
    ///
    /// Backend setup is not performed here; bracket call sequences with
    /// [`context`](Self::context).
    pub fn initialize(&self) -> Result<()> {
        let _guard = lock(&self.init_lock);
        if self.is_initialized() {
            return Ok(());
        }

        self.privilege.check()?;

        self.privileged.store(true, Ordering::Release);
        info!("Kernel caller initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.privileged.load(Ordering::Acquire)
    }

    /// Call the function at `address`, zero-filling missing arguments.
    ///
    /// Checks, in order: privilege, argument count, null address.
    ///
    /// # Safety
    ///
    /// `address` must be the entry of a function taking at most six 64-bit
    /// integer arguments and returning one. Anything else is undefined
    /// behavior and typically terminates the process.
    pub unsafe fn call(&self, address: u64, args: &[u64]) -> Result<u64> {
        if !self.is_initialized() {
            return Err(Error::PermissionDenied(
                "Root privilege required (caller not initialized)".to_string(),
            ));
        }

        if args.len() > MAX_CALL_ARGS {
            return Err(Error::TooManyArguments {
                given: args.len(),
                max: MAX_CALL_ARGS,
            });
        }

        if address == 0 {
            return Err(Error::invalid_address(address, "null function address"));
        }

        let mut registers = [0u64; MAX_CALL_ARGS];
        registers[..args.len()].copy_from_slice(args);

        let _guard = lock(&self.call_lock);
        debug!("Calling 0x{:X} with {:X?}", address, registers);
        // SAFETY: upheld by the caller of `call`
        let result = unsafe { self.invoker.invoke(address, registers) };
        debug!("0x{:X} returned 0x{:X}", address, result);
        Ok(result)
    }

    pub fn prepare_context(&self) -> Result<()> {
        match &self.backend {
            Some(backend) => backend.prepare_call_context(),
            None => Ok(()),
        }
    }

    pub fn cleanup_context(&self) {
        if let Some(backend) = &self.backend {
            backend.cleanup_call_context();
        }
    }

    /// Prepare the backend context for the lifetime of the returned guard.
    pub fn context(&self) -> Result<CallContext<'_>> {
        self.prepare_context()?;
        Ok(CallContext { caller: self })
    }
}

/// Runs [`KernelCaller::cleanup_context`] when dropped.
#[must_use = "the context is cleaned up as soon as the guard is dropped"]
pub struct CallContext<'a> {
    caller: &'a KernelCaller,
}

impl Drop for CallContext<'_> {
    fn drop(&mut self) {
        self.caller.cleanup_context();
    }
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(|e| {
        warn!("Recovering poisoned call lock");
        e.into_inner()
    })
}
