//! Test doubles for backends, resolvers, call invokers and privilege checks.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::PrivilegeBackend;
use crate::bridge::{CallInvoker, MAX_CALL_ARGS, PrivilegeCheck};
use crate::error::{Error, Result};
use crate::locator::{KernelBounds, ResolutionSource, SymbolResolver};
use crate::pattern::SignaturePattern;

/// In-memory backend that counts symbol lookups and context brackets.
pub struct MockBackend {
    name: String,
    available: bool,
    symbols: HashMap<String, u64>,
    memory: Mutex<HashMap<u64, u8>>,
    fail_prepare: bool,
    lookups: AtomicUsize,
    prepared: AtomicUsize,
    cleaned: AtomicUsize,
}

impl MockBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            symbols: HashMap::new(),
            memory: Mutex::new(HashMap::new()),
            fail_prepare: false,
            lookups: AtomicUsize::new(0),
            prepared: AtomicUsize::new(0),
            cleaned: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(name: &str) -> Self {
        Self {
            available: false,
            ..Self::new(name)
        }
    }

    pub fn with_symbol(mut self, name: &str, address: u64) -> Self {
        self.symbols.insert(name.to_string(), address);
        self
    }

    pub fn failing_prepare(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn prepared(&self) -> usize {
        self.prepared.load(Ordering::SeqCst)
    }

    pub fn cleaned(&self) -> usize {
        self.cleaned.load(Ordering::SeqCst)
    }
}

impl PrivilegeBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn lookup_symbol(&self, name: &str) -> u64 {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.symbols.get(name).copied().unwrap_or(0)
    }

    fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let memory = self.memory.lock().unwrap();
        (0..len as u64)
            .map(|i| {
                memory.get(&(address + i)).copied().ok_or_else(|| {
                    Error::invalid_address(address + i, "unmapped mock memory")
                })
            })
            .collect()
    }

    fn write_memory(&self, address: u64, data: &[u8]) -> Result<usize> {
        let mut memory = self.memory.lock().unwrap();
        for (i, byte) in data.iter().enumerate() {
            memory.insert(address + i as u64, *byte);
        }
        Ok(data.len())
    }

    fn prepare_call_context(&self) -> Result<()> {
        if self.fail_prepare {
            return Err(Error::PermissionDenied("mock prepare failure".to_string()));
        }
        self.prepared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn cleanup_call_context(&self) {
        self.cleaned.fetch_add(1, Ordering::SeqCst);
    }
}

/// Resolver returning a fixed outcome and counting invocations.
pub struct CountingResolver {
    source: ResolutionSource,
    answers: HashMap<String, u64>,
    calls: AtomicUsize,
}

impl CountingResolver {
    pub fn new(source: ResolutionSource) -> Self {
        Self {
            source,
            answers: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_answer(mut self, name: &str, address: u64) -> Self {
        self.answers.insert(name.to_string(), address);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SymbolResolver for CountingResolver {
    fn source(&self) -> ResolutionSource {
        self.source
    }

    fn try_resolve(
        &self,
        name: &str,
        _pattern: &SignaturePattern,
        _bounds: &KernelBounds,
    ) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .get(name)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("{} has no answer", name)))
    }
}

/// Records every invocation instead of branching anywhere.
pub struct RecordingInvoker {
    result: u64,
    calls: Mutex<Vec<(u64, [u64; MAX_CALL_ARGS])>>,
}

impl RecordingInvoker {
    pub fn returning(result: u64) -> Self {
        Self {
            result,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(u64, [u64; MAX_CALL_ARGS])> {
        self.calls.lock().unwrap().clone()
    }
}

impl CallInvoker for RecordingInvoker {
    unsafe fn invoke(&self, address: u64, args: [u64; MAX_CALL_ARGS]) -> u64 {
        self.calls.lock().unwrap().push((address, args));
        self.result
    }
}

impl CallInvoker for std::sync::Arc<RecordingInvoker> {
    unsafe fn invoke(&self, address: u64, args: [u64; MAX_CALL_ARGS]) -> u64 {
        // SAFETY: the recording invoker never dereferences `address`
        unsafe { self.as_ref().invoke(address, args) }
    }
}

/// Privilege check with a fixed answer.
pub struct FixedCheck(pub bool);

impl PrivilegeCheck for FixedCheck {
    fn check(&self) -> Result<()> {
        if self.0 {
            Ok(())
        } else {
            Err(Error::PermissionDenied(
                "Root privilege required (current UID: 2000)".to_string(),
            ))
        }
    }
}
