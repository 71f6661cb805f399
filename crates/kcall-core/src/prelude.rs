//! Prelude module for convenient imports
//!
//! ```ignore
//! use kcall_core::prelude::*;
//! ```
//!
//! Brings the locator, the call bridge, patterns, configuration and the
//! error types into scope.

// Lookup
pub use crate::locator::{KernelBounds, KernelFunctionLocator, ResolutionSource};
pub use crate::pattern::{FunctionSignature, SignaturePattern};

// Calling
pub use crate::backend::PrivilegeBackend;
pub use crate::bridge::KernelCaller;
pub use crate::injector::{MemoryInjector, MemoryOperation};

pub use crate::config::KcallConfig;
pub use crate::error::{Error, Result};
