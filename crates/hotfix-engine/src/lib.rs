//! Hotfix Engine
//!
//! The in-process side of hot-fix loading:
//! - **Images**: module and symbol binary formats with integrity checks (`image` module)
//! - **Types**: validated type graph with explicit parent indices (`types` module)
//! - **Domain**: loaded-module container, native binding dispatch, scoped invocation (`domain` module)
//! - **Debug**: main-thread tagging and exception observers (`debug` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use hotfix_engine::{Domain, HotFixBundle, NativeFunctionRegistry, NativeCallResult};
//!
//! let domain = Domain::new();
//! domain.load_module(HotFixBundle::new(module_bytes))?;
//!
//! let mut natives = NativeFunctionRegistry::new();
//! natives.register("host.log", |_call, args| {
//!     println!("{}", args[0]);
//!     NativeCallResult::null()
//! });
//! domain.register_bindings(&natives)?;
//!
//! let method = domain.find_method("Game.Boot", "Run", 1)?;
//! let mut ctx = domain.begin_invoke(&method)?;
//! ctx.push("scene/Main");
//! ctx.invoke()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Binary formats: module image, symbol image, shared reader/writer
pub mod image;

/// Type table built from a module image
pub mod types;

/// Values crossing the host/module boundary
pub mod value;

/// Host native function registry and link table
pub mod native_registry;

/// Per-domain debugging hooks
pub mod debug;

/// Execution domain and invocation contexts
pub mod domain;

/// Error types
pub mod error;

// ============================================================================
// Re-exports
// ============================================================================

pub use debug::{DebugService, DomainException, ExceptionObserver, ObserverId, StackFrame};
pub use domain::{Domain, HotFixBundle, InvocationContext, MethodHandle};
pub use error::{DomainError, DomainResult, ParseError};
pub use image::{MethodDef, ModuleError, ModuleImage, SymbolError, SymbolImage, TypeDef};
pub use native_registry::{
    NativeCall, NativeCallResult, NativeFn, NativeFunctionRegistry, ResolvedNatives,
};
pub use types::{StructureError, TypeDescriptor, TypeTable};
pub use value::Value;
