//! Native binding registry
//!
//! Hosts register named functions in a `NativeFunctionRegistry`. When bindings
//! are registered into a domain, each name in the module's native binding
//! table is resolved once into `ResolvedNatives`; dispatch afterwards is an
//! indexed call into a Vec.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::value::Value;

/// Information about the module method that reached a native binding
#[derive(Debug, Clone, Copy)]
pub struct NativeCall<'a> {
    /// Declaring type of the invoked method
    pub type_name: &'a str,
    /// Invoked method name
    pub method_name: &'a str,
}

/// Result of a native call handler
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCallResult {
    /// Call handled successfully, returned a value
    Value(Value),
    /// Call raised an exception inside the domain
    Error(String),
}

impl NativeCallResult {
    /// Create a successful result with null value
    #[inline]
    pub fn null() -> Self {
        Self::Value(Value::Null)
    }

    /// Create a successful result from anything convertible to a value
    #[inline]
    pub fn value(v: impl Into<Value>) -> Self {
        Self::Value(v.into())
    }

    /// Create an error result
    #[inline]
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error(msg.into())
    }
}

/// A native function handler
pub type NativeFn = Arc<dyn Fn(&NativeCall<'_>, &[Value]) -> NativeCallResult + Send + Sync>;

/// Registry of host functions indexed by symbolic name (e.g. "host.log").
#[derive(Clone, Default)]
pub struct NativeFunctionRegistry {
    handlers: FxHashMap<String, NativeFn>,
}

impl std::fmt::Debug for NativeFunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunctionRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl NativeFunctionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native function by name, replacing any previous handler
    pub fn register(
        &mut self,
        name: &str,
        handler: impl Fn(&NativeCall<'_>, &[Value]) -> NativeCallResult + Send + Sync + 'static,
    ) {
        self.handlers.insert(name.to_string(), Arc::new(handler));
    }

    /// Get a handler by name (used at link time)
    pub fn get(&self, name: &str) -> Option<NativeFn> {
        self.handlers.get(name).cloned()
    }

    /// Check if a handler is registered
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Resolved native function table for a loaded module.
pub struct ResolvedNatives {
    handlers: Vec<NativeFn>,
}

impl std::fmt::Debug for ResolvedNatives {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedNatives")
            .field("count", &self.handlers.len())
            .finish()
    }
}

impl ResolvedNatives {
    /// Link a module's native binding names to handlers from the registry.
    ///
    /// Returns every name that could not be resolved.
    pub fn link(
        native_bindings: &[String],
        registry: &NativeFunctionRegistry,
    ) -> Result<Self, Vec<String>> {
        let mut handlers = Vec::with_capacity(native_bindings.len());
        let mut missing = Vec::new();
        for name in native_bindings {
            match registry.get(name) {
                Some(handler) => handlers.push(handler),
                None => missing.push(name.clone()),
            }
        }
        if missing.is_empty() {
            Ok(Self { handlers })
        } else {
            Err(missing)
        }
    }

    /// Create an empty resolved natives table
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Call a native function by slot
    pub fn call(&self, slot: u32, call: &NativeCall<'_>, args: &[Value]) -> NativeCallResult {
        match self.handlers.get(slot as usize) {
            Some(handler) => handler(call, args),
            None => NativeCallResult::Error(format!("Invalid native binding slot: {}", slot)),
        }
    }

    /// Get the number of resolved handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if there are no resolved handlers
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
