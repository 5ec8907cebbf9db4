//! Engine error types

use thiserror::Error;

use crate::debug::DomainException;
use crate::image::{ModuleError, SymbolError};
use crate::types::StructureError;

/// Errors from loading a bundle into a domain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Module image could not be decoded
    #[error("Invalid module image: {0}")]
    Module(#[from] ModuleError),

    /// Symbol image could not be decoded
    #[error("Invalid symbol image: {0}")]
    Symbols(#[from] SymbolError),

    /// Symbols were produced for a different module
    #[error("Symbols describe module {symbols}, loaded module is {module}")]
    SymbolMismatch {
        /// Loaded module checksum (hex)
        module: String,
        /// Checksum recorded in the symbols (hex)
        symbols: String,
    },

    /// Type graph is malformed
    #[error("Malformed type graph: {0}")]
    Structure(#[from] StructureError),

    /// The domain already holds a module
    #[error("Domain already holds module '{0}'")]
    AlreadyLoaded(String),

    /// The domain was disposed
    #[error("Domain has been disposed")]
    Disposed,
}

impl ParseError {
    /// Whether the bytes decoded but describe an unusable module.
    ///
    /// Structural errors cannot be fixed by re-fetching the same artifact.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ParseError::Structure(_) | ParseError::SymbolMismatch { .. }
        )
    }
}

/// Errors from querying or invoking into a domain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// No module has been loaded
    #[error("No module loaded in domain")]
    ModuleNotLoaded,

    /// Type lookup failed
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    /// Method lookup failed
    #[error("Method not found: {type_name}::{method}/{arity}")]
    MethodNotFound {
        /// Declaring type
        type_name: String,
        /// Method name
        method: String,
        /// Requested parameter count
        arity: u32,
    },

    /// Wrong number of arguments pushed before invoke
    #[error("{method} expects {expected} arguments, got {actual}")]
    ArityMismatch {
        /// Qualified method name
        method: String,
        /// Declared parameter count
        expected: u32,
        /// Pushed argument count
        actual: usize,
    },

    /// Method has no native binding
    #[error("Method {type_name}::{method} has no bound body")]
    UnboundMethod {
        /// Declaring type
        type_name: String,
        /// Method name
        method: String,
    },

    /// Native binding names missing from the host registry
    #[error("Unresolved native bindings: {}", .0.join(", "))]
    UnresolvedNative(Vec<String>),

    /// Bindings were not registered (or were shut down)
    #[error("Native bindings are not registered")]
    BindingsNotRegistered,

    /// The domain was disposed
    #[error("Domain has been disposed")]
    Disposed,

    /// The invoked body raised an exception
    #[error("Domain exception: {0}")]
    Exception(DomainException),
}

/// Result alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
